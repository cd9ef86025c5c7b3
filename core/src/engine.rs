//! The battle controller: turn and phase state machine.
//!
//! EXECUTION ORDER (fixed, every turn):
//!   1. Initiative      2d6 per side, ties reroll, loser moves first
//!   2. Movement        alternating single-unit activations, locked once made
//!   3. WeaponAttack    secret declarations, then reveal and resolve
//!   4. PhysicalAttack  secret declarations, then reveal and resolve
//!   5. Heat            generation, dissipation, shutdown and explosion checks
//!   6. End             pilot recovery, terminal check, next turn
//!
//! RULES:
//!   - Every resolver runs inside a BattleContext built from this battle.
//!   - Declarations are validated before any die is rolled.
//!   - Interactive play (`apply_declaration` / `advance_phase`) and
//!     `run_to_completion` drive the same resolvers.
//!   - A StateInvariantViolation poisons the battle for good.

use crate::{
    commander::{AutoCommander, Commander},
    config::BattleConfig,
    context::BattleContext,
    declaration::{Declaration, MovementOrder},
    error::{IllegalAction, SimError, SimResult},
    event::{EndReason, EventKind, GameEvent},
    heat, movement, pilot, physical,
    phase::{activation_order, Phase},
    physical::PhysicalDeclarations,
    psr,
    rng::{DiceSource, SeededDice},
    state::{BattleOutcome, BattleState},
    types::{Seq, Side},
    unit::UnitSpec,
    weapon_attack::{self, PendingAttack, WeaponDeclarations},
};
use log::{debug, info, warn};
use std::collections::BTreeSet;

/// Result of an auto-resolved battle.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub winner: Option<Side>,
    pub reason: EndReason,
    pub events: Vec<GameEvent>,
}

pub struct Battle {
    state:     BattleState,
    log:       Vec<GameEvent>,
    dice:      Box<dyn DiceSource>,
    config:    BattleConfig,
    weapons:   WeaponDeclarations,
    physicals: PhysicalDeclarations,
    poisoned:  Option<(String, Seq)>,
}

impl Battle {
    /// Build a battle on the production dice stream for `seed`.
    pub fn new(battle_id: &str, seed: u64, config: BattleConfig, forces: &[UnitSpec]) -> SimResult<Self> {
        Self::with_dice(battle_id, seed, config, forces, Box::new(SeededDice::new(seed)))
    }

    /// Build a battle on an injected dice source. Used by tests to pin
    /// exact scenarios.
    pub fn with_dice(
        battle_id: &str,
        seed: u64,
        config: BattleConfig,
        forces: &[UnitSpec],
        dice: Box<dyn DiceSource>,
    ) -> SimResult<Self> {
        config.validate()?;

        let mut ids = BTreeSet::new();
        let mut units = Vec::with_capacity(forces.len());
        for spec in forces {
            if !ids.insert(spec.id.clone()) {
                return Err(SimError::config(format!("duplicate unit id '{}'", spec.id)));
            }
            units.push(spec.build(&config.catalog)?);
        }
        let sides: BTreeSet<Side> = units.iter().map(|u| u.side).collect();
        if sides.len() != 2 {
            return Err(SimError::config(format!(
                "a battle needs exactly two sides, found {}",
                sides.len()
            )));
        }

        let mut battle = Self {
            state: BattleState::default(),
            log: Vec::new(),
            dice,
            config,
            weapons: WeaponDeclarations::default(),
            physicals: PhysicalDeclarations::default(),
            poisoned: None,
        };
        let turn_limit = battle.config.turn_limit;
        battle.resolve(|ctx| {
            ctx.emit(EventKind::BattleStarted {
                battle_id: battle_id.to_string(),
                seed,
                turn_limit,
                units,
            })
        })?;
        info!("Battle {battle_id} started (seed {seed}, {} units)", ids.len());
        Ok(battle)
    }

    pub fn state(&self) -> &BattleState {
        &self.state
    }

    pub fn events(&self) -> &[GameEvent] {
        &self.log
    }

    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.state.clock.phase
    }

    pub fn is_over(&self) -> bool {
        self.state.is_over()
    }

    pub fn outcome(&self) -> Option<&BattleOutcome> {
        self.state.outcome.as_ref()
    }

    /// Swap the dice mid-battle. Tests use this to script one phase.
    pub fn set_dice(&mut self, dice: Box<dyn DiceSource>) {
        self.dice = dice;
    }

    /// Accept one declaration. Movement resolves immediately; twists and
    /// attacks are held until the phase is advanced.
    pub fn apply_declaration(&mut self, declaration: Declaration) -> SimResult<()> {
        self.check_poisoned()?;
        let unit_id = declaration.unit().to_string();
        if self.is_over() {
            return Err(self.reject(&unit_id, IllegalAction::Forbidden("the battle is over")));
        }

        match declaration {
            Declaration::Move { unit, order } => {
                if let Err(reason) = self.validate_activation(&unit) {
                    return Err(self.reject(&unit, reason));
                }
                let result = self.resolve(|ctx| {
                    movement::execute(ctx, &unit, &order)?;
                    skip_idle_slots(ctx)
                });
                if let Err(SimError::IllegalAction { reason, .. }) = &result {
                    warn!("Rejected move for {unit}: {reason}");
                }
                result
            }
            Declaration::TorsoTwist { unit, twist } => {
                match weapon_attack::validate_twist(&self.state, &self.weapons, &unit, twist) {
                    Ok(()) => {
                        debug!("{unit} declares torso twist {twist:?}");
                        self.weapons.twists.insert(unit, twist);
                        Ok(())
                    }
                    Err(reason) => Err(self.reject(&unit, reason)),
                }
            }
            Declaration::WeaponAttack(decl) => {
                match weapon_attack::validate(&self.state, &self.config, &self.weapons, &decl) {
                    Ok(primary) => {
                        debug!(
                            "{} declares weapon {} at {} (rate {})",
                            decl.attacker, decl.weapon, decl.target, decl.rate
                        );
                        self.weapons.attacks.push(PendingAttack { declaration: decl, primary });
                        Ok(())
                    }
                    Err(reason) => Err(self.reject(&unit_id, reason)),
                }
            }
            Declaration::PhysicalAttack(decl) => {
                match physical::validate(&self.state, &self.config, &self.physicals, &decl) {
                    Ok(()) => {
                        debug!("{} declares {:?} at {}", decl.attacker, decl.kind, decl.target);
                        self.physicals.attacks.push(decl);
                        Ok(())
                    }
                    Err(reason) => Err(self.reject(&unit_id, reason)),
                }
            }
        }
    }

    /// Finish the current phase and enter the next one. Returns the
    /// events this call appended to the log.
    pub fn advance_phase(&mut self) -> SimResult<Vec<GameEvent>> {
        self.check_poisoned()?;
        if self.is_over() {
            return Ok(Vec::new());
        }
        let start = self.log.len();
        let phase = self.state.clock.phase;

        match phase {
            Phase::Initiative => self.resolve(roll_initiative)?,
            Phase::Movement => self.resolve(finish_movement)?,
            Phase::WeaponAttack => {
                let declarations = std::mem::take(&mut self.weapons);
                self.resolve(|ctx| weapon_attack::resolve_phase(ctx, declarations))?;
            }
            Phase::PhysicalAttack => {
                let declarations = std::mem::take(&mut self.physicals);
                self.resolve(|ctx| physical::resolve_phase(ctx, declarations))?;
            }
            Phase::Heat => self.resolve(resolve_heat)?,
            Phase::End => self.resolve(end_turn)?,
        }

        if !self.is_over() && phase != Phase::End {
            let next = phase.next();
            self.resolve(|ctx| ctx.emit(EventKind::PhaseChanged { from: phase, to: next }))?;
            info!("Turn {} {:?} -> {:?}", self.state.clock.turn, phase, next);
        }
        Ok(self.log[start..].to_vec())
    }

    /// Build a BattleContext over this battle and run `f` in it.
    fn resolve<T>(&mut self, f: impl FnOnce(&mut BattleContext) -> SimResult<T>) -> SimResult<T> {
        self.check_poisoned()?;
        let mut ctx = BattleContext::new(&mut self.state, &mut self.log, &mut *self.dice, &self.config);
        let result = f(&mut ctx);
        if let Err(SimError::StateInvariantViolation { detail, seq, .. }) = &result {
            log::error!("Battle {} poisoned at seq {seq}: {detail}", self.state.battle_id);
            self.poisoned = Some((detail.clone(), *seq));
        }
        result
    }

    fn check_poisoned(&self) -> SimResult<()> {
        match &self.poisoned {
            Some((detail, seq)) => Err(SimError::StateInvariantViolation {
                detail: detail.clone(),
                seq:    *seq,
                log:    self.log.clone(),
            }),
            None => Ok(()),
        }
    }

    fn reject(&self, unit: &str, reason: IllegalAction) -> SimError {
        warn!("Rejected declaration from {unit}: {reason}");
        SimError::illegal(unit, reason)
    }

    fn validate_activation(&self, unit_id: &str) -> Result<(), IllegalAction> {
        let phase = self.state.clock.phase;
        if phase != Phase::Movement {
            return Err(IllegalAction::WrongPhase { action: "movement", phase });
        }
        let unit = self
            .state
            .unit(unit_id)
            .ok_or_else(|| IllegalAction::UnknownUnit(unit_id.to_string()))?;
        let expected = self
            .state
            .clock
            .side_to_move()
            .ok_or(IllegalAction::Forbidden("every activation this turn is used"))?;
        if unit.side != expected {
            return Err(IllegalAction::OutOfTurn { expected });
        }
        if unit.activity.movement.is_some() {
            return Err(IllegalAction::AlreadyMoved);
        }
        unit.ensure_can_act()
    }
}

/// Units of `side` that still owe a movement activation.
fn unmoved(state: &BattleState, side: Side) -> Vec<String> {
    state
        .active_units(side)
        .filter(|u| u.can_act() && u.activity.movement.is_none())
        .map(|u| u.id.clone())
        .collect()
}

fn roll_initiative(ctx: &mut BattleContext) -> SimResult<()> {
    let sides: Vec<Side> = ctx.state.sides().into_iter().collect();
    let mut rerolls = 0;
    let rolls = loop {
        let rolls: Vec<(Side, u8)> = sides.iter().map(|s| (*s, ctx.roll_2d6())).collect();
        let distinct: BTreeSet<u8> = rolls.iter().map(|(_, r)| *r).collect();
        if distinct.len() == rolls.len() {
            break rolls;
        }
        rerolls += 1;
    };

    let winner = rolls.iter().max_by_key(|(_, r)| *r).map(|(s, _)| *s);
    let loser = rolls.iter().min_by_key(|(_, r)| *r).map(|(s, _)| *s);
    let (Some(winner), Some(loser)) = (winner, loser) else {
        return Err(SimError::invariant(ctx.state.next_seq(), "initiative rolled with no sides"));
    };
    let order = activation_order(
        loser,
        unmoved(ctx.state, loser).len(),
        winner,
        unmoved(ctx.state, winner).len(),
    );
    info!("Turn {} initiative: side {winner} wins {rolls:?}", ctx.state.clock.turn);
    ctx.emit(EventKind::InitiativeRolled { rolls, rerolls, winner, order })?;
    Ok(())
}

/// Pass over activation slots whose side has nobody left able to move.
fn skip_idle_slots(ctx: &mut BattleContext) -> SimResult<()> {
    while let Some(side) = ctx.state.clock.side_to_move() {
        if !unmoved(ctx.state, side).is_empty() {
            break;
        }
        ctx.emit(EventKind::ActivationPassed { side })?;
    }
    Ok(())
}

/// Units that never declared a move stand still.
fn finish_movement(ctx: &mut BattleContext) -> SimResult<()> {
    while let Some(side) = ctx.state.clock.side_to_move() {
        match unmoved(ctx.state, side).into_iter().next() {
            Some(unit) => {
                debug!("{unit} holds position");
                movement::execute(ctx, &unit, &MovementOrder::Stationary)?;
            }
            None => ctx.emit(EventKind::ActivationPassed { side })?,
        }
    }
    Ok(())
}

fn resolve_heat(ctx: &mut BattleContext) -> SimResult<()> {
    let ids: Vec<String> = ctx.state.units.values().filter(|u| u.is_active()).map(|u| u.id.clone()).collect();
    for id in ids {
        if ctx.unit(&id)?.is_active() {
            heat::advance_heat(ctx, &id)?;
        }
    }
    psr::drain_queue(ctx)
}

fn end_turn(ctx: &mut BattleContext) -> SimResult<()> {
    pilot::recover_pilots(ctx)?;
    psr::drain_queue(ctx)?;

    if let Some(outcome) = terminal_outcome(ctx.state) {
        info!(
            "Battle {} over on turn {}: {:?}, winner {:?}",
            ctx.state.battle_id, ctx.state.clock.turn, outcome.reason, outcome.winner
        );
        return ctx.emit(EventKind::BattleEnded { winner: outcome.winner, reason: outcome.reason });
    }

    let turn = ctx.state.clock.turn + 1;
    ctx.emit(EventKind::TurnAdvanced { turn })?;
    ctx.emit(EventKind::PhaseChanged { from: Phase::End, to: Phase::Initiative })?;
    info!("Turn {turn} begins");
    Ok(())
}

/// Annihilation first, then the turn limit. At the limit the side with
/// more surviving battle value wins, then more surviving units, else a draw.
pub fn terminal_outcome(state: &BattleState) -> Option<BattleOutcome> {
    let standing: Vec<(Side, u32, usize)> = state
        .sides()
        .into_iter()
        .map(|side| {
            let value = state.active_units(side).map(|u| u.battle_value).sum();
            (side, value, state.active_units(side).count())
        })
        .collect();
    let alive: Vec<Side> = standing.iter().filter(|(_, _, n)| *n > 0).map(|(s, _, _)| *s).collect();

    match alive.as_slice() {
        [] => Some(BattleOutcome { winner: None, reason: EndReason::MutualDestruction }),
        [only] => Some(BattleOutcome { winner: Some(*only), reason: EndReason::Annihilation }),
        _ if state.clock.turn < state.turn_limit => None,
        _ => {
            let by_value: Vec<(Side, u64)> = standing.iter().map(|(s, v, _)| (*s, u64::from(*v))).collect();
            let by_count: Vec<(Side, u64)> = standing.iter().map(|(s, _, n)| (*s, *n as u64)).collect();
            let winner = sole_leader(&by_value).or_else(|| sole_leader(&by_count));
            Some(BattleOutcome { winner, reason: EndReason::TurnLimit })
        }
    }
}

fn sole_leader(scores: &[(Side, u64)]) -> Option<Side> {
    let top = scores.iter().map(|(_, v)| *v).max()?;
    let mut leaders = scores.iter().filter(|(_, v)| *v == top);
    match (leaders.next(), leaders.next()) {
        (Some((side, _)), None) => Some(*side),
        _ => None,
    }
}

/// Auto-resolve a battle with the built-in commander on both sides.
pub fn run_to_completion(seed: u64, forces: &[UnitSpec], config: BattleConfig) -> SimResult<Outcome> {
    let mut battle = Battle::new(&format!("auto-{seed}"), seed, config, forces)?;
    let mut commander = AutoCommander::new();
    drive(&mut battle, &mut commander)?;

    let outcome = battle
        .outcome()
        .cloned()
        .ok_or_else(|| SimError::invariant(battle.state.next_seq(), "battle stopped without an outcome"))?;
    Ok(Outcome {
        winner: outcome.winner,
        reason: outcome.reason,
        events: battle.log,
    })
}

/// Play a battle to its end, asking `commander` for every side's
/// declarations. Rejected declarations are skipped.
pub fn drive(battle: &mut Battle, commander: &mut dyn Commander) -> SimResult<()> {
    while !battle.is_over() {
        match battle.phase() {
            Phase::Movement => {
                while let Some(side) = battle.state.clock.side_to_move() {
                    let Some(declaration) = commander.next_move(&battle.state, &battle.config, side) else {
                        break;
                    };
                    let unit = declaration.unit().to_string();
                    if let Err(e) = battle.apply_declaration(declaration) {
                        if e.illegal_reason().is_none() {
                            return Err(e);
                        }
                        let hold = Declaration::Move { unit, order: MovementOrder::Stationary };
                        if let Err(e) = battle.apply_declaration(hold) {
                            if e.illegal_reason().is_none() {
                                return Err(e);
                            }
                            break;
                        }
                    }
                }
            }
            Phase::WeaponAttack | Phase::PhysicalAttack => {
                for side in battle.state.sides() {
                    for declaration in commander.attacks(&battle.state, &battle.config, side) {
                        if let Err(e) = battle.apply_declaration(declaration) {
                            if e.illegal_reason().is_none() {
                                return Err(e);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
        battle.advance_phase()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        hex::{Facing, HexCoord},
        rng::ScriptedDice,
        unit::Location,
    };

    fn forces() -> Vec<UnitSpec> {
        vec![
            UnitSpec::biped("a", 0, 50, 5)
                .at(HexCoord::new(0, 0), Facing::NORTH)
                .with_weapon("medium_laser", Location::RightArm),
            UnitSpec::biped("b", 1, 50, 5)
                .at(HexCoord::new(0, -6), Facing::SOUTH)
                .with_weapon("medium_laser", Location::RightArm),
        ]
    }

    #[test]
    fn duplicate_unit_ids_are_a_configuration_error() {
        let mut units = forces();
        units[1].id = "a".into();
        let err = Battle::new("t", 1, BattleConfig::default_test(), &units).err().unwrap();
        assert!(matches!(err, SimError::Configuration(_)));
    }

    #[test]
    fn a_single_side_is_a_configuration_error() {
        let mut units = forces();
        units[1].side = 0;
        let err = Battle::new("t", 1, BattleConfig::default_test(), &units).err().unwrap();
        assert!(matches!(err, SimError::Configuration(_)));
    }

    #[test]
    fn initiative_loser_moves_first() {
        // Side 0 rolls 4, side 1 rolls 9.
        let dice = ScriptedDice::from_2d6([4, 9]);
        let mut battle =
            Battle::with_dice("t", 1, BattleConfig::default_test(), &forces(), Box::new(dice)).unwrap();
        battle.advance_phase().unwrap();
        assert_eq!(battle.phase(), Phase::Movement);
        assert_eq!(battle.state().clock.movement_order, vec![0, 1]);

        let err = battle
            .apply_declaration(Declaration::Move { unit: "b".into(), order: MovementOrder::Stationary })
            .unwrap_err();
        assert_eq!(err.illegal_reason(), Some(&IllegalAction::OutOfTurn { expected: 0 }));
    }

    #[test]
    fn tied_initiative_rerolls() {
        let dice = ScriptedDice::from_2d6([7, 7, 8, 3]);
        let mut battle =
            Battle::with_dice("t", 1, BattleConfig::default_test(), &forces(), Box::new(dice)).unwrap();
        let events = battle.advance_phase().unwrap();
        let rolled = events
            .iter()
            .find_map(|e| match &e.kind {
                EventKind::InitiativeRolled { rerolls, winner, .. } => Some((*rerolls, *winner)),
                _ => None,
            })
            .unwrap();
        assert_eq!(rolled, (1, 0));
    }

    #[test]
    fn a_unit_moves_once_per_turn() {
        let dice = ScriptedDice::from_2d6([4, 9]);
        let mut battle =
            Battle::with_dice("t", 1, BattleConfig::default_test(), &forces(), Box::new(dice)).unwrap();
        battle.advance_phase().unwrap();
        battle
            .apply_declaration(Declaration::Move { unit: "a".into(), order: MovementOrder::Stationary })
            .unwrap();
        battle
            .apply_declaration(Declaration::Move { unit: "b".into(), order: MovementOrder::Stationary })
            .unwrap();
        let err = battle
            .apply_declaration(Declaration::Move { unit: "a".into(), order: MovementOrder::Stationary })
            .unwrap_err();
        assert!(err.illegal_reason().is_some());
    }

    #[test]
    fn turn_limit_without_losses_is_a_draw() {
        let config = BattleConfig::default_test().with_turn_limit(1);
        let mut battle = Battle::new("t", 3, config, &forces()).unwrap();
        for _ in 0..6 {
            battle.advance_phase().unwrap();
        }
        let outcome = battle.outcome().unwrap();
        assert_eq!(outcome.reason, EndReason::TurnLimit);
        assert_eq!(outcome.winner, None);
        assert!(battle.advance_phase().unwrap().is_empty());
    }
}
