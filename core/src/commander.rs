//! Commanders: whoever decides what a side declares.
//!
//! RULE: A commander only reads state and returns declarations. The
//! battle validates everything it is handed, so a commander can be
//! wrong without corrupting anything.

use crate::{
    config::BattleConfig,
    declaration::{
        AttackDeclaration, Declaration, MoveStep, MovementOrder, PhysicalDeclaration, PhysicalKind,
    },
    hex::{nearest_directions, Facing},
    movement,
    phase::Phase,
    physical::{self, PhysicalDeclarations},
    state::BattleState,
    types::Side,
    unit::{Location, UnitCombatState},
    weapon_attack::{self, firing_heat, PendingAttack, WeaponDeclarations},
};

/// The contract every commander must fulfil.
pub trait Commander {
    fn name(&self) -> &'static str;

    /// The next movement activation for `side`, or None to let the
    /// battle fill the remaining slots with stationary moves.
    fn next_move(&mut self, state: &BattleState, config: &BattleConfig, side: Side) -> Option<Declaration>;

    /// Twists and attacks for `side` in the current attack phase.
    fn attacks(&mut self, state: &BattleState, config: &BattleConfig, side: Side) -> Vec<Declaration>;
}

/// Deterministic commander used for auto-resolve. Closes on the nearest
/// enemy, fires everything that keeps it under its heat budget, and
/// kicks or punches when adjacent.
#[derive(Debug, Clone, Default)]
pub struct AutoCommander {
    /// Heat the commander is willing to carry over dissipation.
    pub heat_margin: u32,
}

impl AutoCommander {
    pub fn new() -> Self {
        Self { heat_margin: 3 }
    }
}

impl Commander for AutoCommander {
    fn name(&self) -> &'static str {
        "auto"
    }

    fn next_move(&mut self, state: &BattleState, config: &BattleConfig, side: Side) -> Option<Declaration> {
        let unit = state
            .active_units(side)
            .find(|u| u.can_act() && u.activity.movement.is_none())?;
        let order = match nearest_enemy(state, unit) {
            Some(enemy) => approach(unit, enemy, state, config),
            None => MovementOrder::Stationary,
        };
        Some(Declaration::Move { unit: unit.id.clone(), order })
    }

    fn attacks(&mut self, state: &BattleState, config: &BattleConfig, side: Side) -> Vec<Declaration> {
        match state.clock.phase {
            Phase::WeaponAttack => self.weapon_attacks(state, config, side),
            Phase::PhysicalAttack => physical_attacks(state, config, side),
            _ => Vec::new(),
        }
    }
}

impl AutoCommander {
    fn weapon_attacks(&self, state: &BattleState, config: &BattleConfig, side: Side) -> Vec<Declaration> {
        let mut pending = WeaponDeclarations::default();
        let mut out = Vec::new();
        for unit in state.active_units(side).filter(|u| u.can_act()) {
            let Some(target) = nearest_enemy(state, unit) else {
                continue;
            };
            let budget = (unit.heat_capacity() + self.heat_margin).saturating_sub(unit.heat);
            let mut heat = 0;
            for (index, mount) in unit.weapons.iter().enumerate() {
                let Some(spec) = config.catalog.weapon(&mount.weapon_id) else {
                    continue;
                };
                let cost = firing_heat(spec, mount, 1);
                if heat + cost > budget {
                    continue;
                }
                let decl = AttackDeclaration::new(&unit.id, &target.id, index);
                if let Ok(primary) = weapon_attack::validate(state, config, &pending, &decl) {
                    heat += cost;
                    pending.attacks.push(PendingAttack { declaration: decl.clone(), primary });
                    out.push(Declaration::WeaponAttack(decl));
                }
            }
        }
        out
    }
}

fn physical_attacks(state: &BattleState, config: &BattleConfig, side: Side) -> Vec<Declaration> {
    let mut pending = PhysicalDeclarations::default();
    let mut out = Vec::new();
    for unit in state.active_units(side).filter(|u| u.can_act() && !u.prone) {
        let Some(target) = nearest_enemy(state, unit) else {
            continue;
        };
        if unit.position.distance(target.position) != 1 {
            continue;
        }
        let kicks = [Location::RightLeg, Location::LeftLeg].map(|leg| (PhysicalKind::Kick, leg));
        let punches = [Location::RightArm, Location::LeftArm].map(|arm| (PhysicalKind::Punch, arm));

        let mut try_attack = |kind: PhysicalKind, limb: Location| -> bool {
            let decl = PhysicalDeclaration::new(&unit.id, &target.id, kind, Some(limb));
            if physical::validate(state, config, &pending, &decl).is_ok() {
                pending.attacks.push(decl.clone());
                out.push(Declaration::PhysicalAttack(decl));
                true
            } else {
                false
            }
        };
        if !kicks.iter().any(|(kind, leg)| try_attack(*kind, *leg)) {
            for (kind, arm) in punches {
                try_attack(kind, arm);
            }
        }
    }
    out
}

/// Closest active enemy, ties broken by unit id.
fn nearest_enemy<'a>(state: &'a BattleState, unit: &UnitCombatState) -> Option<&'a UnitCombatState> {
    state
        .units
        .values()
        .filter(|u| u.side != unit.side && u.is_active())
        .min_by_key(|u| (unit.position.distance(u.position), u.id.clone()))
}

/// One hexside turn that brings `facing` closer to `desired`.
fn turn_toward(facing: Facing, desired: Facing) -> MoveStep {
    if facing.rotate(1).turns_to(desired) < facing.turns_to(desired) {
        MoveStep::TurnRight
    } else {
        MoveStep::TurnLeft
    }
}

/// Walk toward `enemy`, ending adjacent and facing it where MP allow.
/// The plan is trimmed from the end until the movement rules accept it.
fn approach(unit: &UnitCombatState, enemy: &UnitCombatState, state: &BattleState, config: &BattleConfig) -> MovementOrder {
    if unit.prone {
        let facing = nearest_directions(unit.position, enemy.position)
            .first()
            .copied()
            .unwrap_or(unit.facing);
        return MovementOrder::StandUp { facing };
    }

    let mut steps = Vec::new();
    let mut position = unit.position;
    let mut facing = unit.facing;
    for _ in 0..unit.walk_mp() {
        let Some(desired) = nearest_directions(position, enemy.position).first().copied() else {
            break;
        };
        if desired != facing {
            let step = turn_toward(facing, desired);
            facing = facing.rotate(if step == MoveStep::TurnLeft { -1 } else { 1 });
            steps.push(step);
        } else if position.distance(enemy.position) > 1 {
            position = position.neighbor(facing);
            steps.push(MoveStep::Forward);
        } else {
            break;
        }
    }

    while !steps.is_empty() {
        let order = MovementOrder::Walk { steps: steps.clone() };
        if movement::plan(unit, &order, state, &config.terrain).is_ok() {
            return order;
        }
        steps.pop();
    }
    MovementOrder::Stationary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::WeaponCatalog,
        event::{EventKind, GameEvent},
        hex::HexCoord,
        unit::UnitSpec,
    };

    fn state_with(units: Vec<UnitSpec>, phase: Phase) -> BattleState {
        let catalog = WeaponCatalog::builtin();
        let units = units.iter().map(|s| s.build(&catalog).unwrap()).collect();
        let mut state = BattleState::default();
        state
            .apply(&GameEvent {
                seq:   0,
                turn:  1,
                phase: Phase::Initiative,
                kind:  EventKind::BattleStarted {
                    battle_id:  "t".into(),
                    seed:       0,
                    turn_limit: 10,
                    units,
                },
            })
            .unwrap();
        state.clock.phase = phase;
        state
    }

    #[test]
    fn walks_toward_the_enemy() {
        let state = state_with(
            vec![
                UnitSpec::biped("a", 0, 50, 4).at(HexCoord::new(0, 0), Facing::NORTH),
                UnitSpec::biped("b", 1, 50, 4).at(HexCoord::new(0, -8), Facing::SOUTH),
            ],
            Phase::Movement,
        );
        let config = BattleConfig::default_test();
        let decl = AutoCommander::new().next_move(&state, &config, 0).unwrap();
        assert_eq!(
            decl,
            Declaration::Move {
                unit:  "a".into(),
                order: MovementOrder::Walk { steps: vec![MoveStep::Forward; 4] },
            }
        );
    }

    #[test]
    fn kicks_an_adjacent_enemy() {
        let state = state_with(
            vec![
                UnitSpec::biped("a", 0, 50, 4).at(HexCoord::new(0, 0), Facing::NORTH),
                UnitSpec::biped("b", 1, 50, 4).at(HexCoord::new(0, -1), Facing::SOUTH),
            ],
            Phase::PhysicalAttack,
        );
        let config = BattleConfig::default_test();
        let decls = AutoCommander::new().attacks(&state, &config, 0);
        assert_eq!(decls.len(), 1);
        assert!(matches!(
            &decls[0],
            Declaration::PhysicalAttack(p) if p.kind == PhysicalKind::Kick
        ));
    }

    #[test]
    fn stays_inside_the_heat_budget() {
        let mut ppcs = UnitSpec::biped("a", 0, 50, 4).at(HexCoord::new(0, 0), Facing::NORTH);
        for loc in [Location::RightArm, Location::LeftArm, Location::RightTorso] {
            ppcs = ppcs.with_weapon("ppc", loc);
        }
        let state = state_with(
            vec![ppcs, UnitSpec::biped("b", 1, 50, 4).at(HexCoord::new(0, -5), Facing::SOUTH)],
            Phase::WeaponAttack,
        );
        let config = BattleConfig::default_test();
        // Ten sinks plus a margin of three: two PPCs (20 heat) are too hot.
        let decls = AutoCommander::new().attacks(&state, &config, 0);
        assert_eq!(decls.len(), 1);
    }
}
