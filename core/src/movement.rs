//! Movement: path validation and execution.
//!
//! A path is validated in full before anything is emitted, so an illegal
//! order never touches state. Execution emits one UnitMoved per stretch
//! between piloting checkpoints; a fall at a checkpoint ends the move.

use crate::{
    context::BattleContext,
    declaration::{MoveStep, MovementMode, MovementOrder},
    error::{IllegalAction, SimError, SimResult},
    event::EventKind,
    hex::{Facing, HexCoord},
    psr::{self, PsrReason, PsrTrigger},
    state::BattleState,
    terrain::{TerrainKind, TerrainMap},
    unit::UnitCombatState,
};

/// Steeper changes than this cannot be walked.
pub const MAX_CLIMB: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveSegment {
    pub path:       Vec<HexCoord>,
    pub facing:     Facing,
    pub hexes:      u32,
    pub mp:         u32,
    /// PSR to roll on reaching the end of this stretch.
    pub checkpoint: Option<PsrTrigger>,
}

impl MoveSegment {
    fn starting(facing: Facing) -> Self {
        Self { path: Vec::new(), facing, hexes: 0, mp: 0, checkpoint: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementPlan {
    pub mode:         MovementMode,
    pub segments:     Vec<MoveSegment>,
    /// PSR once the whole move is done.
    pub final_check:  Option<PsrTrigger>,
    pub mp_available: u32,
}

impl MovementPlan {
    pub fn mp_spent(&self) -> u32 {
        self.segments.iter().map(|s| s.mp).sum()
    }

    pub fn hexes(&self) -> u32 {
        self.segments.iter().map(|s| s.hexes).sum()
    }

    pub fn destination(&self, from: HexCoord) -> HexCoord {
        self.segments
            .iter()
            .rev()
            .find_map(|s| s.path.last().copied())
            .unwrap_or(from)
    }
}

/// MP to enter `to` from `from` on foot.
pub fn entry_cost(terrain: &TerrainMap, from: HexCoord, to: HexCoord) -> Result<u32, IllegalAction> {
    let a = terrain.at(from);
    let b = terrain.at(to);
    let climb = (b.elevation - a.elevation).unsigned_abs();
    if climb > MAX_CLIMB {
        return Err(IllegalAction::IllegalPath(format!(
            "elevation change of {climb} levels into ({}, {})",
            to.q, to.r
        )));
    }
    Ok(1 + b.kind.entry_surcharge() + climb)
}

fn water_entry_modifier(depth: u8) -> i32 {
    match depth {
        0 | 1 => -1,
        2 => 0,
        _ => 1,
    }
}

/// Validate an order against the unit and the map. Pure.
pub fn plan(
    unit: &UnitCombatState,
    order: &MovementOrder,
    state: &BattleState,
    terrain: &TerrainMap,
) -> Result<MovementPlan, IllegalAction> {
    match order {
        MovementOrder::Stationary | MovementOrder::Withdraw => Ok(MovementPlan {
            mode:         order.mode(),
            segments:     Vec::new(),
            final_check:  None,
            mp_available: 0,
        }),
        MovementOrder::Walk { steps } => {
            if unit.prone {
                return Err(IllegalAction::Prone);
            }
            step_path(unit, steps, MovementMode::Walk, unit.walk_mp(), state, terrain)
        }
        MovementOrder::Run { steps } => {
            if unit.prone {
                return Err(IllegalAction::Prone);
            }
            if unit.legs_destroyed() > 0 {
                return Err(IllegalAction::Forbidden("cannot run with a destroyed leg"));
            }
            let mut plan = step_path(unit, steps, MovementMode::Run, unit.run_mp(), state, terrain)?;
            if unit.damage.gyro_hits > 0 || unit.hip_destroyed() {
                plan.final_check = Some(PsrTrigger::new(PsrReason::RunningDamaged));
            }
            Ok(plan)
        }
        MovementOrder::Crawl { steps } => {
            if !unit.prone {
                return Err(IllegalAction::NotProne);
            }
            step_path(unit, steps, MovementMode::Crawl, unit.walk_mp(), state, terrain)
        }
        MovementOrder::Jump { destination, facing } => {
            if unit.prone {
                return Err(IllegalAction::Prone);
            }
            let available = unit.jump_mp();
            if available == 0 {
                return Err(IllegalAction::Forbidden("no working jump jets"));
            }
            let distance = unit.position.distance(*destination);
            if distance == 0 {
                return Err(IllegalAction::IllegalPath("jump must leave the hex".into()));
            }
            if distance > available {
                return Err(IllegalAction::InsufficientMovement { needed: distance, available });
            }
            if let Some(other) = state.unit_at(*destination) {
                return Err(IllegalAction::IllegalPath(format!("destination occupied by {}", other.id)));
            }
            let final_check = unit
                .has_leg_or_gyro_damage()
                .then(|| PsrTrigger::new(PsrReason::JumpingDamaged));
            Ok(MovementPlan {
                mode: MovementMode::Jump,
                segments: vec![MoveSegment {
                    path:       vec![*destination],
                    facing:     *facing,
                    hexes:      distance,
                    mp:         distance,
                    checkpoint: None,
                }],
                final_check,
                mp_available: available,
            })
        }
        MovementOrder::StandUp { facing } => {
            if !unit.prone {
                return Err(IllegalAction::NotProne);
            }
            if unit.gyro_destroyed() {
                return Err(IllegalAction::Forbidden("cannot stand with a destroyed gyro"));
            }
            if unit.legs_destroyed() >= 2 {
                return Err(IllegalAction::Forbidden("cannot stand without legs"));
            }
            let available = unit.walk_mp();
            if available == 0 {
                return Err(IllegalAction::InsufficientMovement { needed: 1, available });
            }
            Ok(MovementPlan {
                mode: MovementMode::StandUp,
                segments: vec![MoveSegment {
                    path:       Vec::new(),
                    facing:     *facing,
                    hexes:      0,
                    mp:         available,
                    checkpoint: None,
                }],
                final_check: Some(PsrTrigger::new(PsrReason::StandUp).no_fall()),
                mp_available: available,
            })
        }
    }
}

fn step_path(
    unit: &UnitCombatState,
    steps: &[MoveStep],
    mode: MovementMode,
    budget: u32,
    state: &BattleState,
    terrain: &TerrainMap,
) -> Result<MovementPlan, IllegalAction> {
    let mut pos = unit.position;
    let mut facing = unit.facing;
    let mut spent = 0;
    let mut segments = Vec::new();
    let mut current = MoveSegment::starting(facing);

    for step in steps {
        let mut checkpoint = None;
        let cost = match step {
            MoveStep::TurnLeft | MoveStep::TurnRight => {
                facing = facing.rotate(if *step == MoveStep::TurnLeft { -1 } else { 1 });
                1
            }
            MoveStep::Forward | MoveStep::Backward => {
                if *step == MoveStep::Backward && mode == MovementMode::Run {
                    return Err(IllegalAction::IllegalPath("cannot run backward".into()));
                }
                let dir = if *step == MoveStep::Forward { facing } else { facing.opposite() };
                let next = pos.neighbor(dir);
                if let Some(other) = state.unit_at(next) {
                    if other.id != unit.id {
                        return Err(IllegalAction::IllegalPath(format!(
                            "({}, {}) is occupied by {}",
                            next.q, next.r, other.id
                        )));
                    }
                }
                let terrain_cost = entry_cost(terrain, pos, next)?;
                let kind = terrain.at(next).kind;
                let depth = kind.water_depth();
                if mode == MovementMode::Run && depth > 0 {
                    return Err(IllegalAction::IllegalPath("cannot run into water".into()));
                }
                if mode != MovementMode::Crawl {
                    if kind == TerrainKind::Rubble {
                        checkpoint = Some(PsrTrigger::new(PsrReason::EnteredRubble));
                    } else if depth > 0 {
                        checkpoint = Some(
                            PsrTrigger::new(PsrReason::EnteredWater).with_modifier(water_entry_modifier(depth)),
                        );
                    }
                }
                pos = next;
                current.path.push(next);
                current.hexes += 1;
                if mode == MovementMode::Crawl { 1 } else { terrain_cost }
            }
        };
        spent += cost;
        if spent > budget {
            return Err(IllegalAction::InsufficientMovement { needed: spent, available: budget });
        }
        current.mp += cost;
        current.facing = facing;
        if checkpoint.is_some() {
            current.checkpoint = checkpoint;
            segments.push(std::mem::replace(&mut current, MoveSegment::starting(facing)));
        }
    }
    if segments.is_empty() || current.mp > 0 {
        segments.push(current);
    }

    Ok(MovementPlan { mode, segments, final_check: None, mp_available: budget })
}

/// Carry out a validated order for the unit whose activation it is.
pub fn execute(ctx: &mut BattleContext, unit_id: &str, order: &MovementOrder) -> SimResult<MovementPlan> {
    let unit = ctx.unit(unit_id)?;
    let side = unit.side;
    let plan = plan(unit, order, &*ctx.state, &ctx.config.terrain)
        .map_err(|reason| SimError::illegal(unit_id, reason))?;

    match order {
        MovementOrder::Withdraw => {
            ctx.emit(EventKind::UnitMoved {
                unit:   unit_id.to_string(),
                mode:   MovementMode::Withdraw,
                path:   Vec::new(),
                facing: ctx.unit(unit_id)?.facing,
                hexes:  0,
                mp:     0,
            })?;
            ctx.emit(EventKind::UnitWithdrew { unit: unit_id.to_string() })?;
            log::info!("{unit_id} withdraws from the field");
        }
        MovementOrder::StandUp { facing } => {
            ctx.emit(EventKind::UnitMoved {
                unit:   unit_id.to_string(),
                mode:   MovementMode::StandUp,
                path:   Vec::new(),
                facing: ctx.unit(unit_id)?.facing,
                hexes:  0,
                mp:     plan.mp_spent(),
            })?;
            if let Some(trigger) = &plan.final_check {
                let outcome = psr::resolve_psr(ctx, unit_id, trigger)?;
                if outcome.passed {
                    ctx.emit(EventKind::UnitStoodUp {
                        unit:   unit_id.to_string(),
                        facing: *facing,
                    })?;
                }
            }
        }
        _ => {
            let mut fell = false;
            for segment in &plan.segments {
                ctx.emit(EventKind::UnitMoved {
                    unit:   unit_id.to_string(),
                    mode:   plan.mode,
                    path:   segment.path.clone(),
                    facing: segment.facing,
                    hexes:  segment.hexes,
                    mp:     segment.mp,
                })?;
                if let Some(trigger) = &segment.checkpoint {
                    if psr::resolve_psr(ctx, unit_id, trigger)?.fell {
                        fell = true;
                        break;
                    }
                }
            }
            if !fell {
                if let Some(trigger) = &plan.final_check {
                    psr::resolve_psr(ctx, unit_id, trigger)?;
                }
            }
        }
    }

    ctx.emit(EventKind::ActivationEnded {
        unit: unit_id.to_string(),
        side,
    })?;
    psr::drain_queue(ctx)?;
    log::debug!("{unit_id} moved {:?}: {} hexes, {} MP", plan.mode, plan.hexes(), plan.mp_spent());
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::WeaponCatalog, unit::UnitSpec};

    fn walker() -> UnitCombatState {
        UnitSpec::biped("w", 0, 50, 4).build(&WeaponCatalog::builtin()).unwrap()
    }

    #[test]
    fn woods_cost_extra() {
        let terrain = TerrainMap::open_field().with(HexCoord::new(0, -1), TerrainKind::HeavyWoods);
        let plan = plan(
            &walker(),
            &MovementOrder::Walk { steps: vec![MoveStep::Forward] },
            &BattleState::default(),
            &terrain,
        )
        .unwrap();
        assert_eq!(plan.mp_spent(), 3);
        assert_eq!(plan.hexes(), 1);
    }

    #[test]
    fn overspending_is_rejected() {
        let err = plan(
            &walker(),
            &MovementOrder::Walk { steps: vec![MoveStep::Forward; 5] },
            &BattleState::default(),
            &TerrainMap::open_field(),
        )
        .unwrap_err();
        assert_eq!(err, IllegalAction::InsufficientMovement { needed: 5, available: 4 });
    }

    #[test]
    fn running_forbids_reversing() {
        let err = plan(
            &walker(),
            &MovementOrder::Run { steps: vec![MoveStep::Backward] },
            &BattleState::default(),
            &TerrainMap::open_field(),
        )
        .unwrap_err();
        assert!(matches!(err, IllegalAction::IllegalPath(_)));
    }

    #[test]
    fn rubble_splits_the_path_at_a_checkpoint() {
        let terrain = TerrainMap::open_field().with(HexCoord::new(0, -1), TerrainKind::Rubble);
        let plan = plan(
            &walker(),
            &MovementOrder::Walk { steps: vec![MoveStep::Forward, MoveStep::Forward] },
            &BattleState::default(),
            &terrain,
        )
        .unwrap();
        assert_eq!(plan.segments.len(), 2);
        assert!(plan.segments[0].checkpoint.is_some());
        assert_eq!(plan.mp_spent(), 3);
    }
}
