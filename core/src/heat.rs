//! Heat: generation, dissipation and the effects of running hot.
//!
//! Order within one unit's heat step is fixed: new heat level, then
//! ammunition explosion check, then shutdown check, then life support.

use crate::{
    abilities::{sum_hooks, TraitHook},
    ammo,
    context::BattleContext,
    declaration::MovementMode,
    error::SimResult,
    event::EventKind,
    pilot,
    psr::{PsrReason, PsrTrigger},
    terrain::TerrainMap,
    unit::{MovementRecord, UnitCombatState},
};

/// Heat at or above which a shutdown check is needed.
pub const SHUTDOWN_START: u32 = 14;
/// Heat at or above which shutdown is automatic.
pub const AUTOMATIC_SHUTDOWN: u32 = 30;
pub const ENGINE_HIT_HEAT: u32 = 5;

/// Heat levels that each add their own step to the to-hit number.
pub const TO_HIT_STEPS: [(u32, i32); 4] = [(8, 1), (13, 1), (17, 1), (24, 1)];

/// To-hit penalty for the attacker's current heat: every step reached
/// adds independently.
pub fn heat_to_hit_modifier(heat: u32) -> i32 {
    TO_HIT_STEPS
        .iter()
        .filter(|(threshold, _)| heat >= *threshold)
        .map(|(_, step)| step)
        .sum()
}

/// Walking MP lost to heat.
pub fn heat_movement_penalty(heat: u32) -> u32 {
    heat / 5
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCheck {
    None,
    /// Roll 2d6 at or above the target to stay powered.
    Avoid(u8),
    Automatic,
}

pub fn shutdown_check(heat: u32) -> ShutdownCheck {
    if heat < SHUTDOWN_START {
        ShutdownCheck::None
    } else if heat >= AUTOMATIC_SHUTDOWN {
        ShutdownCheck::Automatic
    } else {
        ShutdownCheck::Avoid((4 + 2 * ((heat - SHUTDOWN_START) / 4)) as u8)
    }
}

/// Target to avoid a heat-induced ammunition explosion.
pub fn ammo_explosion_avoid(heat: u32) -> Option<u8> {
    match heat {
        28.. => Some(8),
        23.. => Some(6),
        19.. => Some(4),
        _ => None,
    }
}

pub fn movement_heat(record: Option<&MovementRecord>) -> u32 {
    let Some(record) = record else {
        return 0;
    };
    match record.mode {
        MovementMode::Stationary | MovementMode::Withdraw => 0,
        MovementMode::Walk | MovementMode::Crawl | MovementMode::StandUp => 1,
        MovementMode::Run => 2,
        MovementMode::Jump => record.hexes.max(3),
    }
}

/// Extra dissipation from standing in water.
pub fn water_cooling(depth: u8) -> u32 {
    match depth {
        0 => 0,
        1 => 2,
        _ => 4,
    }
}

pub fn generated_heat(unit: &UnitCombatState) -> u32 {
    movement_heat(unit.activity.movement.as_ref())
        + unit.activity.weapon_heat
        + ENGINE_HIT_HEAT * unit.damage.engine_hits
}

pub fn dissipation(unit: &UnitCombatState, terrain: &TerrainMap) -> u32 {
    unit.heat_capacity() + water_cooling(terrain.at(unit.position).kind.water_depth())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeatOutcome {
    pub from:       u32,
    pub to:         u32,
    pub generated:  u32,
    pub dissipated: u32,
    pub shutdown:   bool,
    pub exploded:   Option<usize>,
    /// Set when a shut-down unit tried to restart.
    pub restarted:  Option<bool>,
}

/// Run one unit's heat step.
pub fn advance_heat(ctx: &mut BattleContext, unit_id: &str) -> SimResult<HeatOutcome> {
    let unit = ctx.unit(unit_id)?;
    if !unit.is_active() {
        return Ok(HeatOutcome::default());
    }
    let from = unit.heat;
    let generated = generated_heat(unit);
    let dissipated = dissipation(unit, &ctx.config.terrain);
    let to = (from + generated).saturating_sub(dissipated);
    let was_shutdown = unit.shutdown;
    let avoid_bonus = sum_hooks(&unit.traits(), |h| match h {
        TraitHook::ShutdownAvoid(d) => Some(*d),
        _ => None,
    });

    ctx.emit(EventKind::HeatChanged {
        unit: unit_id.to_string(),
        from,
        to,
        generated,
        dissipated,
    })?;
    let mut out = HeatOutcome { from, to, generated, dissipated, ..Default::default() };

    if was_shutdown {
        let (roll, target, success) = match shutdown_check(to) {
            ShutdownCheck::None => (None, None, true),
            ShutdownCheck::Automatic => (None, None, false),
            ShutdownCheck::Avoid(t) => {
                let target = (i32::from(t) + avoid_bonus).clamp(2, 12) as u8;
                let roll = ctx.roll_2d6();
                (Some(roll), Some(target), roll >= target)
            }
        };
        ctx.emit(EventKind::StartupResolved {
            unit: unit_id.to_string(),
            roll,
            target,
            success,
        })?;
        out.restarted = Some(success);
        out.shutdown = !success;
        return Ok(out);
    }

    if let Some(target) = ammo_explosion_avoid(to) {
        let roll = ctx.roll_2d6();
        if roll < target {
            if let Some(bin) = ammo::most_dangerous_bin(ctx.unit(unit_id)?) {
                log::warn!("{unit_id}: heat {to} cooks off bin {bin} (rolled {roll} < {target})");
                ammo::explode_bin(ctx, unit_id, bin)?;
                out.exploded = Some(bin);
            }
        }
        if !ctx.unit(unit_id)?.is_active() {
            return Ok(out);
        }
    }

    let shut_down = match shutdown_check(to) {
        ShutdownCheck::None => false,
        ShutdownCheck::Automatic => {
            ctx.emit(EventKind::ShutdownTriggered {
                unit: unit_id.to_string(),
                heat: to,
                automatic: true,
            })?;
            true
        }
        ShutdownCheck::Avoid(t) => {
            let target = (i32::from(t) + avoid_bonus).clamp(2, 12) as u8;
            let roll = ctx.roll_2d6();
            if roll >= target {
                ctx.emit(EventKind::ShutdownAvoided {
                    unit: unit_id.to_string(),
                    roll,
                    target,
                })?;
                false
            } else {
                ctx.emit(EventKind::ShutdownTriggered {
                    unit: unit_id.to_string(),
                    heat: to,
                    automatic: false,
                })?;
                true
            }
        }
    };
    if shut_down {
        log::info!("{unit_id} shut down at heat {to}");
        out.shutdown = true;
        if !ctx.unit(unit_id)?.prone {
            ctx.queue_psr(unit_id, PsrTrigger::new(PsrReason::Shutdown).automatic());
        }
    }

    let unit = ctx.unit(unit_id)?;
    if unit.damage.life_support_hits > 0 && to >= 15 {
        let amount = if to >= 26 { 2 } else { 1 };
        pilot::damage_pilot(ctx, unit_id, amount, "life_support")?;
    }
    Ok(out)
}
