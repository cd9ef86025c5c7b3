//! Pilot wounds and consciousness.

use crate::{
    abilities::{sum_hooks, TraitHook},
    context::BattleContext,
    damage::destroy_unit,
    error::SimResult,
    event::EventKind,
    psr::{PsrReason, PsrTrigger},
    unit::{DestructionCause, UnitCombatState},
};

/// Wounds that kill the pilot.
pub const FATAL_WOUNDS: u32 = 6;

/// Consciousness target for a wound total (1-5).
const CONSCIOUSNESS: [i32; 5] = [3, 5, 7, 10, 11];

pub fn consciousness_target(unit: &UnitCombatState) -> i32 {
    let wounds = unit.pilot.wounds.clamp(1, 5);
    let base = CONSCIOUSNESS[(wounds - 1) as usize];
    base + sum_hooks(&unit.traits(), |h| match h {
        TraitHook::ConsciousnessRoll(d) => Some(*d),
        _ => None,
    })
}

/// Wound the pilot. Every wound that does not kill forces a
/// consciousness roll.
pub fn damage_pilot(ctx: &mut BattleContext, unit_id: &str, amount: u32, source: &str) -> SimResult<()> {
    let unit = ctx.unit(unit_id)?;
    if amount == 0 || unit.is_destroyed() || unit.withdrawn {
        return Ok(());
    }
    let wounds = (unit.pilot.wounds + amount).min(FATAL_WOUNDS);
    ctx.emit(EventKind::PilotDamaged {
        unit: unit_id.to_string(),
        amount,
        wounds,
        source: source.to_string(),
    })?;
    log::info!("{unit_id} pilot takes {amount} from {source} ({wounds} wounds)");

    if wounds >= FATAL_WOUNDS {
        return destroy_unit(ctx, unit_id, DestructionCause::PilotKilled);
    }
    if ctx.unit(unit_id)?.pilot.conscious {
        roll_consciousness(ctx, unit_id)?;
    }
    Ok(())
}

/// Roll to stay (or become) conscious. Returns the new state.
pub fn roll_consciousness(ctx: &mut BattleContext, unit_id: &str) -> SimResult<bool> {
    let unit = ctx.unit(unit_id)?;
    let target = consciousness_target(unit);
    let was_conscious = unit.pilot.conscious;
    let standing = !unit.prone;
    let roll = ctx.roll_2d6();
    let conscious = i32::from(roll) >= target;
    ctx.emit(EventKind::ConsciousnessRolled {
        unit: unit_id.to_string(),
        target,
        roll,
        conscious,
    })?;
    if was_conscious && !conscious {
        log::info!("{unit_id} pilot knocked unconscious");
        if standing {
            ctx.queue_psr(unit_id, PsrTrigger::new(PsrReason::PilotUnconscious).automatic());
        }
    }
    Ok(conscious)
}

/// End-phase recovery roll for every unconscious pilot still alive.
pub fn recover_pilots(ctx: &mut BattleContext) -> SimResult<()> {
    let out: Vec<String> = ctx
        .state
        .units
        .values()
        .filter(|u| u.is_active() && !u.pilot.conscious && !u.pilot.killed)
        .map(|u| u.id.clone())
        .collect();
    for id in out {
        if roll_consciousness(ctx, &id)? {
            log::info!("{id} pilot regains consciousness");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{abilities::TraitId, config::WeaponCatalog, unit::UnitSpec};

    #[test]
    fn iron_man_lowers_consciousness_target() {
        let catalog = WeaponCatalog::builtin();
        let mut plain = UnitSpec::biped("a", 0, 50, 5).build(&catalog).unwrap();
        let mut tough = UnitSpec::biped("b", 0, 50, 5)
            .with_ability(TraitId::IronMan)
            .build(&catalog)
            .unwrap();
        plain.pilot.wounds = 3;
        tough.pilot.wounds = 3;
        assert_eq!(consciousness_target(&plain), 7);
        assert_eq!(consciousness_target(&tough), 5);
    }
}
