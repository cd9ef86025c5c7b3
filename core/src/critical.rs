//! Critical hit determination and component effects.

use crate::{
    ammo,
    context::BattleContext,
    damage::{destroy_location, destroy_unit},
    error::{SimError, SimResult},
    event::EventKind,
    psr::{self, PsrReason, PsrTrigger},
    unit::{ActuatorKind, DestructionCause, Location, SlotContent},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CriticalOutcome {
    pub roll:       u8,
    pub components: Vec<SlotContent>,
    /// A limb or the head was torn off by a roll of 12.
    pub blown_off:  bool,
}

/// Critical hits for a 2d6 determination roll.
pub fn critical_count(roll: u8) -> u8 {
    match roll {
        0..=7 => 0,
        8 | 9 => 1,
        10 | 11 => 2,
        _ => 3,
    }
}

/// Roll for criticals in a location and apply whatever comes up.
pub fn resolve_criticals(
    ctx: &mut BattleContext,
    unit_id: &str,
    location: Location,
    through_armor: bool,
) -> SimResult<CriticalOutcome> {
    let roll = ctx.roll_2d6();
    let mut out = CriticalOutcome { roll, ..Default::default() };

    if roll >= 12 && location.is_limb_or_head() {
        ctx.emit(EventKind::CriticalHitRolled {
            unit: unit_id.to_string(),
            location,
            roll,
            criticals: 0,
            through_armor,
        })?;
        log::info!("{unit_id}: {location} blown off");
        destroy_location(ctx, unit_id, location)?;
        out.blown_off = true;
        return Ok(out);
    }

    let count = critical_count(roll);
    ctx.emit(EventKind::CriticalHitRolled {
        unit: unit_id.to_string(),
        location,
        roll,
        criticals: count,
        through_armor,
    })?;

    for _ in 0..count {
        let unit = ctx.unit(unit_id)?;
        if unit.is_destroyed() || unit.location_destroyed(location) {
            break;
        }
        let live = unit.location(location).live_slots();
        if live.is_empty() {
            break;
        }
        let slot = live[ctx.dice.pick(live.len())];
        out.components.push(apply_critical(ctx, unit_id, location, slot)?);
    }
    Ok(out)
}

/// Knock out one slot and apply the component's immediate effect.
pub fn apply_critical(
    ctx: &mut BattleContext,
    unit_id: &str,
    location: Location,
    slot: usize,
) -> SimResult<SlotContent> {
    let content = ctx
        .unit(unit_id)?
        .location(location)
        .slots
        .get(slot)
        .map(|s| s.content)
        .ok_or_else(|| {
            SimError::invariant(ctx.state.next_seq(), format!("{unit_id} {location} has no slot {slot}"))
        })?;

    ctx.emit(EventKind::ComponentDamaged {
        unit: unit_id.to_string(),
        location,
        slot,
        component: content,
    })?;
    log::info!("{unit_id}: critical hit on {location} slot {slot} ({content:?})");

    let unit = ctx.unit(unit_id)?;
    let standing = unit.is_active() && !unit.prone;
    match content {
        SlotContent::Engine => {
            if unit.damage.engine_hits >= 3 {
                destroy_unit(ctx, unit_id, DestructionCause::EngineDestroyed)?;
            }
        }
        SlotContent::Gyro => {
            if unit.gyro_destroyed() {
                if standing {
                    psr::resolve_psr(ctx, unit_id, &PsrTrigger::new(PsrReason::GyroDestroyed).automatic())?;
                }
            } else if standing {
                ctx.queue_psr(unit_id, PsrTrigger::new(PsrReason::GyroHit));
            }
        }
        SlotContent::Cockpit => destroy_unit(ctx, unit_id, DestructionCause::CockpitDestroyed)?,
        SlotContent::Actuator(ActuatorKind::Hip) => {
            if standing {
                ctx.queue_psr(unit_id, PsrTrigger::new(PsrReason::HipHit));
            }
        }
        SlotContent::Actuator(ActuatorKind::UpperLeg | ActuatorKind::LowerLeg | ActuatorKind::Foot) => {
            if standing {
                ctx.queue_psr(unit_id, PsrTrigger::new(PsrReason::LegActuatorHit));
            }
        }
        SlotContent::Ammo(bin) => {
            ammo::explode_bin(ctx, unit_id, bin)?;
        }
        _ => {}
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn determination_table() {
        assert_eq!(critical_count(7), 0);
        assert_eq!(critical_count(8), 1);
        assert_eq!(critical_count(9), 1);
        assert_eq!(critical_count(10), 2);
        assert_eq!(critical_count(11), 2);
        assert_eq!(critical_count(12), 3);
    }
}
