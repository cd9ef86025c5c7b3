//! Damage application: armour, structure, transfer and destruction.
//!
//! RULE: Every point requested is accounted for exactly once, as armour,
//! structure, head-capped, vented by CASE or lost off the end of the
//! transfer chain. `DamageOutcome::accounted` always equals `requested`.

use crate::{
    context::BattleContext,
    critical,
    error::SimResult,
    event::{DamageKind, EventKind},
    hit_location::HitLocation,
    psr::{PsrReason, PsrTrigger},
    unit::{CaseKind, DestructionCause, Location},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DamageOutcome {
    pub requested: u32,
    pub armor:     u32,
    pub structure: u32,
    /// Removed by the head cap.
    pub capped:    u32,
    /// Released through CASE.
    pub vented:    u32,
    /// Nowhere left to go: centre torso or head gone, or the unit was
    /// already destroyed.
    pub lost:      u32,
    pub locations_destroyed: Vec<Location>,
    /// Locations that took structure damage and survived, in the order hit.
    pub exposed:   Vec<Location>,
    pub unit_destroyed: bool,
}

impl DamageOutcome {
    pub fn accounted(&self) -> u32 {
        self.armor + self.structure + self.capped + self.vented + self.lost
    }
}

/// Next location in the transfer chain. Rear damage only stays on the
/// rear when moving from one torso to another.
fn next_in_chain(location: Location, rear: bool) -> Option<(Location, bool)> {
    let next = location.transfer()?;
    Some((next, rear && location.is_torso() && next.is_torso()))
}

/// Apply damage to one location, transferring inward as locations fall,
/// and run critical checks for every location whose structure was hit.
pub fn apply_damage(
    ctx: &mut BattleContext,
    unit_id: &str,
    location: Location,
    rear: bool,
    amount: u32,
    kind: DamageKind,
) -> SimResult<DamageOutcome> {
    let mut out = DamageOutcome { requested: amount, ..Default::default() };
    if amount == 0 {
        return Ok(out);
    }
    if ctx.unit(unit_id)?.is_destroyed() {
        out.lost = amount;
        return Ok(out);
    }

    let mut remaining = amount;
    let cap = ctx.config.rules.head_cap;
    if location == Location::Head && kind.head_capped() && remaining > cap {
        out.capped = remaining - cap;
        remaining = cap;
    }

    // Explosions start inside the armour.
    let internal = kind == DamageKind::AmmoExplosion;
    let origin_case = ctx.unit(unit_id)?.location(location).case;
    if internal && origin_case == CaseKind::CaseII {
        let applied = remaining.min(1);
        out.vented = remaining - applied;
        remaining = applied;
    }

    let mut loc = location;
    let mut rear = rear && location.has_rear();
    loop {
        let unit = ctx.unit(unit_id)?;
        if unit.is_destroyed() {
            out.lost += remaining;
            break;
        }
        let state = unit.location(loc);
        if state.destroyed {
            match next_in_chain(loc, rear) {
                Some((next, r)) => {
                    loc = next;
                    rear = r;
                    continue;
                }
                None => {
                    out.lost += remaining;
                    break;
                }
            }
        }

        let armor = if internal { 0 } else { remaining.min(state.armor_facing(rear)) };
        let structure = (remaining - armor).min(state.structure);
        let structure_left = state.structure - structure;

        if armor + structure > 0 {
            ctx.emit(EventKind::DamageApplied {
                unit: unit_id.to_string(),
                location: loc,
                rear,
                armor,
                structure,
                kind,
            })?;
        }
        out.armor += armor;
        out.structure += structure;
        remaining -= armor + structure;

        if structure > 0 {
            if structure_left == 0 {
                out.locations_destroyed.push(loc);
                destroy_location(ctx, unit_id, loc)?;
            } else if !out.exposed.contains(&loc) {
                out.exposed.push(loc);
            }
        }

        if remaining == 0 {
            break;
        }
        if internal && origin_case != CaseKind::None {
            out.vented += remaining;
            break;
        }
        match next_in_chain(loc, rear) {
            Some((next, r)) => {
                loc = next;
                rear = r;
            }
            None => {
                out.lost += remaining;
                break;
            }
        }
    }

    for loc in out.exposed.clone() {
        let unit = ctx.unit(unit_id)?;
        if unit.is_destroyed() {
            break;
        }
        if !unit.location_destroyed(loc) {
            critical::resolve_criticals(ctx, unit_id, loc, false)?;
        }
    }

    out.unit_destroyed = ctx.unit(unit_id)?.is_destroyed();
    log::debug!(
        "{unit_id}: {amount} {kind:?} damage to {location}: {} armor, {} structure, {} lost",
        out.armor,
        out.structure,
        out.lost
    );
    Ok(out)
}

/// Apply one rolled hit, including the through-armour critical check.
pub fn apply_hit(
    ctx: &mut BattleContext,
    unit_id: &str,
    hit: &HitLocation,
    amount: u32,
    kind: DamageKind,
) -> SimResult<DamageOutcome> {
    let out = apply_damage(ctx, unit_id, hit.location, hit.rear, amount, kind)?;
    if hit.through_armor_critical {
        let unit = ctx.unit(unit_id)?;
        if !unit.is_destroyed()
            && !unit.location_destroyed(hit.location)
            && !out.exposed.contains(&hit.location)
        {
            critical::resolve_criticals(ctx, unit_id, hit.location, true)?;
        }
    }
    Ok(out)
}

/// Remove a location and everything that depends on it.
pub fn destroy_location(ctx: &mut BattleContext, unit_id: &str, location: Location) -> SimResult<()> {
    if ctx.unit(unit_id)?.location_destroyed(location) {
        return Ok(());
    }
    ctx.emit(EventKind::LocationDestroyed {
        unit: unit_id.to_string(),
        location,
    })?;
    log::info!("{unit_id}: {location} destroyed");

    match location {
        Location::CenterTorso => destroy_unit(ctx, unit_id, DestructionCause::CenterTorsoDestroyed)?,
        Location::Head => destroy_unit(ctx, unit_id, DestructionCause::HeadDestroyed)?,
        Location::LeftTorso | Location::RightTorso => {
            if let Some(arm) = location.dependent_arm() {
                destroy_location(ctx, unit_id, arm)?;
            }
        }
        Location::LeftLeg | Location::RightLeg => {
            let unit = ctx.unit(unit_id)?;
            if unit.is_active() && !unit.prone {
                ctx.queue_psr(unit_id, PsrTrigger::new(PsrReason::LegDestroyed).automatic());
            }
        }
        Location::LeftArm | Location::RightArm => {}
    }

    let unit = ctx.unit(unit_id)?;
    if !unit.is_destroyed() && unit.damage.engine_hits >= 3 {
        destroy_unit(ctx, unit_id, DestructionCause::EngineDestroyed)?;
    }
    Ok(())
}

/// Mark a unit destroyed. Later causes never overwrite the first.
pub fn destroy_unit(ctx: &mut BattleContext, unit_id: &str, cause: DestructionCause) -> SimResult<()> {
    if ctx.unit(unit_id)?.is_destroyed() {
        return Ok(());
    }
    ctx.emit(EventKind::UnitDestroyed {
        unit: unit_id.to_string(),
        cause,
    })?;
    log::info!("{unit_id} destroyed: {cause:?}");
    Ok(())
}
