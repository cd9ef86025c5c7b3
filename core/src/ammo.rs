//! Ammunition feed and ammunition explosions.

use crate::{
    context::BattleContext,
    damage::{self, DamageOutcome},
    error::{IllegalAction, SimError, SimResult},
    event::{DamageKind, EventKind},
    pilot,
    unit::{CaseKind, UnitCombatState},
};
use crate::config::WeaponCatalog;

/// Rounds a weapon needs to fire at a given rate.
pub fn rounds_needed(rate: u8) -> u32 {
    u32::from(rate.max(1))
}

/// Can this weapon fire `rate` shots, given rounds already promised to
/// other declarations this turn? Energy weapons always can.
pub fn check_available(
    unit: &UnitCombatState,
    catalog: &WeaponCatalog,
    weapon: usize,
    rate: u8,
    reserved: u32,
) -> Result<(), IllegalAction> {
    let mount = unit.weapons.get(weapon).ok_or(IllegalAction::UnknownWeapon { weapon })?;
    let spec = catalog
        .weapon(&mount.weapon_id)
        .ok_or(IllegalAction::UnknownWeapon { weapon })?;
    let Some(ammo_type) = &spec.ammo_type else {
        return Ok(());
    };
    if unit.rounds_available(ammo_type) < reserved + rounds_needed(rate) {
        return Err(IllegalAction::NoAmmo { weapon });
    }
    Ok(())
}

/// Draw rounds for a shot, emptying bins in mount order.
/// Fails with NoAmmo before anything is emitted or rolled.
pub fn consume(ctx: &mut BattleContext, unit_id: &str, weapon: usize, rate: u8) -> SimResult<u32> {
    let unit = ctx.unit(unit_id)?;
    check_available(unit, &ctx.config.catalog, weapon, rate, 0)
        .map_err(|reason| SimError::illegal(unit_id, reason))?;

    let mount = &unit.weapons[weapon];
    let Some(ammo_type) = ctx
        .config
        .catalog
        .weapon(&mount.weapon_id)
        .and_then(|spec| spec.ammo_type.clone())
    else {
        return Ok(0);
    };

    let mut draws = Vec::new();
    let mut needed = rounds_needed(rate);
    for (index, bin) in unit.ammo.iter().enumerate() {
        if needed == 0 {
            break;
        }
        if bin.destroyed || bin.ammo_type != ammo_type || bin.rounds == 0 {
            continue;
        }
        let take = needed.min(bin.rounds);
        draws.push((index, take));
        needed -= take;
    }

    let mut total = 0;
    for (bin, rounds) in draws {
        ctx.emit(EventKind::AmmoConsumed {
            unit: unit_id.to_string(),
            bin,
            rounds,
        })?;
        total += rounds;
    }
    Ok(total)
}

/// The bin a heat-induced explosion takes: most damage, lowest index on ties.
pub fn most_dangerous_bin(unit: &UnitCombatState) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (index, bin) in unit.ammo.iter().enumerate() {
        if bin.destroyed {
            continue;
        }
        let damage = bin.explosion_damage();
        if damage == 0 {
            continue;
        }
        if best.map_or(true, |(_, d)| damage > d) {
            best = Some((index, damage));
        }
    }
    best.map(|(index, _)| index)
}

/// Detonate a bin: remaining rounds times damage per round, applied
/// to the bin's location from the inside.
pub fn explode_bin(ctx: &mut BattleContext, unit_id: &str, bin: usize) -> SimResult<DamageOutcome> {
    let unit = ctx.unit(unit_id)?;
    let Some(b) = unit.ammo.get(bin) else {
        return Err(SimError::invariant(
            ctx.state.next_seq(),
            format!("{unit_id} has no ammo bin {bin}"),
        ));
    };
    let damage = b.explosion_damage();
    let location = b.location;
    let case = unit.location(location).case;
    if damage == 0 {
        return Ok(DamageOutcome::default());
    }

    ctx.emit(EventKind::AmmoExploded {
        unit: unit_id.to_string(),
        bin,
        location,
        damage,
    })?;
    log::warn!("{unit_id}: ammunition explosion in {location} for {damage}");

    let out = damage::apply_damage(ctx, unit_id, location, false, damage, DamageKind::AmmoExplosion)?;
    if case == CaseKind::None {
        let amount = ctx.config.rules.explosion_pilot_damage;
        pilot::damage_pilot(ctx, unit_id, amount, "ammo_explosion")?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{Location, UnitSpec};

    fn ac10_carrier(rounds: u32) -> UnitCombatState {
        UnitSpec::biped("ac", 0, 50, 4)
            .with_weapon("ac10", Location::RightTorso)
            .with_partial_ammo("ac10_ammo", Location::RightTorso, rounds)
            .build(&WeaponCatalog::builtin())
            .unwrap()
    }

    #[test]
    fn empty_bins_refuse_to_fire() {
        let unit = ac10_carrier(0);
        assert_eq!(
            check_available(&unit, &WeaponCatalog::builtin(), 0, 1, 0),
            Err(IllegalAction::NoAmmo { weapon: 0 })
        );
    }

    #[test]
    fn reserved_rounds_count_against_the_feed() {
        let unit = ac10_carrier(2);
        let catalog = WeaponCatalog::builtin();
        assert!(check_available(&unit, &catalog, 0, 1, 1).is_ok());
        assert!(check_available(&unit, &catalog, 0, 1, 2).is_err());
    }

    #[test]
    fn explosion_picks_the_biggest_bin() {
        let unit = UnitSpec::biped("lrm", 0, 60, 4)
            .with_weapon("lrm10", Location::LeftTorso)
            .with_weapon("machine_gun", Location::RightArm)
            .with_partial_ammo("machine_gun_ammo", Location::RightTorso, 10)
            .with_partial_ammo("lrm10_ammo", Location::LeftTorso, 12)
            .build(&WeaponCatalog::builtin())
            .unwrap();
        assert_eq!(most_dangerous_bin(&unit), Some(1));
    }
}
