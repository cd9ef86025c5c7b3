//! Falling over.

use crate::{
    arc::FiringArc,
    cluster::damage_groups,
    context::BattleContext,
    damage,
    error::SimResult,
    event::{DamageKind, EventKind},
    hit_location::{resolve_hit_location, HitTable},
    hex::Facing,
    pilot,
};

/// New facing for each d6 face, as a clockwise rotation.
const FACING_OFFSETS: [i32; 6] = [0, 1, 2, 3, -2, -1];

/// Damage taken from a fall: a tenth of tonnage, rounded, per level
/// fallen plus one.
pub fn fall_damage(tonnage: u32, height: u32) -> u32 {
    (tonnage + 5) / 10 * (height + 1)
}

/// Side of the unit that hits the ground for a d6 face.
pub fn fall_side(face: u8) -> FiringArc {
    match face {
        1 => FiringArc::Front,
        2 | 3 => FiringArc::Right,
        4 => FiringArc::Rear,
        _ => FiringArc::Left,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallOutcome {
    pub facing: Facing,
    pub side:   FiringArc,
    pub damage: u32,
}

/// Knock a unit prone: new facing, damage in groups of five, and a
/// point of pilot damage.
pub fn resolve_fall(ctx: &mut BattleContext, unit_id: &str, height: u32) -> SimResult<FallOutcome> {
    let face = ctx.d6().clamp(1, 6);
    let unit = ctx.unit(unit_id)?;
    let facing = unit.facing.rotate(FACING_OFFSETS[(face - 1) as usize]);
    let side = fall_side(face);
    let total = fall_damage(unit.tonnage, height);

    ctx.emit(EventKind::UnitFell {
        unit: unit_id.to_string(),
        facing,
        height,
        damage: total,
    })?;
    log::info!("{unit_id} falls {height} levels, lands on its {side:?} side for {total}");

    for group in damage_groups(total, 1, 5) {
        if ctx.unit(unit_id)?.is_destroyed() {
            break;
        }
        let hit = resolve_hit_location(side, HitTable::Standard, &mut *ctx.dice);
        damage::apply_hit(ctx, unit_id, &hit, group, DamageKind::Fall)?;
    }
    pilot::damage_pilot(ctx, unit_id, 1, "fall")?;

    Ok(FallOutcome { facing, side, damage: total })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seventy_tons_from_standing() {
        assert_eq!(fall_damage(70, 0), 7);
        assert_eq!(fall_damage(65, 0), 7);
        assert_eq!(fall_damage(70, 2), 21);
    }

    #[test]
    fn side_hit_by_face() {
        assert_eq!(fall_side(1), FiringArc::Front);
        assert_eq!(fall_side(3), FiringArc::Right);
        assert_eq!(fall_side(4), FiringArc::Rear);
        assert_eq!(fall_side(6), FiringArc::Left);
    }
}
