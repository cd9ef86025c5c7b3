//! Firing arc calculator.
//!
//! Pure functions. The six hexside sectors around a unit, counted
//! clockwise from its facing, map to arcs as 0 Front, 1–2 Right,
//! 3 Rear, 4–5 Left. A torso twist moves the front sector one hexside
//! in the twist direction: the side it turns toward shrinks, the side it
//! turns away from grows, and the rear sector stays with the legs.

use crate::hex::{nearest_directions, Facing, HexCoord, Twist};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FiringArc {
    Front,
    Left,
    Right,
    Rear,
}

impl FiringArc {
    /// Tie-break order at sector boundaries: Front wins, then the sides.
    fn precedence(&self) -> u8 {
        match self {
            Self::Front => 0,
            Self::Left | Self::Right => 1,
            Self::Rear => 2,
        }
    }
}

/// Arc of `target`'s body that an attack from `attacker_pos` strikes.
///
/// When attacker and target share a hex the attack counts as frontal.
pub fn compute_arc(
    attacker_pos: HexCoord,
    target_pos: HexCoord,
    target_facing: Facing,
    target_twist: Twist,
) -> FiringArc {
    nearest_directions(target_pos, attacker_pos)
        .into_iter()
        .map(|dir| sector_arc(relative_sector(target_facing, dir), target_twist))
        .min_by_key(|arc| arc.precedence())
        .unwrap_or(FiringArc::Front)
}

/// Arc, relative to the attacker's own torso, in which `target_pos` lies.
/// Used for weapon-mount legality and the secondary-target penalty.
pub fn arc_of_target(
    attacker_pos: HexCoord,
    attacker_facing: Facing,
    attacker_twist: Twist,
    target_pos: HexCoord,
) -> FiringArc {
    compute_arc(target_pos, attacker_pos, attacker_facing, attacker_twist)
}

fn relative_sector(facing: Facing, direction: Facing) -> u8 {
    ((direction.value() as i32 - facing.value() as i32).rem_euclid(6)) as u8
}

fn sector_arc(sector: u8, twist: Twist) -> FiringArc {
    let front = twist.steps().rem_euclid(6) as u8;
    if sector == front {
        return FiringArc::Front;
    }
    if sector == 3 {
        return FiringArc::Rear;
    }
    // Walk clockwise from the front sector: anything reached before the
    // rear sector is on the right.
    let mut s = (front + 1) % 6;
    while s != 3 {
        if s == sector {
            return FiringArc::Right;
        }
        s = (s + 1) % 6;
    }
    FiringArc::Left
}
