//! Hit location tables.

use crate::{arc::FiringArc, rng::DiceSource, unit::Location};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitTable {
    /// 2d6, used by weapons and falls.
    Standard,
    /// 1d6, punches, clubs and high called shots.
    Punch,
    /// 1d6, kicks and low called shots.
    Kick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitLocation {
    pub location: Location,
    /// Strikes rear torso armour.
    pub rear: bool,
    /// The roll forces a critical check regardless of remaining armour.
    pub through_armor_critical: bool,
    pub roll: u8,
}

use crate::unit::Location::*;

const FRONT: [Location; 11] = [
    CenterTorso, RightArm, RightArm, RightLeg, RightTorso, CenterTorso,
    LeftTorso, LeftLeg, LeftArm, LeftArm, Head,
];
const REAR: [Location; 11] = [
    CenterTorso, RightArm, RightArm, RightLeg, RightTorso, CenterTorso,
    LeftTorso, LeftLeg, LeftArm, LeftArm, Head,
];
const LEFT: [Location; 11] = [
    LeftTorso, LeftLeg, LeftArm, LeftArm, LeftLeg, LeftTorso,
    CenterTorso, RightTorso, RightArm, RightLeg, Head,
];
const RIGHT: [Location; 11] = [
    RightTorso, RightLeg, RightArm, RightArm, RightLeg, RightTorso,
    CenterTorso, LeftTorso, LeftArm, LeftLeg, Head,
];

const PUNCH_FRONT: [Location; 6] = [LeftArm, LeftTorso, CenterTorso, RightTorso, RightArm, Head];
const PUNCH_LEFT: [Location; 6] = [LeftTorso, LeftTorso, CenterTorso, LeftArm, LeftArm, Head];
const PUNCH_RIGHT: [Location; 6] = [RightTorso, RightTorso, CenterTorso, RightArm, RightArm, Head];

/// Look up a 2d6 roll on the standard table.
pub fn standard_location(arc: FiringArc, roll: u8) -> HitLocation {
    let roll = roll.clamp(2, 12);
    let column = match arc {
        FiringArc::Front => &FRONT,
        FiringArc::Rear => &REAR,
        FiringArc::Left => &LEFT,
        FiringArc::Right => &RIGHT,
    };
    let location = column[(roll - 2) as usize];
    HitLocation {
        location,
        rear: arc == FiringArc::Rear && location.has_rear(),
        through_armor_critical: roll == 2,
        roll,
    }
}

/// Look up a 1d6 roll on the punch table.
pub fn punch_location(arc: FiringArc, roll: u8) -> HitLocation {
    let roll = roll.clamp(1, 6);
    let column = match arc {
        FiringArc::Front | FiringArc::Rear => &PUNCH_FRONT,
        FiringArc::Left => &PUNCH_LEFT,
        FiringArc::Right => &PUNCH_RIGHT,
    };
    let location = column[(roll - 1) as usize];
    HitLocation {
        location,
        rear: arc == FiringArc::Rear && location.has_rear(),
        through_armor_critical: false,
        roll,
    }
}

/// Look up a 1d6 roll on the kick table.
pub fn kick_location(arc: FiringArc, roll: u8) -> HitLocation {
    let roll = roll.clamp(1, 6);
    let location = match arc {
        FiringArc::Left => LeftLeg,
        FiringArc::Right => RightLeg,
        FiringArc::Front | FiringArc::Rear => {
            if roll <= 3 {
                RightLeg
            } else {
                LeftLeg
            }
        }
    };
    HitLocation {
        location,
        rear: false,
        through_armor_critical: false,
        roll,
    }
}

/// Roll a hit location on the given table.
pub fn resolve_hit_location(arc: FiringArc, table: HitTable, dice: &mut dyn DiceSource) -> HitLocation {
    let hit = match table {
        HitTable::Standard => standard_location(arc, dice.roll_2d6()),
        HitTable::Punch => punch_location(arc, dice.d6()),
        HitTable::Kick => kick_location(arc, dice.d6()),
    };
    log::debug!("hit location {:?} ({:?} table, roll {})", hit.location, table, hit.roll);
    hit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seven_hits_center_torso_from_the_front() {
        assert_eq!(standard_location(FiringArc::Front, 7).location, CenterTorso);
    }

    #[test]
    fn rear_torso_hits_strike_rear_armour() {
        let hit = standard_location(FiringArc::Rear, 7);
        assert!(hit.rear);
        let arm = standard_location(FiringArc::Rear, 3);
        assert_eq!(arm.location, RightArm);
        assert!(!arm.rear);
    }

    #[test]
    fn rear_column_torsos_all_strike_the_back() {
        for roll in 2..=12 {
            let hit = standard_location(FiringArc::Rear, roll);
            assert_eq!(hit.rear, hit.location.is_torso(), "roll {roll}");
        }
        assert_eq!(standard_location(FiringArc::Rear, 6).location, RightTorso);
        assert_eq!(standard_location(FiringArc::Rear, 8).location, LeftTorso);
    }

    #[test]
    fn two_is_through_armour_on_the_arc_torso() {
        let expected = [
            (FiringArc::Front, CenterTorso),
            (FiringArc::Left, LeftTorso),
            (FiringArc::Right, RightTorso),
            (FiringArc::Rear, CenterTorso),
        ];
        for (arc, location) in expected {
            let hit = standard_location(arc, 2);
            assert!(hit.through_armor_critical);
            assert_eq!(hit.location, location);
        }
    }

    #[test]
    fn side_kicks_always_hit_the_near_leg() {
        for roll in 1..=6 {
            assert_eq!(kick_location(FiringArc::Left, roll).location, LeftLeg);
            assert_eq!(kick_location(FiringArc::Right, roll).location, RightLeg);
        }
    }
}
