//! Pilot abilities and unit quirks.
//!
//! RULE: Resolvers never match on a trait identifier directly.
//! They ask the table for the hooks they understand and sum them, so a
//! new trait is one row in TRAIT_RULES and nothing else.

use crate::config::RangeBracket;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitId {
    // ── Pilot abilities ─────────────────────────────
    Sniper,
    JumpingJack,
    MultiTasker,
    ForestRanger,
    ClusterHitter,
    MeleeSpecialist,
    IronMan,
    HotDog,
    ManeuveringAce,

    // ── Unit quirks ─────────────────────────────────
    ImprovedTargetingShort,
    ImprovedTargetingMedium,
    ImprovedTargetingLong,
    PoorTargetingShort,
    PoorTargetingMedium,
    PoorTargetingLong,
    SensorGhosts,
    Stable,
    CrampedCockpit,
    EasyToPilot,
}

/// Which family of piloting skill rolls a PSR hook applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PsrCategory {
    Terrain,
    Physical,
    Damage,
    Any,
}

/// The resolver entry point a trait plugs into, with its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraitHook {
    /// Added to weapon to-hit when firing in the given bracket.
    RangeBracket { bracket: RangeBracket, delta: i32 },
    /// Range modifiers are halved, rounding down.
    HalveRangeModifier,
    /// Added to the attacker-jumped modifier.
    AttackerJumped(i32),
    /// Added to the secondary-target penalty.
    SecondaryTarget(i32),
    /// Added to attacks against this unit while it stands in woods.
    DefendInWoods(i32),
    /// Added to every weapon attack this unit makes.
    WeaponToHit(i32),
    ClusterRoll(i32),
    PhysicalToHit(i32),
    PhysicalDamage(i32),
    ConsciousnessRoll(i32),
    ShutdownAvoid(i32),
    Psr { category: PsrCategory, delta: i32 },
}

pub struct TraitRule {
    pub id:          TraitId,
    pub hook:        TraitHook,
    pub description: &'static str,
}

pub static TRAIT_RULES: &[TraitRule] = &[
    TraitRule {
        id:          TraitId::Sniper,
        hook:        TraitHook::HalveRangeModifier,
        description: "range modifiers halved",
    },
    TraitRule {
        id:          TraitId::JumpingJack,
        hook:        TraitHook::AttackerJumped(-2),
        description: "jumping costs +1 to-hit instead of +3",
    },
    TraitRule {
        id:          TraitId::MultiTasker,
        hook:        TraitHook::SecondaryTarget(-1),
        description: "secondary target penalty reduced by 1",
    },
    TraitRule {
        id:          TraitId::ForestRanger,
        hook:        TraitHook::DefendInWoods(1),
        description: "+1 to be hit while in woods",
    },
    TraitRule {
        id:          TraitId::ClusterHitter,
        hook:        TraitHook::ClusterRoll(1),
        description: "+1 on cluster rolls",
    },
    TraitRule {
        id:          TraitId::MeleeSpecialist,
        hook:        TraitHook::PhysicalToHit(-1),
        description: "-1 physical attack to-hit",
    },
    TraitRule {
        id:          TraitId::MeleeSpecialist,
        hook:        TraitHook::PhysicalDamage(1),
        description: "+1 physical attack damage",
    },
    TraitRule {
        id:          TraitId::IronMan,
        hook:        TraitHook::ConsciousnessRoll(-2),
        description: "-2 on consciousness rolls",
    },
    TraitRule {
        id:          TraitId::HotDog,
        hook:        TraitHook::ShutdownAvoid(-1),
        description: "-1 on shutdown avoidance rolls",
    },
    TraitRule {
        id:          TraitId::ManeuveringAce,
        hook:        TraitHook::Psr { category: PsrCategory::Terrain, delta: -1 },
        description: "-1 on terrain and skid PSRs",
    },
    TraitRule {
        id:          TraitId::ImprovedTargetingShort,
        hook:        TraitHook::RangeBracket { bracket: RangeBracket::Short, delta: -1 },
        description: "-1 to-hit at short range",
    },
    TraitRule {
        id:          TraitId::ImprovedTargetingMedium,
        hook:        TraitHook::RangeBracket { bracket: RangeBracket::Medium, delta: -1 },
        description: "-1 to-hit at medium range",
    },
    TraitRule {
        id:          TraitId::ImprovedTargetingLong,
        hook:        TraitHook::RangeBracket { bracket: RangeBracket::Long, delta: -1 },
        description: "-1 to-hit at long range",
    },
    TraitRule {
        id:          TraitId::PoorTargetingShort,
        hook:        TraitHook::RangeBracket { bracket: RangeBracket::Short, delta: 1 },
        description: "+1 to-hit at short range",
    },
    TraitRule {
        id:          TraitId::PoorTargetingMedium,
        hook:        TraitHook::RangeBracket { bracket: RangeBracket::Medium, delta: 1 },
        description: "+1 to-hit at medium range",
    },
    TraitRule {
        id:          TraitId::PoorTargetingLong,
        hook:        TraitHook::RangeBracket { bracket: RangeBracket::Long, delta: 1 },
        description: "+1 to-hit at long range",
    },
    TraitRule {
        id:          TraitId::SensorGhosts,
        hook:        TraitHook::WeaponToHit(1),
        description: "+1 to all weapon attacks",
    },
    TraitRule {
        id:          TraitId::Stable,
        hook:        TraitHook::Psr { category: PsrCategory::Physical, delta: -1 },
        description: "-1 on PSRs caused by physical attacks",
    },
    TraitRule {
        id:          TraitId::CrampedCockpit,
        hook:        TraitHook::Psr { category: PsrCategory::Any, delta: 1 },
        description: "+1 on every PSR",
    },
    TraitRule {
        id:          TraitId::EasyToPilot,
        hook:        TraitHook::Psr { category: PsrCategory::Terrain, delta: -1 },
        description: "-1 on terrain PSRs",
    },
];

/// Every hook carried by the given traits, in table order.
pub fn hooks_for(traits: &BTreeSet<TraitId>) -> impl Iterator<Item = &'static TraitRule> + '_ {
    TRAIT_RULES.iter().filter(move |rule| traits.contains(&rule.id))
}

/// Sum the values a resolver extracts from matching hooks.
pub fn sum_hooks(traits: &BTreeSet<TraitId>, pick: impl Fn(&TraitHook) -> Option<i32>) -> i32 {
    hooks_for(traits).filter_map(|rule| pick(&rule.hook)).sum()
}

/// Rules for one trait, in table order.
pub fn rules_for(id: TraitId) -> impl Iterator<Item = &'static TraitRule> {
    TRAIT_RULES.iter().filter(move |rule| rule.id == id)
}

/// Per-weapon quirks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponQuirk {
    Accurate,
    Inaccurate,
    ImprovedCooling,
    PoorCooling,
    JamProne,
}

impl WeaponQuirk {
    pub fn to_hit(&self) -> i32 {
        match self {
            Self::Accurate => -1,
            Self::Inaccurate => 1,
            _ => 0,
        }
    }

    pub fn heat(&self) -> i32 {
        match self {
            Self::ImprovedCooling => -1,
            Self::PoorCooling => 1,
            _ => 0,
        }
    }

    /// Raises the natural roll on which the weapon jams.
    pub fn jam_threshold(&self) -> u8 {
        match self {
            Self::JamProne => 1,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_trait_has_at_least_one_rule() {
        let all = [
            TraitId::Sniper,
            TraitId::JumpingJack,
            TraitId::MultiTasker,
            TraitId::ForestRanger,
            TraitId::ClusterHitter,
            TraitId::MeleeSpecialist,
            TraitId::IronMan,
            TraitId::HotDog,
            TraitId::ManeuveringAce,
            TraitId::ImprovedTargetingShort,
            TraitId::ImprovedTargetingMedium,
            TraitId::ImprovedTargetingLong,
            TraitId::PoorTargetingShort,
            TraitId::PoorTargetingMedium,
            TraitId::PoorTargetingLong,
            TraitId::SensorGhosts,
            TraitId::Stable,
            TraitId::CrampedCockpit,
            TraitId::EasyToPilot,
        ];
        for id in all {
            assert!(rules_for(id).next().is_some(), "{id:?} has no rule");
        }
    }

    #[test]
    fn melee_specialist_contributes_two_hooks() {
        let traits: BTreeSet<_> = [TraitId::MeleeSpecialist].into_iter().collect();
        let to_hit = sum_hooks(&traits, |h| match h {
            TraitHook::PhysicalToHit(d) => Some(*d),
            _ => None,
        });
        let damage = sum_hooks(&traits, |h| match h {
            TraitHook::PhysicalDamage(d) => Some(*d),
            _ => None,
        });
        assert_eq!((to_hit, damage), (-1, 1));
    }
}
