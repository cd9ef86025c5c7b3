//! To-hit calculator.
//!
//! Pure: reads units, terrain and rules, never rolls dice. The result
//! keeps every contributing term so an attack can be audited line by
//! line from its AttackResolved event.

use crate::{
    abilities::{sum_hooks, TraitHook},
    arc::{arc_of_target, FiringArc},
    config::{BattleConfig, RangeBracket, RulesConfig, WeaponSpec},
    declaration::{CalledShot, MovementMode, PhysicalKind},
    heat::heat_to_hit_modifier,
    state::BattleState,
    terrain::TerrainMap,
    types::UnitId,
    unit::{ActuatorKind, EquipmentKind, Location, UnitCombatState},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Totals above this cannot be rolled on 2d6.
pub const MAX_ROLLABLE: i32 = 12;

const ECM_RADIUS: u32 = 6;
const PROBE_RADIUS: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToHitTerm {
    pub source: String,
    pub value:  i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note:   Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToHitBreakdown {
    pub terms: Vec<ToHitTerm>,
    pub total: i32,
}

impl ToHitBreakdown {
    fn base(source: &str, value: i32) -> Self {
        Self {
            terms: vec![ToHitTerm { source: source.into(), value, note: None }],
            total: value,
        }
    }

    /// Record a modifier. Zero-valued modifiers are left out.
    fn add(&mut self, source: &str, value: i32) {
        if value == 0 {
            return;
        }
        self.terms.push(ToHitTerm { source: source.into(), value, note: None });
        self.total += value;
    }

    /// Record an effect that changes something other than the number.
    fn note(&mut self, source: &str, note: &str) {
        self.terms.push(ToHitTerm {
            source: source.into(),
            value:  0,
            note:   Some(note.into()),
        });
    }

    pub fn term(&self, source: &str) -> Option<i32> {
        self.terms.iter().find(|t| t.source == source).map(|t| t.value)
    }

    pub fn is_impossible(&self) -> bool {
        self.total > MAX_ROLLABLE
    }
}

/// What is being rolled for.
#[derive(Debug, Clone, Copy)]
pub enum AttackProfile<'a> {
    Weapon {
        index:       usize,
        spec:        &'a WeaponSpec,
        secondary:   bool,
        called_shot: Option<CalledShot>,
    },
    Physical {
        kind: PhysicalKind,
        limb: Option<Location>,
    },
}

/// Read-only view of the battlefield for to-hit purposes.
pub struct BattlefieldContext<'a> {
    pub terrain: &'a TerrainMap,
    pub rules:   &'a RulesConfig,
    pub units:   &'a BTreeMap<UnitId, UnitCombatState>,
}

impl<'a> BattlefieldContext<'a> {
    pub fn new(state: &'a BattleState, config: &'a BattleConfig) -> Self {
        Self {
            terrain: &config.terrain,
            rules:   &config.rules,
            units:   &state.units,
        }
    }
}

/// Electronic warfare situation for one attacker-target pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EwState {
    /// An enemy ECM field covers the attack.
    pub jammed:   bool,
    /// The attacker's active probe cancels every ECM covering the attack.
    pub restored: bool,
}

impl EwState {
    pub fn artemis_nullified(&self) -> bool {
        self.jammed && !self.restored
    }
}

pub fn ew_state(
    attacker: &UnitCombatState,
    target: &UnitCombatState,
    units: &BTreeMap<UnitId, UnitCombatState>,
) -> EwState {
    let ecms: Vec<&UnitCombatState> = units
        .values()
        .filter(|u| {
            u.side != attacker.side
                && u.is_active()
                && !u.shutdown
                && u.equipment_working(EquipmentKind::EcmSuite)
                && (u.position.distance(attacker.position) <= ECM_RADIUS
                    || u.position.distance(target.position) <= ECM_RADIUS)
        })
        .collect();
    if ecms.is_empty() {
        return EwState::default();
    }
    let probe = attacker.equipment_working(EquipmentKind::ActiveProbe);
    let restored = probe
        && ecms
            .iter()
            .all(|ecm| ecm.position.distance(attacker.position) <= PROBE_RADIUS);
    EwState { jammed: true, restored }
}

/// Target movement modifier for hexes moved this turn.
pub fn target_movement_modifier(hexes: u32) -> i32 {
    match hexes {
        0..=2 => 0,
        3..=4 => 1,
        5..=6 => 2,
        7..=9 => 3,
        10..=17 => 4,
        18..=24 => 5,
        _ => 6,
    }
}

pub fn range_modifier(bracket: RangeBracket) -> i32 {
    match bracket {
        RangeBracket::Short => 0,
        RangeBracket::Medium => 2,
        RangeBracket::Long => 4,
    }
}

pub fn compute_to_hit(
    attacker: &UnitCombatState,
    target: &UnitCombatState,
    profile: &AttackProfile<'_>,
    ctx: &BattlefieldContext<'_>,
) -> ToHitBreakdown {
    match profile {
        AttackProfile::Weapon { index, spec, secondary, called_shot } => {
            weapon_to_hit(attacker, target, *index, spec, *secondary, *called_shot, ctx)
        }
        AttackProfile::Physical { kind, limb } => physical_to_hit(attacker, target, *kind, *limb, ctx),
    }
}

fn weapon_to_hit(
    attacker: &UnitCombatState,
    target: &UnitCombatState,
    index: usize,
    spec: &WeaponSpec,
    secondary: bool,
    called_shot: Option<CalledShot>,
    ctx: &BattlefieldContext<'_>,
) -> ToHitBreakdown {
    let rules = ctx.rules;
    let attacker_traits = attacker.traits();
    let distance = attacker.position.distance(target.position);
    let mut b = ToHitBreakdown::base("gunnery", attacker.pilot.gunnery as i32);

    match spec.bracket(distance) {
        Some(bracket) => {
            if rules.range_modifiers {
                let mut modifier = range_modifier(bracket);
                if rules.trait_modifiers
                    && sum_hooks(&attacker_traits, |h| matches!(h, TraitHook::HalveRangeModifier).then_some(1)) > 0
                {
                    modifier /= 2;
                }
                b.add("range", modifier);
            }
            if rules.trait_modifiers {
                b.add(
                    "targeting_quirk",
                    sum_hooks(&attacker_traits, |h| match h {
                        TraitHook::RangeBracket { bracket: hb, delta } if *hb == bracket => Some(*delta),
                        _ => None,
                    }),
                );
            }
        }
        None => b.add("out_of_range", MAX_ROLLABLE + 1),
    }
    if rules.min_range && spec.min_range > 0 && distance <= spec.min_range {
        b.add("minimum_range", (spec.min_range - distance + 1) as i32);
    }

    movement_terms(&mut b, attacker, target, ctx);

    if rules.heat_modifiers {
        b.add("heat", heat_to_hit_modifier(attacker.heat));
    }

    if rules.terrain_modifiers {
        terrain_terms(&mut b, attacker, target, true, ctx);
    }
    if rules.partial_cover && ctx.terrain.partial_cover(attacker.position, target.position) {
        b.add("partial_cover", 1);
    }

    if rules.secondary_target && secondary {
        let arc = arc_of_target(attacker.position, attacker.facing, attacker.twist, target.position);
        let mut penalty = if arc == FiringArc::Front { 1 } else { 2 };
        if rules.trait_modifiers {
            penalty += sum_hooks(&attacker_traits, |h| match h {
                TraitHook::SecondaryTarget(d) => Some(*d),
                _ => None,
            });
        }
        b.add("secondary_target", penalty.max(0));
    }

    if rules.trait_modifiers {
        b.add(
            "pilot_and_unit_traits",
            sum_hooks(&attacker_traits, |h| match h {
                TraitHook::WeaponToHit(d) => Some(*d),
                _ => None,
            }),
        );
        if let Some(mount) = attacker.weapons.get(index) {
            b.add("weapon_quirks", mount.quirks.iter().map(|q| q.to_hit()).sum());
        }
    }

    if rules.equipment_modifiers {
        if !spec.is_cluster() && attacker.equipment_working(EquipmentKind::TargetingComputer) {
            b.add("targeting_computer", -1);
        }
        let artemis = attacker.weapons.get(index).is_some_and(|m| m.artemis) && spec.is_cluster();
        if artemis {
            let ew = ew_state(attacker, target, ctx.units);
            if ew.artemis_nullified() {
                b.note("ecm", "Artemis IV bonus nullified by enemy ECM");
            } else if ew.jammed && ew.restored {
                b.note("active_probe", "enemy ECM countered; Artemis IV bonus restored");
            }
        }
    }

    if rules.damage_modifiers {
        b.add("sensor_damage", attacker.damage.sensor_hits.min(2) as i32);
        if let Some(mount) = attacker.weapons.get(index) {
            if mount.location.is_arm() {
                let loc = mount.location;
                if attacker.actuator_destroyed(loc, ActuatorKind::Shoulder) {
                    b.add("shoulder_actuator", 4);
                } else {
                    let mut arm = 0;
                    if attacker.actuator_destroyed(loc, ActuatorKind::UpperArm) {
                        arm += 1;
                    }
                    if attacker.actuator_destroyed(loc, ActuatorKind::LowerArm) {
                        arm += 1;
                    }
                    b.add("arm_actuators", arm);
                }
            }
        }
    }

    if rules.called_shots && called_shot.is_some() {
        b.add("called_shot", 3);
    }
    b
}

fn physical_to_hit(
    attacker: &UnitCombatState,
    target: &UnitCombatState,
    kind: PhysicalKind,
    limb: Option<Location>,
    ctx: &BattlefieldContext<'_>,
) -> ToHitBreakdown {
    let rules = ctx.rules;
    let mut b = ToHitBreakdown::base("piloting", attacker.pilot.piloting as i32);

    let kind_modifier = match kind {
        PhysicalKind::Punch => 0,
        PhysicalKind::Kick => -2,
        PhysicalKind::Push => -1,
        PhysicalKind::Hatchet => -1,
        PhysicalKind::Sword => -2,
        PhysicalKind::Mace => 1,
        PhysicalKind::Charge | PhysicalKind::DeathFromAbove => {
            attacker.pilot.piloting as i32 - target.pilot.piloting as i32
        }
    };
    b.add("attack_type", kind_modifier);

    if rules.damage_modifiers {
        if let Some(limb) = limb {
            let destroyed = |k| attacker.actuator_destroyed(limb, k);
            let penalty = match kind {
                PhysicalKind::Punch => {
                    let mut p = 0;
                    if destroyed(ActuatorKind::Hand) || !attacker.has_actuator(limb, ActuatorKind::Hand) {
                        p += 1;
                    }
                    if destroyed(ActuatorKind::UpperArm) {
                        p += 2;
                    }
                    if destroyed(ActuatorKind::LowerArm) {
                        p += 2;
                    }
                    p
                }
                PhysicalKind::Kick => {
                    let mut p = 0;
                    if destroyed(ActuatorKind::UpperLeg) {
                        p += 2;
                    }
                    if destroyed(ActuatorKind::LowerLeg) {
                        p += 2;
                    }
                    if destroyed(ActuatorKind::Foot) {
                        p += 1;
                    }
                    p
                }
                PhysicalKind::Hatchet | PhysicalKind::Sword | PhysicalKind::Mace => {
                    let mut p = 0;
                    if destroyed(ActuatorKind::UpperArm) {
                        p += 2;
                    }
                    if destroyed(ActuatorKind::LowerArm) {
                        p += 2;
                    }
                    p
                }
                _ => 0,
            };
            b.add("actuator_damage", penalty);
        }
    }

    movement_terms(&mut b, attacker, target, ctx);

    if rules.terrain_modifiers {
        terrain_terms(&mut b, attacker, target, false, ctx);
    }

    if rules.trait_modifiers {
        b.add(
            "pilot_and_unit_traits",
            sum_hooks(&attacker.traits(), |h| match h {
                TraitHook::PhysicalToHit(d) => Some(*d),
                _ => None,
            }),
        );
    }
    b
}

/// Attacker movement, target movement, immobility and prone terms.
fn movement_terms(
    b: &mut ToHitBreakdown,
    attacker: &UnitCombatState,
    target: &UnitCombatState,
    ctx: &BattlefieldContext<'_>,
) {
    let rules = ctx.rules;
    if rules.attacker_movement {
        let mode = attacker.activity.movement.as_ref().map(|m| m.mode);
        let modifier = match mode {
            Some(MovementMode::Walk | MovementMode::Crawl | MovementMode::StandUp) => 1,
            Some(MovementMode::Run) => 2,
            Some(MovementMode::Jump) => {
                let jj = if rules.trait_modifiers {
                    sum_hooks(&attacker.traits(), |h| match h {
                        TraitHook::AttackerJumped(d) => Some(*d),
                        _ => None,
                    })
                } else {
                    0
                };
                (3 + jj).max(0)
            }
            _ => 0,
        };
        b.add("attacker_movement", modifier);
    }
    if rules.prone_modifiers && attacker.prone {
        b.add("attacker_prone", 2);
    }

    let immobile = target.is_immobile();
    if rules.immobile_modifier && immobile {
        b.add("target_immobile", -4);
    } else if rules.target_movement && !immobile {
        let record = target.activity.movement.as_ref();
        let hexes = record.map_or(0, |m| m.hexes);
        b.add("target_movement", target_movement_modifier(hexes));
        if record.is_some_and(|m| m.mode == MovementMode::Jump) {
            b.add("target_jumped", 1);
        }
    }

    if rules.prone_modifiers && target.prone {
        let adjacent = attacker.position.distance(target.position) <= 1;
        b.add("target_prone", if adjacent { -2 } else { 1 });
    }
}

fn terrain_terms(
    b: &mut ToHitBreakdown,
    attacker: &UnitCombatState,
    target: &UnitCombatState,
    ranged: bool,
    ctx: &BattlefieldContext<'_>,
) {
    if ranged {
        b.add(
            "intervening_woods",
            ctx.terrain.intervening_woods(attacker.position, target.position) as i32,
        );
        let water = ctx.terrain.intervening_water(attacker.position, target.position);
        b.add("intervening_water", (water * ctx.rules.intervening_water) as i32);
    }
    let target_hex = ctx.terrain.at(target.position);
    let woods = target_hex.kind.woods() as i32;
    b.add("target_in_woods", woods);
    if woods > 0 && ctx.rules.trait_modifiers {
        b.add(
            "target_traits",
            sum_hooks(&target.traits(), |h| match h {
                TraitHook::DefendInWoods(d) => Some(*d),
                _ => None,
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_table_boundaries() {
        let expected = [(0, 0), (2, 0), (3, 1), (4, 1), (5, 2), (6, 2), (7, 3), (9, 3), (10, 4), (17, 4), (18, 5), (24, 5), (25, 6)];
        for (hexes, modifier) in expected {
            assert_eq!(target_movement_modifier(hexes), modifier, "{hexes} hexes");
        }
    }

    #[test]
    fn zero_terms_are_omitted() {
        let mut b = ToHitBreakdown::base("gunnery", 4);
        b.add("range", 0);
        b.add("heat", 1);
        assert_eq!(b.terms.len(), 2);
        assert_eq!(b.total, 5);
    }

    #[test]
    fn intervening_water_and_woods_add_up() {
        use crate::{
            config::WeaponCatalog,
            hex::{Facing, HexCoord},
            terrain::TerrainKind,
            unit::UnitSpec,
        };

        let catalog = WeaponCatalog::builtin();
        let attacker = UnitSpec::biped("a", 0, 50, 5)
            .at(HexCoord::new(0, 0), Facing::NORTH)
            .with_weapon("medium_laser", Location::RightArm)
            .build(&catalog)
            .expect("attacker");
        let target = UnitSpec::biped("b", 1, 50, 5)
            .at(HexCoord::new(0, -6), Facing::SOUTH)
            .build(&catalog)
            .expect("target");

        let terrain = TerrainMap::open_field()
            .with(HexCoord::new(0, -2), TerrainKind::Water { depth: 2 })
            .with(HexCoord::new(0, -3), TerrainKind::Water { depth: 1 })
            .with(HexCoord::new(0, -4), TerrainKind::LightWoods);
        let rules = RulesConfig::default();
        let units = BTreeMap::new();
        let ctx = BattlefieldContext { terrain: &terrain, rules: &rules, units: &units };

        let laser = catalog.weapon("medium_laser").expect("medium laser");
        let shot = AttackProfile::Weapon { index: 0, spec: laser, secondary: false, called_shot: None };
        let b = compute_to_hit(&attacker, &target, &shot, &ctx);
        assert_eq!(b.term("intervening_water"), Some(2));
        assert_eq!(b.term("intervening_woods"), Some(1));

        let dry = RulesConfig { intervening_water: 0, ..RulesConfig::default() };
        let ctx = BattlefieldContext { terrain: &terrain, rules: &dry, units: &units };
        assert_eq!(compute_to_hit(&attacker, &target, &shot, &ctx).term("intervening_water"), None);
    }

    // Prone targets are easier to hit up close and harder at range.
    #[test]
    fn prone_target_sign_depends_on_adjacency() {
        use crate::{
            config::WeaponCatalog,
            hex::{Facing, HexCoord},
            unit::UnitSpec,
        };

        let catalog = WeaponCatalog::builtin();
        let attacker = UnitSpec::biped("a", 0, 50, 5)
            .at(HexCoord::new(0, 0), Facing::NORTH)
            .with_weapon("medium_laser", Location::RightArm)
            .build(&catalog)
            .expect("attacker");
        let mut near = UnitSpec::biped("b", 1, 50, 5)
            .at(HexCoord::new(0, -1), Facing::SOUTH)
            .build(&catalog)
            .expect("near target");
        near.prone = true;
        let mut far = near.clone();
        far.position = HexCoord::new(0, -6);

        let terrain = TerrainMap::open_field();
        let rules = RulesConfig::default();
        let units = BTreeMap::new();
        let ctx = BattlefieldContext { terrain: &terrain, rules: &rules, units: &units };

        let punch = AttackProfile::Physical { kind: PhysicalKind::Punch, limb: Some(Location::RightArm) };
        assert_eq!(compute_to_hit(&attacker, &near, &punch, &ctx).term("target_prone"), Some(-2));

        let laser = catalog.weapon("medium_laser").expect("medium laser");
        let shot = AttackProfile::Weapon { index: 0, spec: laser, secondary: false, called_shot: None };
        assert_eq!(compute_to_hit(&attacker, &far, &shot, &ctx).term("target_prone"), Some(1));
    }
}
