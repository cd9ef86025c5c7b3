//! Per-unit combat state and the loadout data it is built from.
//!
//! RULE: UnitCombatState is a cache derived from the event log.
//! Only `BattleState::apply` mutates it during a battle.

use crate::{
    abilities::{TraitId, WeaponQuirk},
    config::WeaponCatalog,
    declaration::MovementMode,
    error::{IllegalAction, SimError, SimResult},
    hex::{Facing, HexCoord, Twist},
    types::{Side, UnitId},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ── Locations ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Head,
    CenterTorso,
    LeftTorso,
    RightTorso,
    LeftArm,
    RightArm,
    LeftLeg,
    RightLeg,
}

impl Location {
    pub const ALL: [Location; 8] = [
        Location::Head,
        Location::CenterTorso,
        Location::LeftTorso,
        Location::RightTorso,
        Location::LeftArm,
        Location::RightArm,
        Location::LeftLeg,
        Location::RightLeg,
    ];

    /// Where excess damage goes once this location is gone.
    /// Head and centre torso have nowhere to go.
    pub fn transfer(&self) -> Option<Location> {
        match self {
            Self::LeftArm | Self::LeftLeg => Some(Self::LeftTorso),
            Self::RightArm | Self::RightLeg => Some(Self::RightTorso),
            Self::LeftTorso | Self::RightTorso => Some(Self::CenterTorso),
            Self::Head | Self::CenterTorso => None,
        }
    }

    /// The arm lost along with a side torso.
    pub fn dependent_arm(&self) -> Option<Location> {
        match self {
            Self::LeftTorso => Some(Self::LeftArm),
            Self::RightTorso => Some(Self::RightArm),
            _ => None,
        }
    }

    pub fn has_rear(&self) -> bool {
        self.is_torso()
    }

    pub fn is_torso(&self) -> bool {
        matches!(self, Self::CenterTorso | Self::LeftTorso | Self::RightTorso)
    }

    pub fn is_arm(&self) -> bool {
        matches!(self, Self::LeftArm | Self::RightArm)
    }

    pub fn is_leg(&self) -> bool {
        matches!(self, Self::LeftLeg | Self::RightLeg)
    }

    /// Limbs and the head are blown off outright on a critical roll of 12.
    pub fn is_limb_or_head(&self) -> bool {
        self.is_arm() || self.is_leg() || *self == Self::Head
    }

    pub fn slot_count(&self) -> usize {
        match self {
            Self::Head | Self::LeftLeg | Self::RightLeg => 6,
            _ => 12,
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Head => "HD",
            Self::CenterTorso => "CT",
            Self::LeftTorso => "LT",
            Self::RightTorso => "RT",
            Self::LeftArm => "LA",
            Self::RightArm => "RA",
            Self::LeftLeg => "LL",
            Self::RightLeg => "RL",
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Internal structure by tonnage: (head, centre torso, side torso, arm, leg).
const STRUCTURE_TABLE: [(u32, [u32; 5]); 17] = [
    (20, [3, 6, 5, 3, 4]),
    (25, [3, 8, 6, 4, 6]),
    (30, [3, 10, 7, 5, 7]),
    (35, [3, 11, 8, 6, 8]),
    (40, [3, 12, 10, 6, 10]),
    (45, [3, 14, 11, 7, 11]),
    (50, [3, 16, 12, 8, 12]),
    (55, [3, 18, 13, 9, 13]),
    (60, [3, 20, 14, 10, 14]),
    (65, [3, 21, 15, 10, 15]),
    (70, [3, 22, 15, 11, 15]),
    (75, [3, 23, 16, 12, 16]),
    (80, [3, 25, 17, 13, 17]),
    (85, [3, 27, 18, 14, 18]),
    (90, [3, 29, 19, 15, 19]),
    (95, [3, 30, 20, 16, 20]),
    (100, [3, 31, 21, 17, 21]),
];

pub fn structure_for(tonnage: u32, location: Location) -> Option<u32> {
    let (_, row) = STRUCTURE_TABLE.iter().find(|(t, _)| *t == tonnage)?;
    Some(match location {
        Location::Head => row[0],
        Location::CenterTorso => row[1],
        Location::LeftTorso | Location::RightTorso => row[2],
        Location::LeftArm | Location::RightArm => row[3],
        Location::LeftLeg | Location::RightLeg => row[4],
    })
}

// ── Components ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorKind {
    Shoulder,
    UpperArm,
    LowerArm,
    Hand,
    Hip,
    UpperLeg,
    LowerLeg,
    Foot,
}

impl ActuatorKind {
    pub const ARM: [ActuatorKind; 4] = [Self::Shoulder, Self::UpperArm, Self::LowerArm, Self::Hand];
    pub const LEG: [ActuatorKind; 4] = [Self::Hip, Self::UpperLeg, Self::LowerLeg, Self::Foot];

    pub fn is_leg(&self) -> bool {
        matches!(self, Self::Hip | Self::UpperLeg | Self::LowerLeg | Self::Foot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentKind {
    EcmSuite,
    ActiveProbe,
    TargetingComputer,
}

impl EquipmentKind {
    pub fn slots(&self) -> usize {
        match self {
            Self::EcmSuite | Self::ActiveProbe => 2,
            Self::TargetingComputer => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeleeWeapon {
    Hatchet,
    Sword,
    Mace,
}

impl MeleeWeapon {
    pub fn slots(&self, tonnage: u32) -> usize {
        match self {
            Self::Hatchet | Self::Sword => tonnage.div_ceil(15) as usize,
            Self::Mace => tonnage.div_ceil(10) as usize,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "component", content = "id", rename_all = "snake_case")]
pub enum SlotContent {
    Engine,
    Gyro,
    Cockpit,
    LifeSupport,
    Sensors,
    Actuator(ActuatorKind),
    /// Index into `UnitCombatState::weapons`.
    Weapon(usize),
    /// Index into `UnitCombatState::ammo`.
    Ammo(usize),
    HeatSink,
    JumpJet,
    Equipment(EquipmentKind),
    Melee(MeleeWeapon),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalSlot {
    pub content:   SlotContent,
    pub destroyed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseKind {
    #[default]
    None,
    Case,
    CaseII,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineType {
    #[default]
    Standard,
    Compact,
    Light,
    Xl,
}

impl EngineType {
    /// Engine slots in each side torso.
    pub fn side_torso_slots(&self) -> usize {
        match self {
            Self::Standard | Self::Compact => 0,
            Self::Light => 2,
            Self::Xl => 3,
        }
    }

    pub fn center_torso_slots(&self) -> usize {
        match self {
            Self::Compact => 3,
            _ => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GyroType {
    #[default]
    Standard,
    Xl,
    Compact,
    HeavyDuty,
}

impl GyroType {
    pub fn hits_to_destroy(&self) -> u32 {
        match self {
            Self::HeavyDuty => 3,
            _ => 2,
        }
    }

    pub fn slots(&self) -> usize {
        match self {
            Self::Standard | Self::HeavyDuty => 4,
            Self::Xl => 6,
            Self::Compact => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatSinkKind {
    #[default]
    Single,
    Double,
}

impl HeatSinkKind {
    pub fn capacity(&self) -> u32 {
        match self {
            Self::Single => 1,
            Self::Double => 2,
        }
    }

    pub fn slots(&self) -> usize {
        match self {
            Self::Single => 1,
            Self::Double => 3,
        }
    }
}

// ── Live state ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationState {
    pub armor:          u32,
    pub rear_armor:     u32,
    pub structure:      u32,
    pub max_armor:      u32,
    pub max_rear_armor: u32,
    pub max_structure:  u32,
    pub destroyed:      bool,
    pub case:           CaseKind,
    pub slots:          Vec<CriticalSlot>,
}

impl LocationState {
    pub fn armor_facing(&self, rear: bool) -> u32 {
        if rear {
            self.rear_armor
        } else {
            self.armor
        }
    }

    /// Indices of slots that can still take a critical hit.
    pub fn live_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.destroyed)
            .map(|(i, _)| i)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountedWeapon {
    pub weapon_id: String,
    pub location:  Location,
    #[serde(default)]
    pub rear:      bool,
    #[serde(default)]
    pub artemis:   bool,
    #[serde(default)]
    pub quirks:    Vec<WeaponQuirk>,
    #[serde(default)]
    pub jammed:    bool,
}

/// One ton of a specific munition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmmoBin {
    pub ammo_id:          String,
    pub ammo_type:        String,
    pub rounds:           u32,
    pub max_rounds:       u32,
    pub location:         Location,
    pub explosive:        bool,
    pub destroyed:        bool,
    pub damage_per_round: u32,
    pub cluster_modifier: i32,
}

impl AmmoBin {
    /// Damage if the bin goes up now. A bin that has just been hit is
    /// already marked destroyed but still holds its rounds.
    pub fn explosion_damage(&self) -> u32 {
        if !self.explosive {
            return 0;
        }
        self.rounds * self.damage_per_round
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PilotState {
    pub name:      String,
    pub gunnery:   u32,
    pub piloting:  u32,
    pub wounds:    u32,
    pub conscious: bool,
    pub killed:    bool,
    pub abilities: BTreeSet<TraitId>,
}

/// Explicit damage counters consulted by name at each resolver entry point.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComponentDamage {
    pub engine_hits:          u32,
    pub gyro_hits:            u32,
    pub sensor_hits:          u32,
    pub life_support_hits:    u32,
    pub cockpit_destroyed:    bool,
    pub heat_sinks_destroyed: u32,
    pub jump_jets_destroyed:  u32,
    /// First slot of each slotted heat sink already knocked out.
    pub sinks_hit:            BTreeSet<(Location, usize)>,
    pub actuators:            BTreeSet<(Location, ActuatorKind)>,
    pub weapons:              BTreeSet<usize>,
    pub equipment:            BTreeSet<EquipmentKind>,
    pub melee:                BTreeSet<(Location, MeleeWeapon)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestructionCause {
    CenterTorsoDestroyed,
    HeadDestroyed,
    EngineDestroyed,
    CockpitDestroyed,
    PilotKilled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub mode:     MovementMode,
    pub hexes:    u32,
    pub mp_spent: u32,
}

/// Per-turn bookkeeping, reset when the turn advances.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TurnActivity {
    pub movement:          Option<MovementRecord>,
    pub weapons_fired:     BTreeSet<usize>,
    pub fired_locations:   BTreeSet<Location>,
    pub weapon_heat:       u32,
    pub physical_limbs:    BTreeSet<Location>,
    pub physical_body:     bool,
    pub fell:              bool,
    /// Reset on every phase change.
    pub damage_this_phase: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitCombatState {
    pub id:            UnitId,
    pub name:          String,
    pub side:          Side,
    pub tonnage:       u32,
    pub engine_rating: u32,
    pub engine:        EngineType,
    pub gyro:          GyroType,
    pub battle_value:  u32,

    pub position: HexCoord,
    pub facing:   Facing,
    pub twist:    Twist,

    pub locations: BTreeMap<Location, LocationState>,
    pub weapons:   Vec<MountedWeapon>,
    pub ammo:      Vec<AmmoBin>,

    pub heat:           u32,
    pub heat_sinks:     u32,
    pub heat_sink_kind: HeatSinkKind,
    pub jump_jets:      u32,

    pub shutdown:  bool,
    pub prone:     bool,
    pub withdrawn: bool,
    pub destroyed: Option<DestructionCause>,

    pub damage:   ComponentDamage,
    pub pilot:    PilotState,
    pub quirks:   BTreeSet<TraitId>,
    pub activity: TurnActivity,
}

impl UnitCombatState {
    pub fn location(&self, location: Location) -> &LocationState {
        // Every unit is built with all eight locations.
        &self.locations[&location]
    }

    pub fn location_mut(&mut self, location: Location) -> Option<&mut LocationState> {
        self.locations.get_mut(&location)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.is_some()
    }

    /// Still on the field and fighting.
    pub fn is_active(&self) -> bool {
        !self.is_destroyed() && !self.withdrawn
    }

    /// Active, powered and conscious: may move and declare attacks.
    pub fn can_act(&self) -> bool {
        self.is_active() && !self.shutdown && self.pilot.conscious
    }

    /// The reason this unit may not act right now, if any.
    pub fn ensure_can_act(&self) -> Result<(), IllegalAction> {
        if self.is_destroyed() {
            return Err(IllegalAction::UnitDestroyed);
        }
        if self.withdrawn {
            return Err(IllegalAction::Withdrawn);
        }
        if self.shutdown {
            return Err(IllegalAction::ShutDown);
        }
        if !self.pilot.conscious {
            return Err(IllegalAction::PilotUnconscious);
        }
        Ok(())
    }

    pub fn is_immobile(&self) -> bool {
        self.shutdown || !self.pilot.conscious
    }

    pub fn location_destroyed(&self, location: Location) -> bool {
        self.location(location).destroyed
    }

    pub fn has_actuator(&self, location: Location, kind: ActuatorKind) -> bool {
        self.location(location)
            .slots
            .iter()
            .any(|s| s.content == SlotContent::Actuator(kind))
    }

    /// Present in the layout, not critically hit, limb still attached.
    pub fn actuator_working(&self, location: Location, kind: ActuatorKind) -> bool {
        !self.location_destroyed(location)
            && self.has_actuator(location, kind)
            && !self.damage.actuators.contains(&(location, kind))
    }

    pub fn actuator_destroyed(&self, location: Location, kind: ActuatorKind) -> bool {
        self.has_actuator(location, kind) && !self.actuator_working(location, kind)
    }

    pub fn weapon_working(&self, index: usize) -> bool {
        match self.weapons.get(index) {
            Some(w) => !self.damage.weapons.contains(&index) && !self.location_destroyed(w.location),
            None => false,
        }
    }

    pub fn equipment_working(&self, kind: EquipmentKind) -> bool {
        !self.damage.equipment.contains(&kind)
            && self.locations.values().any(|l| {
                !l.destroyed && l.slots.iter().any(|s| s.content == SlotContent::Equipment(kind))
            })
    }

    pub fn melee_working(&self, location: Location, weapon: MeleeWeapon) -> bool {
        !self.location_destroyed(location)
            && !self.damage.melee.contains(&(location, weapon))
            && self
                .location(location)
                .slots
                .iter()
                .any(|s| s.content == SlotContent::Melee(weapon))
    }

    pub fn gyro_destroyed(&self) -> bool {
        self.damage.gyro_hits >= self.gyro.hits_to_destroy()
    }

    pub fn legs_destroyed(&self) -> u32 {
        [Location::LeftLeg, Location::RightLeg]
            .iter()
            .filter(|l| self.location_destroyed(**l))
            .count() as u32
    }

    pub fn has_leg_or_gyro_damage(&self) -> bool {
        self.damage.gyro_hits > 0
            || self.legs_destroyed() > 0
            || self.damage.actuators.iter().any(|(_, k)| k.is_leg())
    }

    pub fn hip_destroyed(&self) -> bool {
        [Location::LeftLeg, Location::RightLeg]
            .iter()
            .any(|l| self.damage.actuators.contains(&(*l, ActuatorKind::Hip)))
    }

    /// All trait identifiers: pilot abilities and unit quirks together.
    pub fn traits(&self) -> BTreeSet<TraitId> {
        self.pilot.abilities.union(&self.quirks).copied().collect()
    }

    pub fn has_trait(&self, id: TraitId) -> bool {
        self.pilot.abilities.contains(&id) || self.quirks.contains(&id)
    }

    // ── Movement points ────────────────────────────────────────────

    pub fn base_walk_mp(&self) -> u32 {
        if self.tonnage == 0 {
            return 0;
        }
        self.engine_rating / self.tonnage
    }

    pub fn walk_mp(&self) -> u32 {
        if self.legs_destroyed() >= 2 {
            return 0;
        }
        let mut mp = self.base_walk_mp();
        if self.hip_destroyed() {
            mp /= 2;
        }
        let lesser = self
            .damage
            .actuators
            .iter()
            .filter(|(l, k)| {
                l.is_leg()
                    && !self.location_destroyed(*l)
                    && matches!(k, ActuatorKind::UpperLeg | ActuatorKind::LowerLeg | ActuatorKind::Foot)
            })
            .count() as u32;
        mp = mp.saturating_sub(lesser);
        mp = mp.saturating_sub(crate::heat::heat_movement_penalty(self.heat));
        if self.legs_destroyed() == 1 {
            mp = mp.min(1);
        }
        mp
    }

    pub fn run_mp(&self) -> u32 {
        let walk = self.walk_mp();
        if self.legs_destroyed() > 0 {
            return walk;
        }
        (walk * 3).div_ceil(2)
    }

    pub fn jump_mp(&self) -> u32 {
        self.jump_jets.saturating_sub(self.damage.jump_jets_destroyed)
    }

    // ── Heat ───────────────────────────────────────────────────────

    pub fn working_heat_sinks(&self) -> u32 {
        self.heat_sinks.saturating_sub(self.damage.heat_sinks_destroyed)
    }

    pub fn heat_capacity(&self) -> u32 {
        self.working_heat_sinks() * self.heat_sink_kind.capacity()
    }

    // ── Ammo ───────────────────────────────────────────────────────

    pub fn rounds_available(&self, ammo_type: &str) -> u32 {
        self.ammo
            .iter()
            .filter(|b| b.ammo_type == ammo_type && !b.destroyed)
            .map(|b| b.rounds)
            .sum()
    }

    pub fn total_armor(&self) -> u32 {
        self.locations.values().map(|l| l.armor + l.rear_armor).sum()
    }

    pub fn total_structure(&self) -> u32 {
        self.locations.values().map(|l| l.structure).sum()
    }
}

// ── Loadout input ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PilotSpec {
    pub name:      String,
    pub gunnery:   u32,
    pub piloting:  u32,
    #[serde(default)]
    pub abilities: Vec<TraitId>,
}

impl Default for PilotSpec {
    fn default() -> Self {
        Self {
            name:      "MechWarrior".into(),
            gunnery:   4,
            piloting:  5,
            abilities: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ArmorSpec {
    pub front: u32,
    #[serde(default)]
    pub rear:  u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponMount {
    pub weapon_id: String,
    pub location:  Location,
    #[serde(default)]
    pub rear:      bool,
    #[serde(default)]
    pub artemis:   bool,
    #[serde(default)]
    pub quirks:    Vec<WeaponQuirk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmmoMount {
    pub ammo_id:  String,
    pub location: Location,
    /// Defaults to a full ton.
    #[serde(default)]
    pub rounds:   Option<u32>,
}

/// Everything the engine needs from unit construction, as plain data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitSpec {
    pub id:            UnitId,
    pub name:          String,
    pub side:          Side,
    pub tonnage:       u32,
    pub engine_rating: u32,
    #[serde(default)]
    pub engine:        EngineType,
    #[serde(default)]
    pub gyro:          GyroType,
    #[serde(default)]
    pub battle_value:  u32,
    pub position:      HexCoord,
    pub facing:        Facing,
    #[serde(default)]
    pub pilot:         PilotSpec,
    #[serde(default)]
    pub quirks:        Vec<TraitId>,

    /// Total heat sinks, including the ten carried by the engine.
    pub heat_sinks:      u32,
    #[serde(default)]
    pub heat_sink_kind:  HeatSinkKind,
    /// Locations of heat sinks that take critical slots.
    #[serde(default)]
    pub heat_sink_slots: Vec<Location>,
    #[serde(default)]
    pub jump_jets:       Vec<Location>,

    pub armor:     BTreeMap<Location, ArmorSpec>,
    #[serde(default)]
    pub weapons:   Vec<WeaponMount>,
    #[serde(default)]
    pub ammo:      Vec<AmmoMount>,
    #[serde(default)]
    pub equipment: Vec<(EquipmentKind, Location)>,
    #[serde(default)]
    pub melee:     Vec<(MeleeWeapon, Location)>,
    #[serde(default)]
    pub case:      Vec<(Location, CaseKind)>,
}

impl UnitSpec {
    /// A standard biped with default armour (twice internal structure,
    /// nine on the head, a quarter of each torso's armour on the rear),
    /// ten single heat sinks and no weapons.
    pub fn biped(id: &str, side: Side, tonnage: u32, walk_mp: u32) -> Self {
        let mut armor = BTreeMap::new();
        for loc in Location::ALL {
            let s = structure_for(tonnage, loc).unwrap_or(0);
            let total = if loc == Location::Head { 9 } else { s * 2 };
            let spec = if loc.has_rear() {
                let rear = total / 4;
                ArmorSpec { front: total - rear, rear }
            } else {
                ArmorSpec { front: total, rear: 0 }
            };
            armor.insert(loc, spec);
        }
        Self {
            id:              id.to_string(),
            name:            id.to_string(),
            side,
            tonnage,
            engine_rating:   tonnage * walk_mp,
            engine:          EngineType::Standard,
            gyro:            GyroType::Standard,
            battle_value:    tonnage * 20,
            position:        HexCoord::new(0, 0),
            facing:          Facing::NORTH,
            pilot:           PilotSpec::default(),
            quirks:          Vec::new(),
            heat_sinks:      10,
            heat_sink_kind:  HeatSinkKind::Single,
            heat_sink_slots: Vec::new(),
            jump_jets:       Vec::new(),
            armor,
            weapons:         Vec::new(),
            ammo:            Vec::new(),
            equipment:       Vec::new(),
            melee:           Vec::new(),
            case:            Vec::new(),
        }
    }

    pub fn at(mut self, position: HexCoord, facing: Facing) -> Self {
        self.position = position;
        self.facing = facing;
        self
    }

    pub fn with_pilot(mut self, gunnery: u32, piloting: u32) -> Self {
        self.pilot.gunnery = gunnery;
        self.pilot.piloting = piloting;
        self
    }

    pub fn with_ability(mut self, ability: TraitId) -> Self {
        self.pilot.abilities.push(ability);
        self
    }

    pub fn with_quirk(mut self, quirk: TraitId) -> Self {
        self.quirks.push(quirk);
        self
    }

    pub fn with_engine(mut self, engine: EngineType) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_gyro(mut self, gyro: GyroType) -> Self {
        self.gyro = gyro;
        self
    }

    pub fn with_armor(mut self, location: Location, front: u32, rear: u32) -> Self {
        self.armor.insert(location, ArmorSpec { front, rear });
        self
    }

    pub fn with_weapon(mut self, weapon_id: &str, location: Location) -> Self {
        self.weapons.push(WeaponMount {
            weapon_id: weapon_id.to_string(),
            location,
            rear: false,
            artemis: false,
            quirks: Vec::new(),
        });
        self
    }

    pub fn with_mount(mut self, mount: WeaponMount) -> Self {
        self.weapons.push(mount);
        self
    }

    pub fn with_ammo(mut self, ammo_id: &str, location: Location) -> Self {
        self.ammo.push(AmmoMount {
            ammo_id: ammo_id.to_string(),
            location,
            rounds: None,
        });
        self
    }

    pub fn with_partial_ammo(mut self, ammo_id: &str, location: Location, rounds: u32) -> Self {
        self.ammo.push(AmmoMount {
            ammo_id: ammo_id.to_string(),
            location,
            rounds: Some(rounds),
        });
        self
    }

    pub fn with_heat_sinks(mut self, total: u32, kind: HeatSinkKind) -> Self {
        self.heat_sinks = total;
        self.heat_sink_kind = kind;
        self
    }

    pub fn with_heat_sink_slot(mut self, location: Location) -> Self {
        self.heat_sink_slots.push(location);
        self
    }

    pub fn with_jump_jets(mut self, locations: &[Location]) -> Self {
        self.jump_jets.extend_from_slice(locations);
        self
    }

    pub fn with_equipment(mut self, kind: EquipmentKind, location: Location) -> Self {
        self.equipment.push((kind, location));
        self
    }

    pub fn with_melee(mut self, weapon: MeleeWeapon, location: Location) -> Self {
        self.melee.push((weapon, location));
        self
    }

    pub fn with_case(mut self, location: Location, kind: CaseKind) -> Self {
        self.case.push((location, kind));
        self
    }

    /// Build the live combat state, validating against the catalog.
    pub fn build(&self, catalog: &WeaponCatalog) -> SimResult<UnitCombatState> {
        let fail = |msg: String| SimError::config(format!("unit {}: {msg}", self.id));

        if self.tonnage == 0 || structure_for(self.tonnage, Location::Head).is_none() {
            return Err(fail(format!("unsupported tonnage {}", self.tonnage)));
        }
        if self.pilot.gunnery > 8 || self.pilot.piloting > 8 {
            return Err(fail("pilot skills must be within 0-8".into()));
        }

        let mut slots: BTreeMap<Location, Vec<SlotContent>> = BTreeMap::new();
        for loc in Location::ALL {
            slots.insert(loc, fixed_slots(loc, self.engine, self.gyro));
        }

        let mut weapons = Vec::with_capacity(self.weapons.len());
        for (index, mount) in self.weapons.iter().enumerate() {
            let spec = catalog
                .weapon(&mount.weapon_id)
                .ok_or_else(|| fail(format!("unknown weapon '{}'", mount.weapon_id)))?;
            if let Some(ammo_type) = &spec.ammo_type {
                if catalog.ammo_for_type(ammo_type).is_none() {
                    return Err(fail(format!(
                        "weapon '{}' uses ammunition type '{ammo_type}' missing from the catalog",
                        mount.weapon_id
                    )));
                }
            }
            for _ in 0..spec.slots.max(1) {
                push_slot(&mut slots, mount.location, SlotContent::Weapon(index));
            }
            weapons.push(MountedWeapon {
                weapon_id: mount.weapon_id.clone(),
                location:  mount.location,
                rear:      mount.rear,
                artemis:   mount.artemis,
                quirks:    mount.quirks.clone(),
                jammed:    false,
            });
        }

        let mut ammo = Vec::with_capacity(self.ammo.len());
        for (index, mount) in self.ammo.iter().enumerate() {
            let spec = catalog
                .ammo(&mount.ammo_id)
                .ok_or_else(|| fail(format!("unknown ammunition '{}'", mount.ammo_id)))?;
            let rounds = mount.rounds.unwrap_or(spec.rounds_per_ton);
            if rounds > spec.rounds_per_ton {
                return Err(fail(format!(
                    "{} rounds exceed one ton of '{}'",
                    rounds, mount.ammo_id
                )));
            }
            push_slot(&mut slots, mount.location, SlotContent::Ammo(index));
            ammo.push(AmmoBin {
                ammo_id:          spec.id.clone(),
                ammo_type:        spec.ammo_type.clone(),
                rounds,
                max_rounds:       spec.rounds_per_ton,
                location:         mount.location,
                explosive:        spec.explosive,
                destroyed:        false,
                damage_per_round: spec.damage_per_round,
                cluster_modifier: spec.cluster_modifier,
            });
        }

        for loc in &self.heat_sink_slots {
            for _ in 0..self.heat_sink_kind.slots() {
                push_slot(&mut slots, *loc, SlotContent::HeatSink);
            }
        }
        for loc in &self.jump_jets {
            push_slot(&mut slots, *loc, SlotContent::JumpJet);
        }
        for (kind, loc) in &self.equipment {
            for _ in 0..kind.slots() {
                push_slot(&mut slots, *loc, SlotContent::Equipment(*kind));
            }
        }
        for (weapon, loc) in &self.melee {
            if !loc.is_arm() {
                return Err(fail(format!("{weapon:?} must be mounted in an arm")));
            }
            for _ in 0..weapon.slots(self.tonnage) {
                push_slot(&mut slots, *loc, SlotContent::Melee(*weapon));
            }
        }

        let case: BTreeMap<Location, CaseKind> = self.case.iter().copied().collect();
        let mut locations = BTreeMap::new();
        for loc in Location::ALL {
            let contents = slots.remove(&loc).unwrap_or_default();
            if contents.len() > loc.slot_count() {
                return Err(fail(format!(
                    "{} critical slots used in {loc}, only {} available",
                    contents.len(),
                    loc.slot_count()
                )));
            }
            let structure = structure_for(self.tonnage, loc).unwrap_or(0);
            let armor = self.armor.get(&loc).copied().unwrap_or(ArmorSpec { front: 0, rear: 0 });
            if armor.rear > 0 && !loc.has_rear() {
                return Err(fail(format!("{loc} has no rear armour")));
            }
            locations.insert(
                loc,
                LocationState {
                    armor:          armor.front,
                    rear_armor:     armor.rear,
                    structure,
                    max_armor:      armor.front,
                    max_rear_armor: armor.rear,
                    max_structure:  structure,
                    destroyed:      false,
                    case:           case.get(&loc).copied().unwrap_or_default(),
                    slots:          contents
                        .into_iter()
                        .map(|content| CriticalSlot { content, destroyed: false })
                        .collect(),
                },
            );
        }

        Ok(UnitCombatState {
            id:            self.id.clone(),
            name:          self.name.clone(),
            side:          self.side,
            tonnage:       self.tonnage,
            engine_rating: self.engine_rating,
            engine:        self.engine,
            gyro:          self.gyro,
            battle_value:  self.battle_value,
            position:      self.position,
            facing:        self.facing,
            twist:         Twist::None,
            locations,
            weapons,
            ammo,
            heat:           0,
            heat_sinks:     self.heat_sinks,
            heat_sink_kind: self.heat_sink_kind,
            jump_jets:      self.jump_jets.len() as u32,
            shutdown:  false,
            prone:     false,
            withdrawn: false,
            destroyed: None,
            damage: ComponentDamage::default(),
            pilot: PilotState {
                name:      self.pilot.name.clone(),
                gunnery:   self.pilot.gunnery,
                piloting:  self.pilot.piloting,
                wounds:    0,
                conscious: true,
                killed:    false,
                abilities: self.pilot.abilities.iter().copied().collect(),
            },
            quirks:   self.quirks.iter().copied().collect(),
            activity: TurnActivity::default(),
        })
    }
}

fn push_slot(slots: &mut BTreeMap<Location, Vec<SlotContent>>, location: Location, content: SlotContent) {
    slots.entry(location).or_default().push(content);
}

/// Components every biped carries in fixed positions.
fn fixed_slots(location: Location, engine: EngineType, gyro: GyroType) -> Vec<SlotContent> {
    use SlotContent::*;
    match location {
        Location::Head => vec![LifeSupport, Sensors, Cockpit, Sensors, LifeSupport],
        Location::CenterTorso => {
            let engine_slots = engine.center_torso_slots();
            let mut v = vec![Engine; engine_slots / 2];
            v.extend(std::iter::repeat(Gyro).take(gyro.slots()));
            v.extend(std::iter::repeat(Engine).take(engine_slots - engine_slots / 2));
            v
        }
        Location::LeftTorso | Location::RightTorso => vec![Engine; engine.side_torso_slots()],
        Location::LeftArm | Location::RightArm => {
            ActuatorKind::ARM.iter().map(|k| Actuator(*k)).collect()
        }
        Location::LeftLeg | Location::RightLeg => {
            ActuatorKind::LEG.iter().map(|k| Actuator(*k)).collect()
        }
    }
}
