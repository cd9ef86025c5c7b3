use crate::{
    error::{SimError, SimResult},
    psr::PsrRegistry,
    terrain::TerrainMap,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Weapon catalog ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeBracket {
    Short,
    Medium,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponCategory {
    Energy,
    Ballistic,
    Missile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireMode {
    #[default]
    Standard,
    /// May fire at rate 2; jams on a natural 2.
    Ultra,
    /// May fire at rate 1-6; jams on a natural 2 (rates 2-4) or 3 (5-6).
    Rotary,
}

impl FireMode {
    pub fn max_rate(&self) -> u8 {
        match self {
            Self::Standard => 1,
            Self::Ultra => 2,
            Self::Rotary => 6,
        }
    }
}

/// Missile rack parameters for cluster weapons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub rack:               u32,
    pub damage_per_missile: u32,
    /// Damage is applied in groups of this many missiles.
    pub group:              u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponSpec {
    pub id:        String,
    pub name:      String,
    pub category:  WeaponCategory,
    /// Per hit. Cluster weapons use `cluster.damage_per_missile` instead.
    pub damage:    u32,
    pub heat:      u32,
    #[serde(default)]
    pub min_range: u32,
    pub short:     u32,
    pub medium:    u32,
    pub long:      u32,
    #[serde(default)]
    pub ammo_type: Option<String>,
    pub slots:     u32,
    #[serde(default)]
    pub cluster:   Option<ClusterSpec>,
    #[serde(default)]
    pub fire_mode: FireMode,
}

impl WeaponSpec {
    /// None beyond long range.
    pub fn bracket(&self, distance: u32) -> Option<RangeBracket> {
        if distance <= self.short {
            Some(RangeBracket::Short)
        } else if distance <= self.medium {
            Some(RangeBracket::Medium)
        } else if distance <= self.long {
            Some(RangeBracket::Long)
        } else {
            None
        }
    }

    pub fn needs_ammo(&self) -> bool {
        self.ammo_type.is_some()
    }

    pub fn is_cluster(&self) -> bool {
        self.cluster.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmmoSpec {
    pub id:               String,
    /// Matches `WeaponSpec::ammo_type`.
    pub ammo_type:        String,
    pub rounds_per_ton:   u32,
    /// Explosion damage per remaining round.
    pub damage_per_round: u32,
    #[serde(default = "default_true")]
    pub explosive:        bool,
    #[serde(default)]
    pub cluster_modifier: i32,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    weapons: Vec<WeaponSpec>,
    #[serde(default)]
    ammo:    Vec<AmmoSpec>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "CatalogFile", into = "CatalogFile")]
pub struct WeaponCatalog {
    weapons: BTreeMap<String, WeaponSpec>,
    ammo:    BTreeMap<String, AmmoSpec>,
}

impl From<CatalogFile> for WeaponCatalog {
    fn from(file: CatalogFile) -> Self {
        let mut catalog = WeaponCatalog::default();
        for w in file.weapons {
            catalog.insert_weapon(w);
        }
        for a in file.ammo {
            catalog.insert_ammo(a);
        }
        catalog
    }
}

impl From<WeaponCatalog> for CatalogFile {
    fn from(catalog: WeaponCatalog) -> Self {
        CatalogFile {
            weapons: catalog.weapons.into_values().collect(),
            ammo:    catalog.ammo.into_values().collect(),
        }
    }
}

impl WeaponCatalog {
    pub fn weapon(&self, id: &str) -> Option<&WeaponSpec> {
        self.weapons.get(id)
    }

    pub fn ammo(&self, id: &str) -> Option<&AmmoSpec> {
        self.ammo.get(id)
    }

    /// First munition (by id) feeding the given ammunition type.
    pub fn ammo_for_type(&self, ammo_type: &str) -> Option<&AmmoSpec> {
        self.ammo.values().find(|a| a.ammo_type == ammo_type)
    }

    pub fn insert_weapon(&mut self, spec: WeaponSpec) {
        self.weapons.insert(spec.id.clone(), spec);
    }

    pub fn insert_ammo(&mut self, spec: AmmoSpec) {
        self.ammo.insert(spec.id.clone(), spec);
    }

    pub fn weapons(&self) -> impl Iterator<Item = &WeaponSpec> {
        self.weapons.values()
    }

    pub fn validate(&self) -> SimResult<()> {
        for w in self.weapons.values() {
            if !(w.short <= w.medium && w.medium <= w.long) {
                return Err(SimError::config(format!("weapon '{}' has unordered range brackets", w.id)));
            }
            if let Some(ammo_type) = &w.ammo_type {
                if self.ammo_for_type(ammo_type).is_none() {
                    return Err(SimError::config(format!(
                        "weapon '{}' needs ammunition type '{ammo_type}' which the catalog lacks",
                        w.id
                    )));
                }
            }
            if let Some(c) = &w.cluster {
                if c.rack == 0 || c.group == 0 || c.rack > 20 {
                    return Err(SimError::config(format!("weapon '{}' has an invalid cluster rack", w.id)));
                }
            }
        }
        for a in self.ammo.values() {
            if a.rounds_per_ton == 0 {
                return Err(SimError::config(format!("ammunition '{}' has no rounds per ton", a.id)));
            }
        }
        Ok(())
    }

    /// The standard Inner Sphere weapons used by tests and the runner.
    pub fn builtin() -> Self {
        let mut c = WeaponCatalog::default();
        let energy = |id: &str, name: &str, damage, heat, min, s, m, l, slots| WeaponSpec {
            id:        id.into(),
            name:      name.into(),
            category:  WeaponCategory::Energy,
            damage,
            heat,
            min_range: min,
            short:     s,
            medium:    m,
            long:      l,
            ammo_type: None,
            slots,
            cluster:   None,
            fire_mode: FireMode::Standard,
        };
        c.insert_weapon(energy("small_laser", "Small Laser", 3, 1, 0, 1, 2, 3, 1));
        c.insert_weapon(energy("medium_laser", "Medium Laser", 5, 3, 0, 3, 6, 9, 1));
        c.insert_weapon(energy("large_laser", "Large Laser", 8, 8, 0, 5, 10, 15, 2));
        c.insert_weapon(energy("ppc", "PPC", 10, 10, 3, 6, 12, 18, 3));

        let ballistic = |id: &str, name: &str, damage, heat, min, s, m, l, slots, mode| WeaponSpec {
            id:        id.into(),
            name:      name.into(),
            category:  WeaponCategory::Ballistic,
            damage,
            heat,
            min_range: min,
            short:     s,
            medium:    m,
            long:      l,
            ammo_type: Some(id.to_string()),
            slots,
            cluster:   None,
            fire_mode: mode,
        };
        c.insert_weapon(ballistic("machine_gun", "Machine Gun", 2, 0, 0, 1, 2, 3, 1, FireMode::Standard));
        c.insert_weapon(ballistic("ac5", "AC/5", 5, 1, 3, 6, 12, 18, 4, FireMode::Standard));
        c.insert_weapon(ballistic("ac10", "AC/10", 10, 3, 0, 5, 10, 15, 7, FireMode::Standard));
        c.insert_weapon(ballistic("ac20", "AC/20", 20, 7, 0, 3, 6, 9, 10, FireMode::Standard));
        c.insert_weapon(ballistic("uac5", "Ultra AC/5", 5, 1, 2, 6, 13, 20, 5, FireMode::Ultra));
        c.insert_weapon(ballistic("rac5", "Rotary AC/5", 5, 1, 0, 5, 10, 15, 6, FireMode::Rotary));

        let missile = |id: &str, name: &str, heat, min, s, m, l, slots, rack, dpm, group| WeaponSpec {
            id:        id.into(),
            name:      name.into(),
            category:  WeaponCategory::Missile,
            damage:    dpm,
            heat,
            min_range: min,
            short:     s,
            medium:    m,
            long:      l,
            ammo_type: Some(id.to_string()),
            slots,
            cluster:   Some(ClusterSpec { rack, damage_per_missile: dpm, group }),
            fire_mode: FireMode::Standard,
        };
        c.insert_weapon(missile("lrm10", "LRM 10", 4, 6, 7, 14, 21, 2, 10, 1, 5));
        c.insert_weapon(missile("lrm20", "LRM 20", 6, 6, 7, 14, 21, 5, 20, 1, 5));
        c.insert_weapon(missile("srm4", "SRM 4", 3, 0, 3, 6, 9, 1, 4, 2, 1));
        c.insert_weapon(missile("srm6", "SRM 6", 4, 0, 3, 6, 9, 2, 6, 2, 1));

        let ammo = |id: &str, ammo_type: &str, rounds, per_round| AmmoSpec {
            id:               id.into(),
            ammo_type:        ammo_type.into(),
            rounds_per_ton:   rounds,
            damage_per_round: per_round,
            explosive:        true,
            cluster_modifier: 0,
        };
        c.insert_ammo(ammo("machine_gun_ammo", "machine_gun", 200, 2));
        c.insert_ammo(ammo("ac5_ammo", "ac5", 20, 5));
        c.insert_ammo(ammo("ac10_ammo", "ac10", 10, 10));
        c.insert_ammo(ammo("ac20_ammo", "ac20", 5, 20));
        c.insert_ammo(ammo("uac5_ammo", "uac5", 20, 5));
        c.insert_ammo(ammo("rac5_ammo", "rac5", 20, 5));
        c.insert_ammo(ammo("lrm10_ammo", "lrm10", 12, 10));
        c.insert_ammo(ammo("lrm20_ammo", "lrm20", 6, 20));
        c.insert_ammo(ammo("srm4_ammo", "srm4", 25, 8));
        c.insert_ammo(ammo("srm6_ammo", "srm6", 15, 12));
        c
    }
}

// ── Rules ──────────────────────────────────────────────────────────

/// Independent switches for every to-hit modifier family plus the
/// numeric constants resolvers consult.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub range_modifiers:     bool,
    pub min_range:           bool,
    pub attacker_movement:   bool,
    pub target_movement:     bool,
    pub heat_modifiers:      bool,
    pub terrain_modifiers:   bool,
    pub prone_modifiers:     bool,
    pub immobile_modifier:   bool,
    pub secondary_target:    bool,
    pub trait_modifiers:     bool,
    pub equipment_modifiers: bool,
    pub damage_modifiers:    bool,
    pub partial_cover:       bool,
    pub called_shots:        bool,
    /// Maximum damage one weapon hit or physical blow may deal to the head.
    pub head_cap:             u32,
    /// To-hit penalty per intervening water hex.
    pub intervening_water:    u32,
    /// Damage in one phase at or above which the unit must make a PSR.
    pub damage_psr_threshold: u32,
    /// Pilot damage from an ammunition explosion without CASE.
    pub explosion_pilot_damage: u32,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            range_modifiers:        true,
            min_range:              true,
            attacker_movement:      true,
            target_movement:        true,
            heat_modifiers:         true,
            terrain_modifiers:      true,
            prone_modifiers:        true,
            immobile_modifier:      true,
            secondary_target:       true,
            trait_modifiers:        true,
            equipment_modifiers:    true,
            damage_modifiers:       true,
            partial_cover:          true,
            called_shots:           true,
            head_cap:               3,
            intervening_water:      1,
            damage_psr_threshold:   20,
            explosion_pilot_damage: 2,
        }
    }
}

impl RulesConfig {
    /// Only the gunnery base: every modifier family off.
    pub fn bare() -> Self {
        Self {
            range_modifiers:     false,
            min_range:           false,
            attacker_movement:   false,
            target_movement:     false,
            heat_modifiers:      false,
            terrain_modifiers:   false,
            prone_modifiers:     false,
            immobile_modifier:   false,
            secondary_target:    false,
            trait_modifiers:     false,
            equipment_modifiers: false,
            damage_modifiers:    false,
            partial_cover:       false,
            called_shots:        false,
            ..Self::default()
        }
    }
}

// ── Battle config ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleConfig {
    pub turn_limit: u32,
    #[serde(default)]
    pub rules:      RulesConfig,
    pub catalog:    WeaponCatalog,
    #[serde(default)]
    pub terrain:    TerrainMap,
    #[serde(default)]
    pub psr:        PsrRegistry,
}

impl BattleConfig {
    /// Load from a data directory holding `weapons.json`, `ammo.json`
    /// and optionally `map.json`. In tests, use BattleConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let weapons_path = format!("{data_dir}/weapons.json");
        let weapons_content = std::fs::read_to_string(&weapons_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {weapons_path}: {e}"))?;
        let weapons: Vec<WeaponSpec> = serde_json::from_str(&weapons_content)?;

        let ammo_path = format!("{data_dir}/ammo.json");
        let ammo_content = std::fs::read_to_string(&ammo_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {ammo_path}: {e}"))?;
        let ammo: Vec<AmmoSpec> = serde_json::from_str(&ammo_content)?;

        let map_path = format!("{data_dir}/map.json");
        let terrain = match std::fs::read_to_string(&map_path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => TerrainMap::open_field(),
            Err(e) => return Err(anyhow::anyhow!("Cannot read {map_path}: {e}")),
        };

        let config = Self {
            turn_limit: 20,
            rules:      RulesConfig::default(),
            catalog:    WeaponCatalog::from(CatalogFile { weapons, ammo }),
            terrain,
            psr:        PsrRegistry::standard(),
        };
        config.validate()?;
        log::info!(
            "Loaded {} weapons and {} terrain hexes from {data_dir}",
            config.catalog.weapons.len(),
            config.terrain.len()
        );
        Ok(config)
    }

    /// Built-in catalog on an open map, with a 20-turn limit.
    pub fn default_test() -> Self {
        Self {
            turn_limit: 20,
            rules:      RulesConfig::default(),
            catalog:    WeaponCatalog::builtin(),
            terrain:    TerrainMap::open_field(),
            psr:        PsrRegistry::standard(),
        }
    }

    pub fn with_turn_limit(mut self, turn_limit: u32) -> Self {
        self.turn_limit = turn_limit;
        self
    }

    pub fn with_rules(mut self, rules: RulesConfig) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_terrain(mut self, terrain: TerrainMap) -> Self {
        self.terrain = terrain;
        self
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.turn_limit == 0 {
            return Err(SimError::config("turn limit must be at least 1"));
        }
        if self.rules.head_cap == 0 {
            return Err(SimError::config("head cap must be at least 1"));
        }
        self.catalog.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_is_valid() {
        WeaponCatalog::builtin().validate().unwrap();
    }

    #[test]
    fn range_brackets_are_inclusive() {
        let c = WeaponCatalog::builtin();
        let ml = c.weapon("medium_laser").unwrap();
        assert_eq!(ml.bracket(3), Some(RangeBracket::Short));
        assert_eq!(ml.bracket(4), Some(RangeBracket::Medium));
        assert_eq!(ml.bracket(9), Some(RangeBracket::Long));
        assert_eq!(ml.bracket(10), None);
    }

    #[test]
    fn zero_turn_limit_is_rejected() {
        let err = BattleConfig::default_test().with_turn_limit(0).validate().unwrap_err();
        assert!(matches!(err, SimError::Configuration(_)));
    }

    #[test]
    fn weapon_without_ammo_type_in_catalog_is_rejected() {
        let mut c = WeaponCatalog::builtin();
        let mut gauss = c.weapon("ac10").unwrap().clone();
        gauss.id = "gauss".into();
        gauss.ammo_type = Some("gauss".into());
        c.insert_weapon(gauss);
        assert!(c.validate().is_err());
    }
}
