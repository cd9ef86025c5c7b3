//! Battlefield terrain lookup.
//!
//! Map data comes from outside the engine; this module only answers
//! questions the resolvers ask about it. Hexes not listed are clear
//! ground at elevation 0.

use crate::hex::HexCoord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerrainKind {
    #[default]
    Clear,
    LightWoods,
    HeavyWoods,
    Rough,
    Rubble,
    Water { depth: u8 },
}

impl TerrainKind {
    /// Woods density for line-of-sight and to-hit purposes.
    pub fn woods(&self) -> u32 {
        match self {
            Self::LightWoods => 1,
            Self::HeavyWoods => 2,
            _ => 0,
        }
    }

    pub fn water_depth(&self) -> u8 {
        match self {
            Self::Water { depth } => *depth,
            _ => 0,
        }
    }

    /// Extra movement points to enter, on top of the base 1.
    pub fn entry_surcharge(&self) -> u32 {
        match self {
            Self::Clear => 0,
            Self::LightWoods | Self::Rough | Self::Rubble => 1,
            Self::HeavyWoods => 2,
            Self::Water { depth: 0 } => 0,
            Self::Water { depth: 1 } => 1,
            Self::Water { .. } => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HexTerrain {
    #[serde(flatten)]
    pub kind:      TerrainKind,
    #[serde(default)]
    pub elevation: i32,
}

/// One entry of a map file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainHex {
    pub q: i32,
    pub r: i32,
    #[serde(flatten)]
    pub terrain: HexTerrain,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<TerrainHex>", into = "Vec<TerrainHex>")]
pub struct TerrainMap {
    hexes: BTreeMap<HexCoord, HexTerrain>,
}

impl TerrainMap {
    pub fn open_field() -> Self {
        Self::default()
    }

    pub fn set(&mut self, hex: HexCoord, terrain: HexTerrain) {
        if terrain == HexTerrain::default() {
            self.hexes.remove(&hex);
        } else {
            self.hexes.insert(hex, terrain);
        }
    }

    pub fn with(mut self, hex: HexCoord, kind: TerrainKind) -> Self {
        let elevation = self.at(hex).elevation;
        self.set(hex, HexTerrain { kind, elevation });
        self
    }

    pub fn with_elevation(mut self, hex: HexCoord, elevation: i32) -> Self {
        let kind = self.at(hex).kind;
        self.set(hex, HexTerrain { kind, elevation });
        self
    }

    pub fn at(&self, hex: HexCoord) -> HexTerrain {
        self.hexes.get(&hex).copied().unwrap_or_default()
    }

    /// Sum of woods density over the hexes strictly between two points.
    pub fn intervening_woods(&self, from: HexCoord, to: HexCoord) -> u32 {
        from.line_between(to)
            .into_iter()
            .map(|h| self.at(h).kind.woods())
            .sum()
    }

    /// Number of water hexes strictly between two points.
    pub fn intervening_water(&self, from: HexCoord, to: HexCoord) -> u32 {
        from.line_between(to)
            .into_iter()
            .filter(|h| self.at(*h).kind.water_depth() > 0)
            .count() as u32
    }

    /// True when intervening terrain fully blocks sight between two units.
    ///
    /// Woods totalling 3 or more block, as does any intervening hex at
    /// least two levels above both endpoints.
    pub fn line_of_sight_blocked(&self, from: HexCoord, to: HexCoord) -> bool {
        if self.intervening_woods(from, to) >= 3 {
            return true;
        }
        let top = self.at(from).elevation.max(self.at(to).elevation);
        from.line_between(to)
            .into_iter()
            .any(|h| self.at(h).elevation >= top + 2)
    }

    /// Partial cover: target standing in depth-1 water, or the last hex
    /// before the target sits exactly one level above it while the
    /// attacker is not higher than that hex.
    pub fn partial_cover(&self, attacker: HexCoord, target: HexCoord) -> bool {
        let t = self.at(target);
        if t.kind.water_depth() == 1 {
            return true;
        }
        let line = attacker.line_between(target);
        match line.last() {
            Some(last) => {
                let cover = self.at(*last).elevation;
                cover == t.elevation + 1 && self.at(attacker).elevation <= cover
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.hexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hexes.is_empty()
    }
}

impl From<Vec<TerrainHex>> for TerrainMap {
    fn from(hexes: Vec<TerrainHex>) -> Self {
        let mut map = TerrainMap::default();
        for h in hexes {
            map.set(HexCoord::new(h.q, h.r), h.terrain);
        }
        map
    }
}

impl From<TerrainMap> for Vec<TerrainHex> {
    fn from(map: TerrainMap) -> Self {
        map.hexes
            .into_iter()
            .map(|(hex, terrain)| TerrainHex { q: hex.q, r: hex.r, terrain })
            .collect()
    }
}
