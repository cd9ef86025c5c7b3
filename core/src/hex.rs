//! Flat-top axial hex geometry.
//!
//! Facing 0 is north; facings increase clockwise (0 N, 1 NE, 2 SE,
//! 3 S, 4 SW, 5 NW). Cube coordinates are (q, -q-r, r).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HexCoord {
    pub q: i32,
    pub r: i32,
}

/// Axial offsets of the six neighbours, indexed by facing.
pub const DIRECTIONS: [(i32, i32); 6] = [(0, -1), (1, -1), (1, 0), (0, 1), (-1, 1), (-1, 0)];

impl HexCoord {
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    pub fn s(&self) -> i32 {
        -self.q - self.r
    }

    pub fn cube(&self) -> (i32, i32, i32) {
        (self.q, self.s(), self.r)
    }

    pub fn distance(&self, other: HexCoord) -> u32 {
        let dq = (self.q - other.q).abs();
        let dr = (self.r - other.r).abs();
        let ds = (self.s() - other.s()).abs();
        dq.max(dr).max(ds) as u32
    }

    pub fn neighbor(&self, facing: Facing) -> HexCoord {
        let (dq, dr) = DIRECTIONS[facing.index()];
        HexCoord::new(self.q + dq, self.r + dr)
    }

    /// Facing of the step from `self` to an adjacent `other`.
    pub fn direction_to_adjacent(&self, other: HexCoord) -> Option<Facing> {
        let delta = (other.q - self.q, other.r - self.r);
        DIRECTIONS
            .iter()
            .position(|d| *d == delta)
            .map(|i| Facing::new(i as u8))
    }

    /// Hexes strictly between `self` and `other`, in order.
    ///
    /// Samples the line at hex centres with a fixed nudge so that lines
    /// running exactly along a hex spine always resolve the same way.
    pub fn line_between(&self, other: HexCoord) -> Vec<HexCoord> {
        let n = self.distance(other);
        if n <= 1 {
            return Vec::new();
        }
        let (aq, ar, as_) = (
            self.q as f64 + 1e-6,
            self.r as f64 + 1e-6,
            self.s() as f64 - 2e-6,
        );
        let (bq, br, bs) = (
            other.q as f64 + 1e-6,
            other.r as f64 + 1e-6,
            other.s() as f64 - 2e-6,
        );
        (1..n)
            .map(|i| {
                let t = i as f64 / n as f64;
                cube_round(
                    aq + (bq - aq) * t,
                    ar + (br - ar) * t,
                    as_ + (bs - as_) * t,
                )
            })
            .collect()
    }
}

fn cube_round(q: f64, r: f64, s: f64) -> HexCoord {
    let mut rq = q.round();
    let mut rr = r.round();
    let rs = s.round();
    let dq = (rq - q).abs();
    let dr = (rr - r).abs();
    let ds = (rs - s).abs();
    if dq > dr && dq > ds {
        rq = -rr - rs;
    } else if dr > ds {
        rr = -rq - rs;
    }
    HexCoord::new(rq as i32, rr as i32)
}

impl std::fmt::Display for HexCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.q, self.r)
    }
}

/// One of six hexside facings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Facing(u8);

impl Facing {
    pub const NORTH: Facing = Facing(0);
    pub const SOUTH: Facing = Facing(3);

    pub fn new(value: u8) -> Self {
        Facing(value % 6)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Rotate by `steps` hexsides; positive is clockwise.
    pub fn rotate(&self, steps: i32) -> Facing {
        Facing((self.0 as i32 + steps).rem_euclid(6) as u8)
    }

    pub fn opposite(&self) -> Facing {
        self.rotate(3)
    }

    /// Minimum number of hexside turns to get from `self` to `other`.
    pub fn turns_to(&self, other: Facing) -> u32 {
        let diff = (other.0 as i32 - self.0 as i32).rem_euclid(6);
        diff.min(6 - diff) as u32
    }
}

/// Torso twist relative to leg facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Twist {
    #[default]
    None,
    Left,
    Right,
}

impl Twist {
    pub fn steps(&self) -> i32 {
        match self {
            Self::None => 0,
            Self::Left => -1,
            Self::Right => 1,
        }
    }
}

/// Facings whose directions are closest to the vector from `from` to `to`.
///
/// Uses integer dot products in cube space, so the result is exact: one
/// facing for a vector inside a sector, two adjacent facings for a vector
/// lying exactly on a sector boundary. Empty when `from == to`.
pub fn nearest_directions(from: HexCoord, to: HexCoord) -> Vec<Facing> {
    let (fx, fy, fz) = from.cube();
    let (tx, ty, tz) = to.cube();
    let v = (tx - fx, ty - fy, tz - fz);
    if v == (0, 0, 0) {
        return Vec::new();
    }
    let dots: Vec<i32> = DIRECTIONS
        .iter()
        .map(|(dq, dr)| {
            let d = (*dq, -dq - dr, *dr);
            v.0 * d.0 + v.1 * d.1 + v.2 * d.2
        })
        .collect();
    let best = dots.iter().copied().max().unwrap_or(0);
    dots.iter()
        .enumerate()
        .filter(|(_, d)| **d == best)
        .map(|(i, _)| Facing::new(i as u8))
        .collect()
}
