//! Turn clock: owns the turn number, the current phase and the
//! movement activation order.

use crate::types::{Side, Turn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initiative,
    Movement,
    WeaponAttack,
    PhysicalAttack,
    Heat,
    End,
}

impl Phase {
    /// The phase after this one. End wraps to the next turn's Initiative.
    pub fn next(&self) -> Phase {
        match self {
            Self::Initiative     => Self::Movement,
            Self::Movement       => Self::WeaponAttack,
            Self::WeaponAttack   => Self::PhysicalAttack,
            Self::PhysicalAttack => Self::Heat,
            Self::Heat           => Self::End,
            Self::End            => Self::Initiative,
        }
    }

    /// Phases in which declarations are collected before resolution.
    pub fn accepts_attacks(&self) -> bool {
        matches!(self, Self::WeaponAttack | Self::PhysicalAttack)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnClock {
    pub turn:           Turn,
    pub phase:          Phase,
    /// Side to activate for each movement slot, loser of initiative first.
    pub movement_order: Vec<Side>,
    pub next_mover:     usize,
}

impl TurnClock {
    pub fn new() -> Self {
        Self {
            turn:           1,
            phase:          Phase::Initiative,
            movement_order: Vec::new(),
            next_mover:     0,
        }
    }

    /// Side expected to move next, if any slots remain.
    pub fn side_to_move(&self) -> Option<Side> {
        self.movement_order.get(self.next_mover).copied()
    }

    pub fn movement_complete(&self) -> bool {
        self.next_mover >= self.movement_order.len()
    }
}

impl Default for TurnClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Alternating activation order. The loser moves first; when one side
/// has more units its extra activations come at the end.
pub fn activation_order(loser: Side, loser_units: usize, winner: Side, winner_units: usize) -> Vec<Side> {
    let mut order = Vec::with_capacity(loser_units + winner_units);
    let paired = loser_units.min(winner_units);
    for _ in 0..paired {
        order.push(loser);
        order.push(winner);
    }
    order.extend(std::iter::repeat(loser).take(loser_units - paired));
    order.extend(std::iter::repeat(winner).take(winner_units - paired));
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_cycle_back_to_initiative() {
        let mut p = Phase::Initiative;
        for _ in 0..6 {
            p = p.next();
        }
        assert_eq!(p, Phase::Initiative);
    }

    #[test]
    fn larger_side_finishes_last() {
        assert_eq!(activation_order(1, 3, 0, 1), vec![1, 0, 1, 1]);
        assert_eq!(activation_order(0, 1, 1, 2), vec![0, 1, 1]);
    }
}
