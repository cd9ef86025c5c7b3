//! Deterministic dice.
//!
//! RULE: Nothing in the engine may call any platform RNG.
//! Every roll (to-hit, hit location, criticals, cluster hits,
//! fall direction, slot selection) flows through the battle's
//! single DiceSource, seeded once when the battle is created.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use std::collections::VecDeque;

/// Injectable source of dice rolls.
pub trait DiceSource: Send {
    /// Roll one six-sided die: 1..=6.
    fn d6(&mut self) -> u8;

    /// Pick an index uniformly in [0, n). `n` must be > 0.
    fn pick(&mut self, n: usize) -> usize;

    /// Roll 2d6: 2..=12.
    fn roll_2d6(&mut self) -> u8 {
        self.d6() + self.d6()
    }
}

/// The production dice stream. Same seed, same rolls.
pub struct SeededDice {
    inner: Pcg64Mcg,
    rolls: u64,
}

impl SeededDice {
    pub fn new(seed: u64) -> Self {
        // Spread low-entropy seeds (0, 1, 2...) across the state space.
        let derived_seed = seed ^ 0x9e37_79b9_7f4a_7c15;
        Self {
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
            rolls: 0,
        }
    }

    /// Number of draws taken so far.
    pub fn rolls(&self) -> u64 {
        self.rolls
    }
}

impl DiceSource for SeededDice {
    fn d6(&mut self) -> u8 {
        self.rolls += 1;
        self.inner.gen_range(1..=6)
    }

    fn pick(&mut self, n: usize) -> usize {
        assert!(n > 0, "n must be > 0");
        self.rolls += 1;
        self.inner.gen_range(0..n)
    }
}

/// Replays a fixed script of rolls. Used to pin exact scenarios in tests.
///
/// Once a script runs dry the dice fall back to a seeded stream, so a
/// scenario only needs to script the rolls it cares about.
pub struct ScriptedDice {
    d6s:      VecDeque<u8>,
    picks:    VecDeque<usize>,
    fallback: SeededDice,
}

impl ScriptedDice {
    pub fn new(d6s: impl IntoIterator<Item = u8>) -> Self {
        Self {
            d6s:      d6s.into_iter().collect(),
            picks:    VecDeque::new(),
            fallback: SeededDice::new(0),
        }
    }

    /// Script 2d6 totals. Each total is split into two d6 faces.
    pub fn from_2d6(totals: impl IntoIterator<Item = u8>) -> Self {
        let mut d6s = Vec::new();
        for total in totals {
            let (a, b) = split_2d6(total);
            d6s.push(a);
            d6s.push(b);
        }
        Self::new(d6s)
    }

    pub fn with_picks(mut self, picks: impl IntoIterator<Item = usize>) -> Self {
        self.picks = picks.into_iter().collect();
        self
    }

    pub fn with_fallback_seed(mut self, seed: u64) -> Self {
        self.fallback = SeededDice::new(seed);
        self
    }

    /// Append more 2d6 totals to the end of the d6 script.
    pub fn then_2d6(mut self, totals: impl IntoIterator<Item = u8>) -> Self {
        for total in totals {
            let (a, b) = split_2d6(total);
            self.d6s.push_back(a);
            self.d6s.push_back(b);
        }
        self
    }

    /// Append single d6 faces to the end of the script.
    pub fn then_d6(mut self, faces: impl IntoIterator<Item = u8>) -> Self {
        self.d6s.extend(faces);
        self
    }

    pub fn remaining(&self) -> usize {
        self.d6s.len()
    }
}

impl DiceSource for ScriptedDice {
    fn d6(&mut self) -> u8 {
        match self.d6s.pop_front() {
            Some(face) => face.clamp(1, 6),
            None => self.fallback.d6(),
        }
    }

    fn pick(&mut self, n: usize) -> usize {
        match self.picks.pop_front() {
            Some(i) => i.min(n - 1),
            None => self.fallback.pick(n),
        }
    }
}

fn split_2d6(total: u8) -> (u8, u8) {
    let total = total.clamp(2, 12);
    let first = (total - 1).min(6);
    (first, total - first)
}
