//! Cluster hits table.
//!
//! Modifier precedence: every cluster roll modifier (Artemis, munition,
//! pilot ability, quirks) is summed first and applied once to the
//! natural 2d6 roll, then the result is clamped to 2-12. Jams are
//! checked on the natural to-hit roll before any of this happens.

use crate::{event::ClusterRoll, rng::DiceSource};

/// Hits by rack size (2-20) and modified roll (2-12).
const TABLE: [[u32; 11]; 19] = [
    [1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2],
    [1, 1, 1, 2, 2, 2, 2, 2, 3, 3, 3],
    [1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4],
    [1, 2, 2, 3, 3, 3, 3, 4, 4, 5, 5],
    [2, 2, 3, 3, 4, 4, 4, 5, 5, 6, 6],
    [2, 2, 3, 4, 4, 4, 4, 6, 6, 7, 7],
    [3, 3, 4, 4, 5, 5, 5, 6, 6, 8, 8],
    [3, 3, 4, 5, 5, 5, 5, 7, 7, 9, 9],
    [3, 3, 4, 6, 6, 6, 6, 8, 8, 10, 10],
    [4, 4, 5, 7, 7, 7, 7, 9, 9, 11, 11],
    [4, 4, 5, 8, 8, 8, 8, 10, 10, 12, 12],
    [4, 4, 5, 8, 8, 8, 8, 11, 11, 13, 13],
    [5, 5, 6, 9, 9, 9, 9, 11, 11, 14, 14],
    [5, 5, 6, 9, 9, 9, 9, 12, 12, 15, 15],
    [5, 5, 7, 10, 10, 10, 10, 13, 13, 16, 16],
    [5, 5, 7, 10, 10, 10, 10, 14, 14, 17, 17],
    [6, 6, 8, 11, 11, 11, 11, 14, 14, 18, 18],
    [6, 6, 8, 11, 11, 11, 11, 15, 15, 19, 19],
    [6, 6, 9, 12, 12, 12, 12, 16, 16, 20, 20],
];

/// Hits for a column and an already-modified roll.
pub fn cluster_hits(column: u32, roll: i32) -> u32 {
    if column <= 1 {
        return column;
    }
    let column = column.min(20);
    let roll = roll.clamp(2, 12);
    TABLE[(column - 2) as usize][(roll - 2) as usize]
}

/// Roll on the cluster table with the combined modifier.
pub fn roll_cluster(column: u32, modifier: i32, dice: &mut dyn DiceSource) -> ClusterRoll {
    let natural = dice.roll_2d6();
    let hits = cluster_hits(column, natural as i32 + modifier);
    log::debug!("cluster roll {natural}{modifier:+} on column {column}: {hits} hits");
    ClusterRoll {
        natural,
        modifier,
        column,
        hits,
    }
}

/// Split missile hits into damage groups.
pub fn damage_groups(hits: u32, damage_per_missile: u32, group: u32) -> Vec<u32> {
    let group = group.max(1);
    let mut groups = Vec::new();
    let mut left = hits;
    while left > 0 {
        let n = left.min(group);
        groups.push(n * damage_per_missile);
        left -= n;
    }
    groups
}
