//! Shared primitive types used across the entire engine.

/// A stable, unique identifier for a unit in a battle.
pub type UnitId = String;

/// The canonical battle identifier.
pub type BattleId = String;

/// A force / team. Units with the same side never target each other.
pub type Side = u8;

/// Turn counter. Turn 1 is the first playable turn.
pub type Turn = u32;

/// Monotonic event sequence number. BattleStarted is always 0.
pub type Seq = u64;
