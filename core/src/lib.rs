//! mechcombat-core: deterministic turn-based mech combat resolution.
//!
//! A battle is an append-only event log. Resolvers emit events through a
//! BattleContext, `BattleState::apply` folds them, and `replay` rebuilds
//! the same state from the log alone.

pub mod abilities;
pub mod ammo;
pub mod arc;
pub mod cluster;
pub mod commander;
pub mod config;
pub mod context;
pub mod critical;
pub mod damage;
pub mod declaration;
pub mod engine;
pub mod error;
pub mod event;
pub mod fall;
pub mod heat;
pub mod hex;
pub mod hit_location;
pub mod movement;
pub mod phase;
pub mod physical;
pub mod pilot;
pub mod psr;
pub mod rng;
pub mod state;
pub mod store;
pub mod terrain;
pub mod to_hit;
pub mod types;
pub mod unit;
pub mod weapon_attack;

pub use config::BattleConfig;
pub use declaration::Declaration;
pub use engine::{run_to_completion, Battle, Outcome};
pub use error::{IllegalAction, SimError, SimResult};
pub use event::{EventKind, GameEvent};
pub use state::{replay, BattleState};
pub use unit::UnitSpec;
