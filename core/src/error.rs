use crate::{
    event::GameEvent,
    phase::Phase,
    types::{Seq, Side, UnitId},
    unit::{ActuatorKind, Location},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    /// Rejected before any dice were rolled. State is unchanged.
    #[error("Illegal action by {unit}: {reason}")]
    IllegalAction { unit: UnitId, reason: IllegalAction },

    /// A resolver produced an impossible state. Fatal to the battle.
    #[error("State invariant violated at seq {seq}: {detail}")]
    StateInvariantViolation {
        detail: String,
        seq:    Seq,
        log:    Vec<GameEvent>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SimError {
    pub fn illegal(unit: impl Into<UnitId>, reason: IllegalAction) -> Self {
        Self::IllegalAction { unit: unit.into(), reason }
    }

    pub fn invariant(seq: Seq, detail: impl Into<String>) -> Self {
        Self::StateInvariantViolation {
            detail: detail.into(),
            seq,
            log: Vec::new(),
        }
    }

    pub fn config(detail: impl Into<String>) -> Self {
        Self::Configuration(detail.into())
    }

    /// The rejection reason, if this is an IllegalAction.
    pub fn illegal_reason(&self) -> Option<&IllegalAction> {
        match self {
            Self::IllegalAction { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::StateInvariantViolation { .. })
    }
}

/// Why a declaration or resolver call was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IllegalAction {
    #[error("no ammunition left for weapon {weapon}")]
    NoAmmo { weapon: usize },

    #[error("weapon {weapon} is destroyed")]
    WeaponDestroyed { weapon: usize },

    #[error("weapon {weapon} is jammed")]
    WeaponJammed { weapon: usize },

    #[error("weapon {weapon} has already been declared this turn")]
    WeaponAlreadyDeclared { weapon: usize },

    #[error("no weapon with index {weapon}")]
    UnknownWeapon { weapon: usize },

    #[error("rate of fire {rate} is not available for weapon {weapon}")]
    InvalidRate { weapon: usize, rate: u8 },

    #[error("{actuator:?} actuator in {location:?} is destroyed")]
    ActuatorDestroyed { location: Location, actuator: ActuatorKind },

    #[error("{location:?} is destroyed")]
    LocationDestroyed { location: Location },

    #[error("{location:?} already fired a weapon this turn")]
    LimbFiredThisTurn { location: Location },

    #[error("{location:?} has already made a physical attack this turn")]
    LimbAlreadyAttacked { location: Location },

    #[error("unit is shut down")]
    ShutDown,

    #[error("pilot is unconscious")]
    PilotUnconscious,

    #[error("unit is destroyed")]
    UnitDestroyed,

    #[error("unit has withdrawn")]
    Withdrawn,

    #[error("unknown unit {0}")]
    UnknownUnit(UnitId),

    #[error("out of turn: side {expected} activates next")]
    OutOfTurn { expected: Side },

    #[error("{action} is not allowed during the {phase:?} phase")]
    WrongPhase { action: &'static str, phase: Phase },

    #[error("unit has already locked its movement this turn")]
    AlreadyMoved,

    #[error("target {0} is on the same side")]
    FriendlyTarget(UnitId),

    #[error("target out of range at {distance} hexes")]
    OutOfRange { distance: u32 },

    #[error("target is outside the weapon's firing arc")]
    OutOfArc,

    #[error("line of sight is blocked")]
    NoLineOfSight,

    #[error("to-hit target {target} cannot be rolled on 2d6")]
    ImpossibleShot { target: i32 },

    #[error("not enough movement points: need {needed}, have {available}")]
    InsufficientMovement { needed: u32, available: u32 },

    #[error("illegal path: {0}")]
    IllegalPath(String),

    #[error("unit is prone")]
    Prone,

    #[error("unit is not prone")]
    NotProne,

    #[error("target must be adjacent")]
    NotAdjacent,

    #[error("{0}")]
    Forbidden(&'static str),
}

pub type SimResult<T> = Result<T, SimError>;
