use crate::{
    hex::{Facing, HexCoord, Twist},
    types::UnitId,
    unit::Location,
};
use serde::{Deserialize, Serialize};

/// Everything a commander can submit to a battle.
/// Variants are added over time; never removed or reordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Declaration {
    // ── Movement phase ────────────────────────────
    Move {
        unit:  UnitId,
        order: MovementOrder,
    },

    // ── Weapon attack phase ───────────────────────
    TorsoTwist {
        unit:  UnitId,
        twist: Twist,
    },
    WeaponAttack(AttackDeclaration),

    // ── Physical attack phase ─────────────────────
    PhysicalAttack(PhysicalDeclaration),
}

impl Declaration {
    pub fn unit(&self) -> &str {
        match self {
            Self::Move { unit, .. } | Self::TorsoTwist { unit, .. } => unit,
            Self::WeaponAttack(a) => &a.attacker,
            Self::PhysicalAttack(p) => &p.attacker,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementMode {
    Stationary,
    Walk,
    Run,
    Jump,
    Crawl,
    StandUp,
    Withdraw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveStep {
    Forward,
    /// Walking and crawling only.
    Backward,
    TurnLeft,
    TurnRight,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MovementOrder {
    Stationary,
    Walk { steps: Vec<MoveStep> },
    Run { steps: Vec<MoveStep> },
    Crawl { steps: Vec<MoveStep> },
    Jump { destination: HexCoord, facing: Facing },
    StandUp { facing: Facing },
    Withdraw,
}

impl MovementOrder {
    pub fn mode(&self) -> MovementMode {
        match self {
            Self::Stationary => MovementMode::Stationary,
            Self::Walk { .. } => MovementMode::Walk,
            Self::Run { .. } => MovementMode::Run,
            Self::Crawl { .. } => MovementMode::Crawl,
            Self::Jump { .. } => MovementMode::Jump,
            Self::StandUp { .. } => MovementMode::StandUp,
            Self::Withdraw => MovementMode::Withdraw,
        }
    }
}

/// Aimed attack. High rolls on the punch table, Low on the kick table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalledShot {
    High,
    Low,
}

/// One weapon fired at one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackDeclaration {
    pub attacker:    UnitId,
    pub target:      UnitId,
    /// Index into the attacker's weapon list.
    pub weapon:      usize,
    /// Shots per turn for ultra and rotary autocannons.
    #[serde(default = "default_rate")]
    pub rate:        u8,
    #[serde(default)]
    pub called_shot: Option<CalledShot>,
}

fn default_rate() -> u8 {
    1
}

impl AttackDeclaration {
    pub fn new(attacker: &str, target: &str, weapon: usize) -> Self {
        Self {
            attacker:    attacker.to_string(),
            target:      target.to_string(),
            weapon,
            rate:        1,
            called_shot: None,
        }
    }

    pub fn at_rate(mut self, rate: u8) -> Self {
        self.rate = rate;
        self
    }

    pub fn called(mut self, shot: CalledShot) -> Self {
        self.called_shot = Some(shot);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhysicalKind {
    Punch,
    Kick,
    Charge,
    DeathFromAbove,
    Push,
    Hatchet,
    Sword,
    Mace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalDeclaration {
    pub attacker: UnitId,
    pub target:   UnitId,
    pub kind:     PhysicalKind,
    /// Arm for punches and melee weapons, leg for kicks.
    #[serde(default)]
    pub limb:     Option<Location>,
}

impl PhysicalDeclaration {
    pub fn new(attacker: &str, target: &str, kind: PhysicalKind, limb: Option<Location>) -> Self {
        Self {
            attacker: attacker.to_string(),
            target:   target.to_string(),
            kind,
            limb,
        }
    }
}
