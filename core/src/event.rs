//! The event log: every state change in a battle.
//!
//! RULE: Nothing mutates battle state except folding a GameEvent
//! through `BattleState::apply`. Resolvers emit events; they never
//! write to UnitCombatState directly.

use crate::{
    declaration::{CalledShot, MovementMode, PhysicalKind},
    hex::{Facing, HexCoord, Twist},
    phase::Phase,
    to_hit::ToHitBreakdown,
    types::{BattleId, Seq, Side, Turn, UnitId},
    unit::{DestructionCause, Location, SlotContent, UnitCombatState},
};
use serde::{Deserialize, Serialize};

/// One entry in the append-only log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub seq:   Seq,
    pub turn:  Turn,
    pub phase: Phase,
    pub kind:  EventKind,
}

/// What was attacked with, for audit lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "attack", rename_all = "snake_case")]
pub enum AttackRef {
    Weapon { weapon: usize },
    Physical { kind: PhysicalKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRoll {
    pub natural:  u8,
    pub modifier: i32,
    pub column:   u32,
    pub hits:     u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageKind {
    /// A single hit from one weapon. Subject to the head cap.
    Standard,
    /// One group of a cluster or multi-shot attack, or of a charge.
    Cluster,
    /// A punch, kick, push or melee weapon blow, landed in one piece.
    Physical,
    Fall,
    AmmoExplosion,
}

impl DamageKind {
    /// Single hits that the head cap limits.
    pub fn head_capped(&self) -> bool {
        matches!(self, Self::Standard | Self::Physical)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Only one side has units left on the field.
    Annihilation,
    /// Neither side has units left.
    MutualDestruction,
    TurnLimit,
}

/// Every event emitted during a battle.
/// Variants are added over time; never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ── Battle and turn structure ──────────────────
    BattleStarted {
        battle_id:  BattleId,
        seed:       u64,
        turn_limit: u32,
        units:      Vec<UnitCombatState>,
    },
    PhaseChanged {
        from: Phase,
        to:   Phase,
    },
    TurnAdvanced {
        turn: Turn,
    },
    InitiativeRolled {
        rolls:   Vec<(Side, u8)>,
        rerolls: u32,
        winner:  Side,
        order:   Vec<Side>,
    },
    BattleEnded {
        winner: Option<Side>,
        reason: EndReason,
    },

    // ── Movement ───────────────────────────────────
    UnitMoved {
        unit:   UnitId,
        mode:   MovementMode,
        path:   Vec<HexCoord>,
        facing: Facing,
        hexes:  u32,
        mp:     u32,
    },
    ActivationEnded {
        unit: UnitId,
        side: Side,
    },
    /// A movement slot whose side has nobody left who can move.
    ActivationPassed {
        side: Side,
    },
    UnitStoodUp {
        unit:   UnitId,
        facing: Facing,
    },
    UnitWithdrew {
        unit: UnitId,
    },
    TorsoTwisted {
        unit:  UnitId,
        twist: Twist,
    },

    // ── Attacks ────────────────────────────────────
    AttackDeclared {
        attacker:    UnitId,
        target:      UnitId,
        weapon:      usize,
        rate:        u8,
        primary:     bool,
        called_shot: Option<CalledShot>,
    },
    PhysicalAttackDeclared {
        attacker: UnitId,
        target:   UnitId,
        kind:     PhysicalKind,
        limb:     Option<Location>,
    },
    WeaponFired {
        unit:   UnitId,
        weapon: usize,
        rate:   u8,
        heat:   u32,
    },
    AmmoConsumed {
        unit:   UnitId,
        bin:    usize,
        rounds: u32,
    },
    WeaponJammed {
        unit:   UnitId,
        weapon: usize,
    },
    /// A revealed attack that could no longer be made when its turn to
    /// resolve came. No dice were rolled for it.
    AttackCancelled {
        attacker: UnitId,
        target:   UnitId,
        weapon:   usize,
        reason:   String,
    },
    AttackResolved {
        attacker: UnitId,
        target:   UnitId,
        attack:   AttackRef,
        to_hit:   ToHitBreakdown,
        roll:     u8,
        hit:      bool,
        cluster:  Option<ClusterRoll>,
    },
    HitAbsorbedByCover {
        unit:     UnitId,
        location: Location,
        damage:   u32,
    },

    // ── Damage ─────────────────────────────────────
    DamageApplied {
        unit:      UnitId,
        location:  Location,
        rear:      bool,
        armor:     u32,
        structure: u32,
        kind:      DamageKind,
    },
    LocationDestroyed {
        unit:     UnitId,
        location: Location,
    },
    CriticalHitRolled {
        unit:     UnitId,
        location: Location,
        roll:     u8,
        criticals: u8,
        through_armor: bool,
    },
    ComponentDamaged {
        unit:      UnitId,
        location:  Location,
        slot:      usize,
        component: SlotContent,
    },
    AmmoExploded {
        unit:     UnitId,
        bin:      usize,
        location: Location,
        damage:   u32,
    },
    UnitDestroyed {
        unit:  UnitId,
        cause: DestructionCause,
    },

    // ── Heat ───────────────────────────────────────
    HeatChanged {
        unit:       UnitId,
        from:       u32,
        to:         u32,
        generated:  u32,
        dissipated: u32,
    },
    ShutdownTriggered {
        unit:      UnitId,
        heat:      u32,
        automatic: bool,
    },
    ShutdownAvoided {
        unit:   UnitId,
        roll:   u8,
        target: u8,
    },
    StartupResolved {
        unit:    UnitId,
        roll:    Option<u8>,
        target:  Option<u8>,
        success: bool,
    },

    // ── Piloting ───────────────────────────────────
    PsrResolved {
        unit:      UnitId,
        reason:    String,
        target:    i32,
        roll:      Option<u8>,
        passed:    bool,
        automatic: bool,
    },
    UnitFell {
        unit:   UnitId,
        facing: Facing,
        height: u32,
        damage: u32,
    },
    UnitDisplaced {
        unit: UnitId,
        from: HexCoord,
        to:   HexCoord,
    },
    PilotDamaged {
        unit:   UnitId,
        amount: u32,
        wounds: u32,
        source: String,
    },
    ConsciousnessRolled {
        unit:      UnitId,
        target:    i32,
        roll:      u8,
        conscious: bool,
    },
}

impl EventKind {
    /// Stable name used for the event_type column in event_log.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BattleStarted { .. }          => "battle_started",
            Self::PhaseChanged { .. }           => "phase_changed",
            Self::TurnAdvanced { .. }           => "turn_advanced",
            Self::InitiativeRolled { .. }       => "initiative_rolled",
            Self::BattleEnded { .. }            => "battle_ended",
            Self::UnitMoved { .. }              => "unit_moved",
            Self::ActivationEnded { .. }        => "activation_ended",
            Self::ActivationPassed { .. }       => "activation_passed",
            Self::UnitStoodUp { .. }            => "unit_stood_up",
            Self::UnitWithdrew { .. }           => "unit_withdrew",
            Self::TorsoTwisted { .. }           => "torso_twisted",
            Self::AttackDeclared { .. }         => "attack_declared",
            Self::PhysicalAttackDeclared { .. } => "physical_attack_declared",
            Self::WeaponFired { .. }            => "weapon_fired",
            Self::AmmoConsumed { .. }           => "ammo_consumed",
            Self::WeaponJammed { .. }           => "weapon_jammed",
            Self::AttackCancelled { .. }        => "attack_cancelled",
            Self::AttackResolved { .. }         => "attack_resolved",
            Self::HitAbsorbedByCover { .. }     => "hit_absorbed_by_cover",
            Self::DamageApplied { .. }          => "damage_applied",
            Self::LocationDestroyed { .. }      => "location_destroyed",
            Self::CriticalHitRolled { .. }      => "critical_hit_rolled",
            Self::ComponentDamaged { .. }       => "component_damaged",
            Self::AmmoExploded { .. }           => "ammo_exploded",
            Self::UnitDestroyed { .. }          => "unit_destroyed",
            Self::HeatChanged { .. }            => "heat_changed",
            Self::ShutdownTriggered { .. }      => "shutdown_triggered",
            Self::ShutdownAvoided { .. }        => "shutdown_avoided",
            Self::StartupResolved { .. }        => "startup_resolved",
            Self::PsrResolved { .. }            => "psr_resolved",
            Self::UnitFell { .. }               => "unit_fell",
            Self::UnitDisplaced { .. }          => "unit_displaced",
            Self::PilotDamaged { .. }           => "pilot_damaged",
            Self::ConsciousnessRolled { .. }    => "consciousness_rolled",
        }
    }

    /// The unit this event is about, if any.
    pub fn unit(&self) -> Option<&str> {
        match self {
            Self::UnitMoved { unit, .. }
            | Self::ActivationEnded { unit, .. }
            | Self::UnitStoodUp { unit, .. }
            | Self::UnitWithdrew { unit }
            | Self::TorsoTwisted { unit, .. }
            | Self::WeaponFired { unit, .. }
            | Self::AmmoConsumed { unit, .. }
            | Self::WeaponJammed { unit, .. }
            | Self::HitAbsorbedByCover { unit, .. }
            | Self::DamageApplied { unit, .. }
            | Self::LocationDestroyed { unit, .. }
            | Self::CriticalHitRolled { unit, .. }
            | Self::ComponentDamaged { unit, .. }
            | Self::AmmoExploded { unit, .. }
            | Self::UnitDestroyed { unit, .. }
            | Self::HeatChanged { unit, .. }
            | Self::ShutdownTriggered { unit, .. }
            | Self::ShutdownAvoided { unit, .. }
            | Self::StartupResolved { unit, .. }
            | Self::PsrResolved { unit, .. }
            | Self::UnitFell { unit, .. }
            | Self::UnitDisplaced { unit, .. }
            | Self::PilotDamaged { unit, .. }
            | Self::ConsciousnessRolled { unit, .. } => Some(unit),
            Self::AttackDeclared { attacker, .. }
            | Self::PhysicalAttackDeclared { attacker, .. }
            | Self::AttackCancelled { attacker, .. }
            | Self::AttackResolved { attacker, .. } => Some(attacker),
            _ => None,
        }
    }
}

/// A persisted row of the event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:         Option<i64>,
    pub battle_id:  BattleId,
    pub seq:        Seq,
    pub turn:       Turn,
    pub phase:      Phase,
    pub event_type: String,
    pub payload:    String,
}

impl EventLogEntry {
    pub fn from_event(battle_id: &str, event: &GameEvent) -> serde_json::Result<Self> {
        Ok(Self {
            id:         None,
            battle_id:  battle_id.to_string(),
            seq:        event.seq,
            turn:       event.turn,
            phase:      event.phase,
            event_type: event.kind.name().to_string(),
            payload:    serde_json::to_string(&event.kind)?,
        })
    }

    pub fn to_event(&self) -> serde_json::Result<GameEvent> {
        Ok(GameEvent {
            seq:   self.seq,
            turn:  self.turn,
            phase: self.phase,
            kind:  serde_json::from_str(&self.payload)?,
        })
    }
}
