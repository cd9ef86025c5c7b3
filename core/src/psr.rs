//! Piloting skill rolls.
//!
//! Triggers are queued while a step resolves and drained once it is
//! done, so a unit that takes several hits in one phase rolls for each
//! trigger in order until it falls.

use crate::{
    abilities::{sum_hooks, PsrCategory, TraitHook},
    context::BattleContext,
    error::SimResult,
    event::EventKind,
    fall,
    unit::{ActuatorKind, Location, UnitCombatState},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PsrReason {
    DamageThreshold,
    GyroHit,
    GyroDestroyed,
    HipHit,
    LegActuatorHit,
    LegDestroyed,
    Kicked,
    KickMissed,
    Charged,
    Charging,
    Pushed,
    DfaTarget,
    DfaAttacker,
    DfaMissed,
    EnteredRubble,
    EnteredWater,
    RunningDamaged,
    JumpingDamaged,
    StandUp,
    Shutdown,
    PilotUnconscious,
    /// Registered by data rather than code.
    Custom(String),
}

impl PsrReason {
    pub fn key(&self) -> &str {
        match self {
            Self::DamageThreshold  => "damage_threshold",
            Self::GyroHit          => "gyro_hit",
            Self::GyroDestroyed    => "gyro_destroyed",
            Self::HipHit           => "hip_hit",
            Self::LegActuatorHit   => "leg_actuator_hit",
            Self::LegDestroyed     => "leg_destroyed",
            Self::Kicked           => "kicked",
            Self::KickMissed       => "kick_missed",
            Self::Charged          => "charged",
            Self::Charging         => "charging",
            Self::Pushed           => "pushed",
            Self::DfaTarget        => "dfa_target",
            Self::DfaAttacker      => "dfa_attacker",
            Self::DfaMissed        => "dfa_missed",
            Self::EnteredRubble    => "entered_rubble",
            Self::EnteredWater     => "entered_water",
            Self::RunningDamaged   => "running_damaged",
            Self::JumpingDamaged   => "jumping_damaged",
            Self::StandUp          => "stand_up",
            Self::Shutdown         => "shutdown",
            Self::PilotUnconscious => "pilot_unconscious",
            Self::Custom(key)      => key,
        }
    }

    /// Which trait adjustments apply.
    pub fn category(&self) -> PsrCategory {
        match self {
            Self::EnteredRubble
            | Self::EnteredWater
            | Self::RunningDamaged
            | Self::JumpingDamaged
            | Self::StandUp => PsrCategory::Terrain,
            Self::Kicked
            | Self::KickMissed
            | Self::Charged
            | Self::Charging
            | Self::Pushed
            | Self::DfaTarget
            | Self::DfaAttacker
            | Self::DfaMissed => PsrCategory::Physical,
            Self::DamageThreshold
            | Self::GyroHit
            | Self::GyroDestroyed
            | Self::HipHit
            | Self::LegActuatorHit
            | Self::LegDestroyed => PsrCategory::Damage,
            Self::Shutdown | Self::PilotUnconscious | Self::Custom(_) => PsrCategory::Any,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsrTrigger {
    pub reason:            PsrReason,
    /// On top of the registered base modifier.
    pub modifier:          i32,
    pub automatic_failure: bool,
    pub falls_on_failure:  bool,
    /// Levels fallen on failure.
    pub fall_height:       u32,
}

impl PsrTrigger {
    pub fn new(reason: PsrReason) -> Self {
        Self {
            reason,
            modifier: 0,
            automatic_failure: false,
            falls_on_failure: true,
            fall_height: 0,
        }
    }

    pub fn with_modifier(mut self, modifier: i32) -> Self {
        self.modifier = modifier;
        self
    }

    pub fn automatic(mut self) -> Self {
        self.automatic_failure = true;
        self
    }

    pub fn no_fall(mut self) -> Self {
        self.falls_on_failure = false;
        self
    }

    pub fn from_height(mut self, height: u32) -> Self {
        self.fall_height = height;
        self
    }
}

/// Base modifier for each trigger, by key. Unregistered keys roll at +0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PsrRegistry {
    modifiers: BTreeMap<String, i32>,
}

impl Default for PsrRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl PsrRegistry {
    pub fn empty() -> Self {
        Self { modifiers: BTreeMap::new() }
    }

    pub fn standard() -> Self {
        let mut r = Self::empty();
        r.register("damage_threshold", 1);
        r.register("kicked", 0);
        r.register("kick_missed", 0);
        r.register("charged", 2);
        r.register("charging", 2);
        r.register("pushed", 0);
        r.register("dfa_target", 2);
        r.register("dfa_attacker", 4);
        r.register("dfa_missed", 0);
        r.register("entered_rubble", 0);
        r.register("running_damaged", 0);
        r.register("jumping_damaged", 0);
        r.register("stand_up", 0);
        r
    }

    pub fn register(&mut self, key: &str, modifier: i32) {
        self.modifiers.insert(key.to_string(), modifier);
    }

    pub fn base(&self, key: &str) -> i32 {
        self.modifiers.get(key).copied().unwrap_or(0)
    }
}

/// Modifiers from the unit's own condition.
pub fn condition_modifier(unit: &UnitCombatState) -> i32 {
    let mut m = 3 * unit.damage.gyro_hits as i32;
    for leg in [Location::LeftLeg, Location::RightLeg] {
        if unit.location_destroyed(leg) {
            m += 5;
            continue;
        }
        for (kind, value) in [
            (ActuatorKind::Hip, 2),
            (ActuatorKind::UpperLeg, 1),
            (ActuatorKind::LowerLeg, 1),
            (ActuatorKind::Foot, 1),
        ] {
            if unit.damage.actuators.contains(&(leg, kind)) {
                m += value;
            }
        }
    }
    m += unit.pilot.wounds as i32;
    if unit.activity.fell {
        m += 1;
    }
    m
}

/// Full target number for a trigger.
pub fn psr_target(unit: &UnitCombatState, trigger: &PsrTrigger, registry: &PsrRegistry) -> i32 {
    let category = trigger.reason.category();
    let traits = sum_hooks(&unit.traits(), |h| match h {
        TraitHook::Psr { category: c, delta } if *c == category || *c == PsrCategory::Any => Some(*delta),
        _ => None,
    });
    unit.pilot.piloting as i32
        + registry.base(trigger.reason.key())
        + trigger.modifier
        + condition_modifier(unit)
        + traits
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsrOutcome {
    pub target: i32,
    pub roll:   Option<u8>,
    pub passed: bool,
    pub fell:   bool,
}

/// Roll one PSR now. A failure knocks the unit over unless the trigger
/// says otherwise.
pub fn resolve_psr(ctx: &mut BattleContext, unit_id: &str, trigger: &PsrTrigger) -> SimResult<PsrOutcome> {
    let unit = ctx.unit(unit_id)?;
    let target = psr_target(unit, trigger, &ctx.config.psr);
    let automatic = trigger.automatic_failure
        || !unit.pilot.conscious
        || unit.shutdown
        || unit.gyro_destroyed()
        || target > 12;
    let already_prone = unit.prone;

    let roll = if automatic { None } else { Some(ctx.roll_2d6()) };
    let passed = roll.is_some_and(|r| i32::from(r) >= target);
    ctx.emit(EventKind::PsrResolved {
        unit: unit_id.to_string(),
        reason: trigger.reason.key().to_string(),
        target,
        roll,
        passed,
        automatic,
    })?;
    log::debug!("{unit_id} PSR {} target {target} roll {roll:?}: {passed}", trigger.reason.key());

    let mut fell = false;
    if !passed && trigger.falls_on_failure && !already_prone {
        fall::resolve_fall(ctx, unit_id, trigger.fall_height)?;
        fell = true;
    }
    Ok(PsrOutcome { target, roll, passed, fell })
}

/// Resolve every queued PSR in order. Once a unit falls its remaining
/// rolls are dropped; prone units only roll to stand.
pub fn drain_queue(ctx: &mut BattleContext) -> SimResult<()> {
    let mut fallen: BTreeSet<String> = BTreeSet::new();
    while !ctx.psr_queue.is_empty() {
        let queued = ctx.psr_queue.remove(0);
        let unit = ctx.unit(&queued.unit)?;
        if !unit.is_active() || fallen.contains(&queued.unit) {
            continue;
        }
        if unit.prone && queued.trigger.reason != PsrReason::StandUp {
            continue;
        }
        let outcome = resolve_psr(ctx, &queued.unit, &queued.trigger)?;
        if outcome.fell {
            fallen.insert(queued.unit);
        }
    }
    Ok(())
}

/// Queue the damage-threshold roll for every standing unit that took
/// enough damage this phase.
pub fn queue_damage_threshold(ctx: &mut BattleContext) {
    let threshold = ctx.config.rules.damage_psr_threshold;
    let due: Vec<String> = ctx
        .state
        .units
        .values()
        .filter(|u| u.is_active() && !u.prone && u.activity.damage_this_phase >= threshold)
        .map(|u| u.id.clone())
        .collect();
    for id in due {
        ctx.queue_psr(&id, PsrTrigger::new(PsrReason::DamageThreshold));
    }
}
