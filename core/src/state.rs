//! Battle state: the derived cache folded from the event log.
//!
//! RULE: `apply` is the only function that mutates battle state.
//! The live battle and `replay` both go through it, so a replayed
//! state is always equal to the live one.

use crate::{
    error::{SimError, SimResult},
    event::{EndReason, EventKind, GameEvent},
    hex::Twist,
    phase::TurnClock,
    types::{BattleId, Seq, Side, UnitId},
    unit::{
        DestructionCause, Location, MovementRecord, SlotContent,
        TurnActivity, UnitCombatState,
    },
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleOutcome {
    pub winner: Option<Side>,
    pub reason: EndReason,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BattleState {
    pub battle_id:  BattleId,
    pub seed:       u64,
    pub turn_limit: u32,
    pub clock:      TurnClock,
    pub units:      BTreeMap<UnitId, UnitCombatState>,
    pub outcome:    Option<BattleOutcome>,
    /// Sequence number of the last folded event.
    pub last_seq:   Option<Seq>,
}

impl BattleState {
    pub fn unit(&self, id: &str) -> Option<&UnitCombatState> {
        self.units.get(id)
    }

    pub fn sides(&self) -> BTreeSet<Side> {
        self.units.values().map(|u| u.side).collect()
    }

    /// Active units of a side, in id order.
    pub fn active_units(&self, side: Side) -> impl Iterator<Item = &UnitCombatState> {
        self.units.values().filter(move |u| u.side == side && u.is_active())
    }

    pub fn unit_at(&self, hex: crate::hex::HexCoord) -> Option<&UnitCombatState> {
        self.units.values().find(|u| u.is_active() && u.position == hex)
    }

    pub fn next_seq(&self) -> Seq {
        self.last_seq.map_or(0, |s| s + 1)
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    /// Fold one event into the state.
    pub fn apply(&mut self, event: &GameEvent) -> SimResult<()> {
        let seq = event.seq;
        if seq != self.next_seq() {
            return Err(SimError::invariant(
                seq,
                format!("event out of sequence: expected {}", self.next_seq()),
            ));
        }
        if self.last_seq.is_none() && !matches!(event.kind, EventKind::BattleStarted { .. }) {
            return Err(SimError::invariant(seq, "log does not begin with BattleStarted"));
        }

        match &event.kind {
            EventKind::BattleStarted { battle_id, seed, turn_limit, units } => {
                if self.last_seq.is_some() {
                    return Err(SimError::invariant(seq, "BattleStarted after start"));
                }
                self.battle_id = battle_id.clone();
                self.seed = *seed;
                self.turn_limit = *turn_limit;
                self.clock = TurnClock::new();
                self.units = units.iter().map(|u| (u.id.clone(), u.clone())).collect();
            }
            EventKind::PhaseChanged { from, to } => {
                if self.clock.phase != *from {
                    return Err(SimError::invariant(
                        seq,
                        format!("phase change from {from:?} while in {:?}", self.clock.phase),
                    ));
                }
                self.clock.phase = *to;
                for unit in self.units.values_mut() {
                    unit.activity.damage_this_phase = 0;
                }
            }
            EventKind::TurnAdvanced { turn } => {
                self.clock.turn = *turn;
                self.clock.movement_order.clear();
                self.clock.next_mover = 0;
                for unit in self.units.values_mut() {
                    unit.activity = TurnActivity::default();
                    unit.twist = Twist::None;
                }
            }
            EventKind::InitiativeRolled { order, .. } => {
                self.clock.movement_order = order.clone();
                self.clock.next_mover = 0;
            }
            EventKind::BattleEnded { winner, reason } => {
                self.outcome = Some(BattleOutcome { winner: *winner, reason: *reason });
            }

            EventKind::UnitMoved { unit, mode, path, facing, hexes, mp } => {
                let u = unit_mut(&mut self.units, unit, seq)?;
                if let Some(last) = path.last() {
                    u.position = *last;
                }
                u.facing = *facing;
                let record = u.activity.movement.get_or_insert(MovementRecord {
                    mode:     *mode,
                    hexes:    0,
                    mp_spent: 0,
                });
                record.mode = *mode;
                record.hexes += hexes;
                record.mp_spent += mp;
            }
            EventKind::ActivationEnded { unit, side } => {
                if self.clock.side_to_move() != Some(*side) {
                    return Err(SimError::invariant(seq, format!("side {side} moved out of turn")));
                }
                self.clock.next_mover += 1;
                let u = unit_mut(&mut self.units, unit, seq)?;
                u.activity.movement.get_or_insert(MovementRecord {
                    mode:     crate::declaration::MovementMode::Stationary,
                    hexes:    0,
                    mp_spent: 0,
                });
            }
            EventKind::ActivationPassed { .. } => {
                self.clock.next_mover += 1;
            }
            EventKind::UnitStoodUp { unit, facing } => {
                let u = unit_mut(&mut self.units, unit, seq)?;
                u.prone = false;
                u.facing = *facing;
            }
            EventKind::UnitWithdrew { unit } => {
                unit_mut(&mut self.units, unit, seq)?.withdrawn = true;
            }
            EventKind::TorsoTwisted { unit, twist } => {
                unit_mut(&mut self.units, unit, seq)?.twist = *twist;
            }

            EventKind::AttackDeclared { .. }
            | EventKind::AttackCancelled { .. }
            | EventKind::AttackResolved { .. } => {}
            EventKind::PhysicalAttackDeclared { attacker, limb, .. } => {
                let u = unit_mut(&mut self.units, attacker, seq)?;
                match limb {
                    Some(l) => {
                        u.activity.physical_limbs.insert(*l);
                    }
                    None => u.activity.physical_body = true,
                }
            }
            EventKind::WeaponFired { unit, weapon, heat, .. } => {
                let u = unit_mut(&mut self.units, unit, seq)?;
                let location = u
                    .weapons
                    .get(*weapon)
                    .map(|w| w.location)
                    .ok_or_else(|| SimError::invariant(seq, format!("{unit} has no weapon {weapon}")))?;
                u.activity.weapons_fired.insert(*weapon);
                u.activity.fired_locations.insert(location);
                u.activity.weapon_heat += heat;
            }
            EventKind::AmmoConsumed { unit, bin, rounds } => {
                let u = unit_mut(&mut self.units, unit, seq)?;
                let b = u
                    .ammo
                    .get_mut(*bin)
                    .ok_or_else(|| SimError::invariant(seq, format!("{unit} has no ammo bin {bin}")))?;
                if b.destroyed || b.rounds < *rounds {
                    return Err(SimError::invariant(
                        seq,
                        format!("{unit} bin {bin} cannot supply {rounds} rounds"),
                    ));
                }
                b.rounds -= rounds;
            }
            EventKind::WeaponJammed { unit, weapon } => {
                let u = unit_mut(&mut self.units, unit, seq)?;
                let w = u
                    .weapons
                    .get_mut(*weapon)
                    .ok_or_else(|| SimError::invariant(seq, format!("{unit} has no weapon {weapon}")))?;
                w.jammed = true;
            }
            EventKind::HitAbsorbedByCover { .. } => {}

            EventKind::DamageApplied { unit, location, rear, armor, structure, .. } => {
                let u = unit_mut(&mut self.units, unit, seq)?;
                if u.is_destroyed() {
                    return Err(SimError::invariant(seq, format!("damage applied to destroyed unit {unit}")));
                }
                let loc = location_mut(u, *location, seq)?;
                let current = if *rear { &mut loc.rear_armor } else { &mut loc.armor };
                *current = current.checked_sub(*armor).ok_or_else(|| {
                    SimError::invariant(seq, format!("armor below zero on {unit} {location}"))
                })?;
                loc.structure = loc.structure.checked_sub(*structure).ok_or_else(|| {
                    SimError::invariant(seq, format!("structure below zero on {unit} {location}"))
                })?;
                u.activity.damage_this_phase += armor + structure;
            }
            EventKind::LocationDestroyed { unit, location } => {
                let u = unit_mut(&mut self.units, unit, seq)?;
                destroy_location(u, *location, seq)?;
            }
            EventKind::CriticalHitRolled { .. } => {}
            EventKind::ComponentDamaged { unit, location, slot, component } => {
                let u = unit_mut(&mut self.units, unit, seq)?;
                damage_component(u, *location, *slot, *component, seq)?;
            }
            EventKind::AmmoExploded { unit, bin, .. } => {
                let u = unit_mut(&mut self.units, unit, seq)?;
                let b = u
                    .ammo
                    .get_mut(*bin)
                    .ok_or_else(|| SimError::invariant(seq, format!("{unit} has no ammo bin {bin}")))?;
                b.rounds = 0;
                b.destroyed = true;
            }
            EventKind::UnitDestroyed { unit, cause } => {
                let u = unit_mut(&mut self.units, unit, seq)?;
                if u.destroyed.is_none() {
                    u.destroyed = Some(*cause);
                }
                if matches!(cause, DestructionCause::PilotKilled | DestructionCause::CockpitDestroyed | DestructionCause::HeadDestroyed) {
                    u.pilot.killed = true;
                    u.pilot.conscious = false;
                }
            }

            EventKind::HeatChanged { unit, from, to, .. } => {
                let u = unit_mut(&mut self.units, unit, seq)?;
                if u.heat != *from {
                    return Err(SimError::invariant(
                        seq,
                        format!("{unit} heat is {} but event starts from {from}", u.heat),
                    ));
                }
                u.heat = *to;
            }
            EventKind::ShutdownTriggered { unit, .. } => {
                unit_mut(&mut self.units, unit, seq)?.shutdown = true;
            }
            EventKind::ShutdownAvoided { .. } => {}
            EventKind::StartupResolved { unit, success, .. } => {
                if *success {
                    unit_mut(&mut self.units, unit, seq)?.shutdown = false;
                }
            }

            EventKind::PsrResolved { .. } => {}
            EventKind::UnitFell { unit, facing, .. } => {
                let u = unit_mut(&mut self.units, unit, seq)?;
                u.prone = true;
                u.facing = *facing;
                u.twist = Twist::None;
                u.activity.fell = true;
            }
            EventKind::UnitDisplaced { unit, from, to } => {
                let u = unit_mut(&mut self.units, unit, seq)?;
                if u.position != *from {
                    return Err(SimError::invariant(seq, format!("{unit} displaced from a hex it is not in")));
                }
                u.position = *to;
            }
            EventKind::PilotDamaged { unit, wounds, .. } => {
                let u = unit_mut(&mut self.units, unit, seq)?;
                if *wounds < u.pilot.wounds {
                    return Err(SimError::invariant(seq, format!("{unit} pilot wounds decreased")));
                }
                u.pilot.wounds = *wounds;
                if *wounds >= 6 {
                    u.pilot.killed = true;
                    u.pilot.conscious = false;
                }
            }
            EventKind::ConsciousnessRolled { unit, conscious, .. } => {
                let u = unit_mut(&mut self.units, unit, seq)?;
                u.pilot.conscious = *conscious && !u.pilot.killed;
            }
        }

        self.last_seq = Some(seq);
        Ok(())
    }
}

/// Rebuild battle state from a complete event log.
pub fn replay(events: &[GameEvent]) -> SimResult<BattleState> {
    let mut state = BattleState::default();
    for event in events {
        state.apply(event).map_err(|e| match e {
            SimError::StateInvariantViolation { detail, seq, .. } => SimError::StateInvariantViolation {
                detail,
                seq,
                log: events.to_vec(),
            },
            other => other,
        })?;
    }
    Ok(state)
}

fn unit_mut<'a>(
    units: &'a mut BTreeMap<UnitId, UnitCombatState>,
    id: &str,
    seq: Seq,
) -> SimResult<&'a mut UnitCombatState> {
    units
        .get_mut(id)
        .ok_or_else(|| SimError::invariant(seq, format!("event references unknown unit {id}")))
}

fn location_mut(
    unit: &mut UnitCombatState,
    location: Location,
    seq: Seq,
) -> SimResult<&mut crate::unit::LocationState> {
    let id = unit.id.clone();
    unit.location_mut(location)
        .ok_or_else(|| SimError::invariant(seq, format!("{id} has no {location}")))
}

/// Mark a location lost along with everything mounted in it.
fn destroy_location(unit: &mut UnitCombatState, location: Location, seq: Seq) -> SimResult<()> {
    let loc = location_mut(unit, location, seq)?;
    if loc.destroyed {
        return Ok(());
    }
    loc.destroyed = true;
    loc.armor = 0;
    loc.rear_armor = 0;
    loc.structure = 0;

    let mut lost = Vec::new();
    for slot in loc.slots.iter_mut() {
        if !slot.destroyed {
            slot.destroyed = true;
            lost.push(slot.content);
        }
    }

    for content in lost {
        match content {
            SlotContent::Engine => unit.damage.engine_hits += 1,
            SlotContent::Gyro => unit.damage.gyro_hits += 1,
            SlotContent::Cockpit => unit.damage.cockpit_destroyed = true,
            SlotContent::Sensors => unit.damage.sensor_hits = (unit.damage.sensor_hits + 1).min(2),
            SlotContent::LifeSupport => unit.damage.life_support_hits += 1,
            SlotContent::Actuator(kind) => {
                unit.damage.actuators.insert((location, kind));
            }
            SlotContent::Weapon(i) => {
                unit.damage.weapons.insert(i);
            }
            SlotContent::Ammo(i) => {
                if let Some(bin) = unit.ammo.get_mut(i) {
                    bin.destroyed = true;
                }
            }
            SlotContent::HeatSink => {}
            SlotContent::JumpJet => unit.damage.jump_jets_destroyed += 1,
            SlotContent::Equipment(kind) => {
                unit.damage.equipment.insert(kind);
            }
            SlotContent::Melee(weapon) => {
                unit.damage.melee.insert((location, weapon));
            }
        }
    }
    for first in sink_first_slots(unit, location) {
        if unit.damage.sinks_hit.insert((location, first)) {
            unit.damage.heat_sinks_destroyed += 1;
        }
    }
    Ok(())
}

fn damage_component(
    unit: &mut UnitCombatState,
    location: Location,
    slot: usize,
    component: SlotContent,
    seq: Seq,
) -> SimResult<()> {
    let id = unit.id.clone();
    let loc = location_mut(unit, location, seq)?;
    let entry = loc
        .slots
        .get_mut(slot)
        .ok_or_else(|| SimError::invariant(seq, format!("{id} {location} has no slot {slot}")))?;
    if entry.content != component {
        return Err(SimError::invariant(
            seq,
            format!("{id} {location} slot {slot} holds {:?}, not {component:?}", entry.content),
        ));
    }
    if entry.destroyed {
        return Err(SimError::invariant(seq, format!("{id} {location} slot {slot} hit twice")));
    }
    entry.destroyed = true;

    match component {
        SlotContent::Engine => unit.damage.engine_hits += 1,
        SlotContent::Gyro => unit.damage.gyro_hits += 1,
        SlotContent::Cockpit => unit.damage.cockpit_destroyed = true,
        SlotContent::Sensors => unit.damage.sensor_hits = (unit.damage.sensor_hits + 1).min(2),
        SlotContent::LifeSupport => unit.damage.life_support_hits += 1,
        SlotContent::Actuator(kind) => {
            unit.damage.actuators.insert((location, kind));
        }
        SlotContent::Weapon(i) => {
            unit.damage.weapons.insert(i);
        }
        SlotContent::Ammo(i) => {
            if let Some(bin) = unit.ammo.get_mut(i) {
                bin.destroyed = true;
            }
        }
        SlotContent::HeatSink => {
            let first = sink_first_slot(unit, location, slot);
            if unit.damage.sinks_hit.insert((location, first)) {
                unit.damage.heat_sinks_destroyed += 1;
            }
        }
        SlotContent::JumpJet => unit.damage.jump_jets_destroyed += 1,
        SlotContent::Equipment(kind) => {
            unit.damage.equipment.insert(kind);
        }
        SlotContent::Melee(weapon) => {
            unit.damage.melee.insert((location, weapon));
        }
    }
    Ok(())
}

/// First slot of the heat sink occupying `slot`. Double sinks span
/// several consecutive slots and are knocked out by the first hit.
fn sink_first_slot(unit: &UnitCombatState, location: Location, slot: usize) -> usize {
    sink_first_slots(unit, location)
        .into_iter()
        .rev()
        .find(|first| *first <= slot)
        .unwrap_or(slot)
}

fn sink_first_slots(unit: &UnitCombatState, location: Location) -> Vec<usize> {
    let per_sink = unit.heat_sink_kind.slots();
    let sink_slots: Vec<usize> = unit
        .location(location)
        .slots
        .iter()
        .enumerate()
        .filter(|(_, s)| s.content == SlotContent::HeatSink)
        .map(|(i, _)| i)
        .collect();
    sink_slots.chunks(per_sink).map(|chunk| chunk[0]).collect()
}

