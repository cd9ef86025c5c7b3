//! The explicit battle context handed to every resolver.
//!
//! RULE: Resolvers reach dice, terrain, rules and units only through a
//! BattleContext. There is no global state, so any number of battles
//! can run side by side on separate threads.

use crate::{
    config::BattleConfig,
    error::{SimError, SimResult},
    event::{EventKind, GameEvent},
    psr::PsrTrigger,
    rng::DiceSource,
    state::BattleState,
    types::UnitId,
    unit::UnitCombatState,
};

/// A piloting skill roll waiting for the end of the current step.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedPsr {
    pub unit:    UnitId,
    pub trigger: PsrTrigger,
}

pub struct BattleContext<'a> {
    pub state:  &'a mut BattleState,
    pub log:    &'a mut Vec<GameEvent>,
    pub dice:   &'a mut dyn DiceSource,
    pub config: &'a BattleConfig,
    pub psr_queue: Vec<QueuedPsr>,
}

impl<'a> BattleContext<'a> {
    pub fn new(
        state: &'a mut BattleState,
        log: &'a mut Vec<GameEvent>,
        dice: &'a mut dyn DiceSource,
        config: &'a BattleConfig,
    ) -> Self {
        Self {
            state,
            log,
            dice,
            config,
            psr_queue: Vec::new(),
        }
    }

    /// Append an event to the log and fold it into the state.
    pub fn emit(&mut self, kind: EventKind) -> SimResult<()> {
        let event = GameEvent {
            seq:   self.state.next_seq(),
            turn:  self.state.clock.turn,
            phase: self.state.clock.phase,
            kind,
        };
        log::debug!("#{} {:?} {}", event.seq, event.phase, event.kind.name());
        if let Err(e) = self.state.apply(&event) {
            self.log.push(event);
            return Err(match e {
                SimError::StateInvariantViolation { detail, seq, .. } => {
                    SimError::StateInvariantViolation {
                        detail,
                        seq,
                        log: self.log.clone(),
                    }
                }
                other => other,
            });
        }
        self.log.push(event);
        Ok(())
    }

    /// Look up a unit that an earlier step has already validated.
    pub fn unit(&self, id: &str) -> SimResult<&UnitCombatState> {
        self.state
            .units
            .get(id)
            .ok_or_else(|| SimError::invariant(self.state.next_seq(), format!("unknown unit {id}")))
    }

    pub fn queue_psr(&mut self, unit: &str, trigger: PsrTrigger) {
        log::debug!("PSR queued for {unit}: {}", trigger.reason.key());
        self.psr_queue.push(QueuedPsr {
            unit: unit.to_string(),
            trigger,
        });
    }

    pub fn roll_2d6(&mut self) -> u8 {
        self.dice.roll_2d6()
    }

    pub fn d6(&mut self) -> u8 {
        self.dice.d6()
    }
}
