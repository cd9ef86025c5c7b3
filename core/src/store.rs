//! SQLite persistence for battles and their event logs.
//!
//! RULE: Only store.rs talks to the database. The engine never writes
//! SQL; callers hand finished events to the store.

use crate::{
    error::{SimError, SimResult},
    event::{EventLogEntry, GameEvent},
    phase::Phase,
    state::BattleOutcome,
    types::{Seq, Turn},
};
use rusqlite::{params, Connection, OptionalExtension};

/// A stored battle header.
#[derive(Debug, Clone, PartialEq)]
pub struct BattleRecord {
    pub battle_id:   String,
    pub seed:        u64,
    pub turn_limit:  u32,
    pub version:     String,
    pub started_at:  String,
    pub finished_at: Option<String>,
    pub winner:      Option<u8>,
    pub end_reason:  Option<String>,
}

pub struct BattleStore {
    conn: Connection,
}

impl BattleStore {
    /// Open (or create) the battle database at `path`.
    pub fn open(path: &str) -> SimResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SimResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    pub fn migrate(&self) -> SimResult<()> {
        self.conn.execute_batch(include_str!("../../migrations/001_battle.sql"))?;
        Ok(())
    }

    // ── Battle ─────────────────────────────────────────────────

    pub fn insert_battle(&self, battle_id: &str, seed: u64, turn_limit: u32, version: &str) -> SimResult<()> {
        let started_at = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO battle (battle_id, seed, turn_limit, version, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![battle_id, seed as i64, turn_limit, version, started_at],
        )?;
        Ok(())
    }

    pub fn finish_battle(&self, battle_id: &str, outcome: &BattleOutcome) -> SimResult<()> {
        let finished_at = chrono::Utc::now().to_rfc3339();
        let reason = serde_json::to_value(outcome.reason)?;
        let updated = self.conn.execute(
            "UPDATE battle SET finished_at = ?2, winner = ?3, end_reason = ?4 WHERE battle_id = ?1",
            params![battle_id, finished_at, outcome.winner, reason.as_str()],
        )?;
        if updated == 0 {
            return Err(SimError::config(format!("no stored battle '{battle_id}'")));
        }
        Ok(())
    }

    pub fn battle(&self, battle_id: &str) -> SimResult<Option<BattleRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT battle_id, seed, turn_limit, version, started_at, finished_at, winner, end_reason
                 FROM battle WHERE battle_id = ?1",
                params![battle_id],
                |row| {
                    Ok(BattleRecord {
                        battle_id:   row.get(0)?,
                        seed:        row.get::<_, i64>(1)? as u64,
                        turn_limit:  row.get(2)?,
                        version:     row.get(3)?,
                        started_at:  row.get(4)?,
                        finished_at: row.get(5)?,
                        winner:      row.get(6)?,
                        end_reason:  row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> SimResult<()> {
        let phase = serde_json::to_value(entry.phase)?;
        self.conn.execute(
            "INSERT INTO event_log (battle_id, seq, turn, phase, event_type, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.battle_id,
                entry.seq as i64,
                entry.turn,
                phase.as_str(),
                entry.event_type,
                entry.payload,
            ],
        )?;
        Ok(())
    }

    /// Persist a slice of the live log in one transaction.
    pub fn append_events(&mut self, battle_id: &str, events: &[GameEvent]) -> SimResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO event_log (battle_id, seq, turn, phase, event_type, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for event in events {
                let entry = EventLogEntry::from_event(battle_id, event)?;
                let phase = serde_json::to_value(entry.phase)?;
                stmt.execute(params![
                    entry.battle_id,
                    entry.seq as i64,
                    entry.turn,
                    phase.as_str(),
                    entry.event_type,
                    entry.payload,
                ])?;
            }
        }
        tx.commit()?;
        log::debug!("Stored {} events for {battle_id}", events.len());
        Ok(())
    }

    pub fn entries(&self, battle_id: &str) -> SimResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, battle_id, seq, turn, phase, event_type, payload
             FROM event_log WHERE battle_id = ?1
             ORDER BY seq ASC",
        )?;
        let rows = stmt
            .query_map(params![battle_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)? as Seq,
                    row.get::<_, Turn>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, battle_id, seq, turn, phase, event_type, payload)| -> SimResult<EventLogEntry> {
                let phase: Phase = serde_json::from_value(serde_json::Value::String(phase))?;
                Ok(EventLogEntry {
                    id: Some(id),
                    battle_id,
                    seq,
                    turn,
                    phase,
                    event_type,
                    payload,
                })
            })
            .collect()
    }

    /// Read a stored log back as events, ready for `replay`.
    pub fn load_events(&self, battle_id: &str) -> SimResult<Vec<GameEvent>> {
        self.entries(battle_id)?
            .iter()
            .map(|entry| entry.to_event().map_err(SimError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EndReason, EventKind};

    fn store() -> BattleStore {
        let store = BattleStore::in_memory().unwrap();
        store.migrate().unwrap();
        store.insert_battle("b1", 7, 10, "test").unwrap();
        store
    }

    #[test]
    fn events_come_back_in_sequence_order() {
        let mut store = store();
        let events = vec![
            GameEvent {
                seq:   0,
                turn:  1,
                phase: Phase::Initiative,
                kind:  EventKind::PhaseChanged { from: Phase::Initiative, to: Phase::Movement },
            },
            GameEvent {
                seq:   1,
                turn:  1,
                phase: Phase::Movement,
                kind:  EventKind::ActivationPassed { side: 1 },
            },
        ];
        store.append_events("b1", &events).unwrap();
        assert_eq!(store.load_events("b1").unwrap(), events);
        assert_eq!(store.entries("b1").unwrap()[1].event_type, "activation_passed");
    }

    #[test]
    fn duplicate_sequence_numbers_are_refused() {
        let store = store();
        let event = GameEvent {
            seq:   0,
            turn:  1,
            phase: Phase::Initiative,
            kind:  EventKind::TurnAdvanced { turn: 2 },
        };
        let entry = EventLogEntry::from_event("b1", &event).unwrap();
        store.append_event(&entry).unwrap();
        assert!(matches!(store.append_event(&entry), Err(SimError::Database(_))));
    }

    #[test]
    fn finishing_records_the_outcome() {
        let store = store();
        store
            .finish_battle("b1", &BattleOutcome { winner: Some(1), reason: EndReason::Annihilation })
            .unwrap();
        let record = store.battle("b1").unwrap().unwrap();
        assert_eq!(record.winner, Some(1));
        assert_eq!(record.end_reason.as_deref(), Some("annihilation"));
        assert!(record.finished_at.is_some());
    }
}
