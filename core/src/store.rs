//! SQLite audit journal.
//!
//! RULE: Only store.rs talks to the database.
//! The engine calls store methods after a computation finishes; nothing
//! read from here ever feeds back into scoring.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use crate::{
    baseline::Baseline,
    error::EngineResult,
    event::EventLogEntry,
    risk_scorer::RiskRecord,
    types::Generation,
};

pub struct EngineStore {
    conn: Connection,
}

impl EngineStore {
    /// Open (or create) the journal database at `path`.
    pub fn open(path: &str) -> EngineResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode: readers do not block the journal writer.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> EngineResult<()> {
        self.conn.execute_batch(include_str!("../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Baseline ───────────────────────────────────────────────

    pub fn insert_baseline(&self, baseline: &Baseline, config_json: &str) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO baseline (generation, op_date, flight_count, tail_count, config_json, published_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                baseline.generation() as i64,
                baseline.snapshot().op_date().to_string(),
                baseline.snapshot().flight_count() as i64,
                baseline.graph().chains().len() as i64,
                config_json,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Persist every record of one generation in a single transaction.
    pub fn save_risk_records<'r>(
        &mut self,
        generation: Generation,
        records: impl IntoIterator<Item = &'r RiskRecord>,
    ) -> EngineResult<usize> {
        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO risk_record (generation, flight_key, risk_score, risk_band, record_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in records {
                stmt.execute(params![
                    generation as i64,
                    record.flight_key,
                    record.risk_score,
                    record.risk_band.as_str(),
                    serde_json::to_string(record)?,
                ])?;
                written += 1;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    pub fn risk_record(&self, generation: Generation, flight_key: &str) -> EngineResult<Option<RiskRecord>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT record_json FROM risk_record WHERE generation = ?1 AND flight_key = ?2",
                params![generation as i64, flight_key],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(j) => Ok(Some(serde_json::from_str(&j)?)),
            None => Ok(None),
        }
    }

    pub fn risk_record_count(&self, generation: Generation) -> EngineResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM risk_record WHERE generation = ?1",
            params![generation as i64],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (generation, event_type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.generation as i64,
                entry.event_type,
                entry.payload,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn events_for_generation(&self, generation: Generation) -> EngineResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, generation, event_type, payload
             FROM event_log WHERE generation = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![generation as i64], |row| {
                Ok(EventLogEntry {
                    id:         Some(row.get(0)?),
                    generation: row.get::<_, i64>(1)? as u64,
                    event_type: row.get(2)?,
                    payload:    row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
