// SQLite persistence for award stamps, lifecycle events, and published outputs.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::lifecycle::LifecycleEvent;
use crate::picks::pick::{CompensatoryMeta, DraftPick, LifecycleState, PickSource, PickType};
use crate::picks::sequencer::AwardStamp;
use crate::rebuild::{RebuildOutput, RebuildState};

/// SQLite-backed store. Stamps and lifecycle events are append-only; the
/// output tables are replaced wholesale on every publish.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS award_stamps (
                award_ref    INTEGER NOT NULL,
                season       INTEGER NOT NULL,
                round        INTEGER NOT NULL,
                sequence     INTEGER NOT NULL,
                content_hash TEXT NOT NULL,
                stamped_at   TEXT NOT NULL,
                PRIMARY KEY (award_ref, season, round),
                UNIQUE (season, round, sequence)
            );

            CREATE TABLE IF NOT EXISTS pick_events (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                pick_id    TEXT NOT NULL,
                kind       TEXT NOT NULL,
                payload    TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS draft_picks (
                pick_id               TEXT PRIMARY KEY,
                season                INTEGER NOT NULL,
                round                 INTEGER NOT NULL,
                slot_number           INTEGER,
                overall_pick          INTEGER,
                pick_type             TEXT NOT NULL,
                lifecycle_state       TEXT NOT NULL,
                source                TEXT NOT NULL,
                owner                 TEXT,
                selection             TEXT,
                compensation          TEXT,
                first_seen_record     INTEGER,
                superseded_by_pick_id TEXT,
                superseded_at         TEXT
            );

            CREATE TABLE IF NOT EXISTS reconciliation_report (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                classification TEXT NOT NULL,
                severity       TEXT NOT NULL,
                match_key      TEXT,
                award_ref      INTEGER,
                pick_id        TEXT,
                season         INTEGER,
                round          INTEGER,
                diagnostic     TEXT NOT NULL,
                payload        TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS pick_xref (
                record_id         INTEGER NOT NULL,
                season            INTEGER NOT NULL,
                round             INTEGER NOT NULL,
                slot              INTEGER,
                overall           INTEGER,
                owner             TEXT,
                matched_pick_id   TEXT,
                canonical_pick_id TEXT,
                method            TEXT NOT NULL,
                notes             TEXT NOT NULL,
                PRIMARY KEY (record_id)
            );

            CREATE TABLE IF NOT EXISTS rebuild_state (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .context("failed to create database schema")?;

        conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_draft_picks_season ON draft_picks(season, overall_pick);
             CREATE INDEX IF NOT EXISTS idx_pick_events_pick ON pick_events(pick_id);",
        )
        .context("failed to create indexes")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Append-only state
    // ------------------------------------------------------------------

    /// Every stamp ever written, ordered by (season, round, sequence).
    pub fn load_stamps(&self) -> Result<Vec<AwardStamp>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT award_ref, season, round, sequence, content_hash, stamped_at
                 FROM award_stamps ORDER BY season, round, sequence",
            )
            .context("failed to prepare load_stamps query")?;

        let rows = stmt
            .query_map([], |row| {
                let award_ref: i64 = row.get(0)?;
                Ok(AwardStamp {
                    award_ref: award_ref as u64,
                    season: row.get(1)?,
                    round: row.get(2)?,
                    sequence: row.get(3)?,
                    content_hash: row.get(4)?,
                    stamped_at: row.get::<_, DateTime<Utc>>(5)?,
                })
            })
            .context("failed to query award stamps")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map award stamp rows")?;
        Ok(rows)
    }

    /// The lifecycle log in append order.
    pub fn load_events(&self) -> Result<Vec<LifecycleEvent>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT payload FROM pick_events ORDER BY id")
            .context("failed to prepare load_events query")?;

        let payloads = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("failed to query pick events")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map pick event rows")?;

        payloads
            .iter()
            .map(|json| serde_json::from_str(json).context("failed to deserialize pick event"))
            .collect()
    }

    pub fn load_rebuild_state(&self) -> Result<RebuildState> {
        Ok(RebuildState {
            stamps: self.load_stamps()?,
            events: self.load_events()?,
        })
    }

    fn append_stamps(tx: &Transaction<'_>, stamps: &[AwardStamp]) -> Result<()> {
        let mut stmt = tx
            .prepare(
                "INSERT OR IGNORE INTO award_stamps
                    (award_ref, season, round, sequence, content_hash, stamped_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .context("failed to prepare stamp insert")?;
        for s in stamps {
            stmt.execute(params![
                s.award_ref as i64,
                s.season,
                s.round,
                s.sequence,
                s.content_hash,
                s.stamped_at,
            ])
            .context("failed to insert award stamp")?;
        }
        Ok(())
    }

    fn append_events(tx: &Transaction<'_>, events: &[LifecycleEvent]) -> Result<()> {
        let mut stmt = tx
            .prepare(
                "INSERT INTO pick_events (pick_id, kind, payload, recorded_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .context("failed to prepare event insert")?;
        for e in events {
            let payload = serde_json::to_string(e).context("failed to serialize pick event")?;
            stmt.execute(params![e.pick_id(), e.kind(), payload, e.at()])
                .context("failed to insert pick event")?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Publishing
    // ------------------------------------------------------------------

    /// Persist one rebuild: append new stamps and events, then replace the
    /// dimension, reconciliation report, and cross-reference table. All of it
    /// commits together or not at all.
    pub fn publish(&self, output: &RebuildOutput) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin publish transaction")?;

        Self::append_stamps(&tx, &output.new_stamps)?;
        Self::append_events(&tx, &output.new_events)?;

        tx.execute("DELETE FROM draft_picks", [])
            .context("failed to clear draft_picks")?;
        tx.execute("DELETE FROM reconciliation_report", [])
            .context("failed to clear reconciliation_report")?;
        tx.execute("DELETE FROM pick_xref", [])
            .context("failed to clear pick_xref")?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO draft_picks
                        (pick_id, season, round, slot_number, overall_pick, pick_type,
                         lifecycle_state, source, owner, selection, compensation,
                         first_seen_record, superseded_by_pick_id, superseded_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                )
                .context("failed to prepare draft_picks insert")?;
            for p in &output.dimension.picks {
                let compensation = p
                    .compensation
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()
                    .context("failed to serialize compensation metadata")?;
                stmt.execute(params![
                    p.pick_id,
                    p.season,
                    p.round,
                    p.slot_number,
                    p.overall_pick,
                    p.pick_type.as_str(),
                    p.lifecycle_state.as_str(),
                    p.source.as_str(),
                    p.owner,
                    p.selection,
                    compensation,
                    p.first_seen_record.map(|r| r as i64),
                    p.superseded_by_pick_id,
                    p.superseded_at,
                ])
                .with_context(|| format!("failed to insert pick {}", p.pick_id))?;
            }
        }

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO reconciliation_report
                        (classification, severity, match_key, award_ref, pick_id, season, round,
                         diagnostic, payload)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )
                .context("failed to prepare reconciliation insert")?;
            for r in &output.reconciliation {
                let payload =
                    serde_json::to_string(r).context("failed to serialize reconciliation row")?;
                let (season, round) = match (&r.award, &r.pick) {
                    (Some(a), _) => (Some(a.season), Some(a.round)),
                    (None, Some(p)) => (Some(p.season), Some(p.round)),
                    (None, None) => (None, None),
                };
                stmt.execute(params![
                    r.classification.as_str(),
                    r.severity.as_str(),
                    r.key.map(|k| k.as_str()),
                    r.award.as_ref().map(|a| a.award_ref as i64),
                    r.pick.as_ref().map(|p| p.pick_id.as_str()),
                    season,
                    round,
                    r.diagnostic,
                    payload,
                ])
                .context("failed to insert reconciliation row")?;
            }
        }

        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO pick_xref
                        (record_id, season, round, slot, overall, owner,
                         matched_pick_id, canonical_pick_id, method, notes)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                )
                .context("failed to prepare pick_xref insert")?;
            for x in &output.cross_references {
                let notes = serde_json::to_string(&x.notes).context("failed to serialize notes")?;
                stmt.execute(params![
                    x.reference.record_id as i64,
                    x.reference.season,
                    x.reference.round,
                    x.reference.slot,
                    x.reference.overall,
                    x.reference.owner,
                    x.matched_pick_id,
                    x.canonical_pick_id,
                    x.method.as_str(),
                    notes,
                ])
                .context("failed to insert pick_xref row")?;
            }
        }

        let diagnostics =
            serde_json::to_string(&output.diagnostics).context("failed to serialize diagnostics")?;
        tx.execute(
            "INSERT OR REPLACE INTO rebuild_state (key, value) VALUES (?1, ?2)",
            params![Self::DIAGNOSTICS_KEY, diagnostics],
        )
        .context("failed to save diagnostics")?;

        tx.commit().context("failed to commit publish")?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    fn row_to_pick(row: &rusqlite::Row<'_>) -> rusqlite::Result<DraftPick> {
        let text_enum = |idx: usize, value: String| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                format!("unknown value {value:?}").into(),
            )
        };
        let pick_type: String = row.get(5)?;
        let state: String = row.get(6)?;
        let source: String = row.get(7)?;
        let compensation: Option<String> = row.get(10)?;
        let first_seen: Option<i64> = row.get(11)?;
        Ok(DraftPick {
            pick_id: row.get(0)?,
            season: row.get(1)?,
            round: row.get(2)?,
            slot_number: row.get(3)?,
            overall_pick: row.get(4)?,
            pick_type: PickType::from_str_opt(&pick_type).ok_or_else(|| text_enum(5, pick_type.clone()))?,
            lifecycle_state: LifecycleState::from_str_opt(&state)
                .ok_or_else(|| text_enum(6, state.clone()))?,
            source: PickSource::from_str_opt(&source).ok_or_else(|| text_enum(7, source.clone()))?,
            owner: row.get(8)?,
            selection: row.get(9)?,
            compensation: compensation
                .map(|json| serde_json::from_str::<CompensatoryMeta>(&json))
                .transpose()
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(10, rusqlite::types::Type::Text, Box::new(e))
                })?,
            first_seen_record: first_seen.map(|r| r as u64),
            superseded_by_pick_id: row.get(12)?,
            superseded_at: row.get(13)?,
        })
    }

    const PICK_COLUMNS: &'static str = "pick_id, season, round, slot_number, overall_pick, pick_type,
         lifecycle_state, source, owner, selection, compensation, first_seen_record,
         superseded_by_pick_id, superseded_at";

    /// Published picks ordered by season then overall (placeholders last).
    /// With `active_only`, superseded rows are left out.
    pub fn load_picks(&self, active_only: bool) -> Result<Vec<DraftPick>> {
        let conn = self.conn();
        let filter = if active_only {
            "WHERE lifecycle_state != 'superseded'"
        } else {
            ""
        };
        let sql = format!(
            "SELECT {} FROM draft_picks {} ORDER BY season, overall_pick IS NULL, overall_pick, pick_id",
            Self::PICK_COLUMNS,
            filter
        );
        let mut stmt = conn.prepare(&sql).context("failed to prepare load_picks query")?;
        let picks = stmt
            .query_map([], Self::row_to_pick)
            .context("failed to query draft picks")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map draft pick rows")?;
        Ok(picks)
    }

    pub fn get_pick(&self, pick_id: &str) -> Result<Option<DraftPick>> {
        let conn = self.conn();
        let sql = format!("SELECT {} FROM draft_picks WHERE pick_id = ?1", Self::PICK_COLUMNS);
        conn.query_row(&sql, params![pick_id], Self::row_to_pick)
            .optional()
            .context("failed to query pick")
    }

    pub fn reconciliation_count(&self, classification: &str) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM reconciliation_report WHERE classification = ?1",
                params![classification],
                |row| row.get(0),
            )
            .context("failed to count reconciliation rows")?;
        Ok(count as usize)
    }

    /// Canonical id the cross-reference table holds for a ledger record.
    pub fn canonical_for_record(&self, record_id: u64) -> Result<Option<String>> {
        let conn = self.conn();
        let value: Option<Option<String>> = conn
            .query_row(
                "SELECT canonical_pick_id FROM pick_xref WHERE record_id = ?1",
                params![record_id as i64],
                |row| row.get(0),
            )
            .optional()
            .context("failed to query pick_xref")?;
        Ok(value.flatten())
    }

    // ------------------------------------------------------------------
    // Key-value state
    // ------------------------------------------------------------------

    const DIAGNOSTICS_KEY: &'static str = "last_diagnostics";

    /// Values are written by `publish`, inside its transaction.
    fn load_state(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn();
        let json_str: Option<String> = conn
            .query_row(
                "SELECT value FROM rebuild_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .context("failed to query rebuild state")?;
        json_str
            .map(|s| serde_json::from_str(&s).context("failed to deserialize state value"))
            .transpose()
    }

    /// Diagnostics from the last published rebuild.
    pub fn last_diagnostics(&self) -> Result<Option<serde_json::Value>> {
        self.load_state(Self::DIAGNOSTICS_KEY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
