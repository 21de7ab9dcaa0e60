// Input snapshots: the transaction ledger and actual draft results.
//
// Both arrive as CSV exports. Rows that fail to deserialize are skipped with a
// warning; a file that cannot be opened or read is an error.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use tracing::warn;

use crate::config::DataPaths;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// One asset movement from the league ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Stable per-record reference assigned at ingestion. Ordering by this
    /// value reproduces the order records were first observed.
    pub record_id: u64,
    pub date: NaiveDate,
    /// Free-form transaction kind ("trade", "signing", "cut", ...).
    pub kind: String,
    pub from_party: Option<String>,
    pub to_party: Option<String>,
    pub player_id: Option<String>,
    pub player_name: Option<String>,
    /// Contract average annual value, in the league's currency unit.
    pub aav: Option<f64>,
    /// Free-text compensation reference, e.g. "2024 1st" or "2nd to Hawks".
    pub compensation: Option<String>,
    pub pick: Option<PickHint>,
    /// Manually editable display order. Never used for sequencing.
    pub sort_order: Option<i64>,
}

impl TransactionRecord {
    pub fn year(&self) -> i32 {
        self.date.year()
    }
}

/// A draft pick moved by a transaction, as stated at the time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickHint {
    pub season: i32,
    pub round: u32,
    pub slot: Option<u32>,
    pub overall: Option<u32>,
    /// Party the pick originally belonged to, when the ledger says so.
    pub original_owner: Option<String>,
}

impl PickHint {
    /// A reference with neither a slot nor an overall position.
    pub fn is_unresolved(&self) -> bool {
        self.slot.is_none() && self.overall.is_none()
    }
}

/// One selection from an actual, completed draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftResult {
    pub season: i32,
    pub round: u32,
    pub slot: u32,
    pub overall: Option<u32>,
    /// Party that made the selection.
    pub party: String,
    /// Party the pick originally belonged to (defaults to `party`).
    pub original_owner: Option<String>,
    pub player_id: Option<String>,
    pub player_name: Option<String>,
    /// Ledger record id of the compensation award this selection used.
    pub award_ref: Option<u64>,
}

impl DraftResult {
    /// The party whose forward reference this selection resolves.
    pub fn owner(&self) -> &str {
        self.original_owner.as_deref().unwrap_or(&self.party)
    }
}

/// Everything one rebuild reads. Treated as immutable for the whole run.
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    pub transactions: Vec<TransactionRecord>,
    pub results: Vec<DraftResult>,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

// ---------------------------------------------------------------------------
// Raw CSV serde structs (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawTransaction {
    record_id: u64,
    date: NaiveDate,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    from_party: Option<String>,
    #[serde(default)]
    to_party: Option<String>,
    #[serde(default)]
    player_id: Option<String>,
    #[serde(default)]
    player_name: Option<String>,
    #[serde(default)]
    aav: Option<f64>,
    #[serde(default)]
    compensation: Option<String>,
    #[serde(default)]
    pick_season: Option<i32>,
    #[serde(default)]
    pick_round: Option<u32>,
    #[serde(default)]
    pick_slot: Option<u32>,
    #[serde(default)]
    pick_overall: Option<u32>,
    #[serde(default)]
    pick_owner: Option<String>,
    #[serde(default)]
    sort_order: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawDraftResult {
    season: i32,
    round: u32,
    slot: u32,
    #[serde(default)]
    overall: Option<u32>,
    party: String,
    #[serde(default)]
    original_owner: Option<String>,
    #[serde(default)]
    player_id: Option<String>,
    #[serde(default)]
    player_name: Option<String>,
    #[serde(default)]
    award_ref: Option<u64>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Trim a text cell, treating blank cells as absent.
fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn into_record(raw: RawTransaction) -> TransactionRecord {
    let pick = match (raw.pick_season, raw.pick_round) {
        (Some(season), Some(round)) => Some(PickHint {
            season,
            round,
            slot: raw.pick_slot,
            overall: raw.pick_overall,
            original_owner: clean(raw.pick_owner),
        }),
        _ => None,
    };
    TransactionRecord {
        record_id: raw.record_id,
        date: raw.date,
        kind: raw.kind.trim().to_string(),
        from_party: clean(raw.from_party),
        to_party: clean(raw.to_party),
        player_id: clean(raw.player_id),
        player_name: clean(raw.player_name),
        aav: raw.aav.filter(|v| v.is_finite()),
        compensation: clean(raw.compensation),
        pick,
        sort_order: raw.sort_order,
    }
}

// ---------------------------------------------------------------------------
// Reader-based loaders (enable testing without temp files)
// ---------------------------------------------------------------------------

pub fn load_transactions_from_reader<R: Read>(
    rdr: R,
) -> Result<Vec<TransactionRecord>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut records = Vec::new();
    let mut seen = BTreeSet::new();
    for result in reader.deserialize::<RawTransaction>() {
        match result {
            Ok(raw) => {
                if !seen.insert(raw.record_id) {
                    warn!("skipping transaction with duplicate record_id {}", raw.record_id);
                    continue;
                }
                records.push(into_record(raw));
            }
            Err(e) => {
                warn!("skipping malformed transaction row: {}", e);
            }
        }
    }
    records.sort_by_key(|r| r.record_id);
    Ok(records)
}

pub fn load_results_from_reader<R: Read>(rdr: R) -> Result<Vec<DraftResult>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut results = Vec::new();
    for result in reader.deserialize::<RawDraftResult>() {
        match result {
            Ok(raw) => {
                if raw.round == 0 || raw.slot == 0 {
                    warn!(
                        "skipping draft result {} round {} slot {}: round and slot are 1-based",
                        raw.season, raw.round, raw.slot
                    );
                    continue;
                }
                let party = raw.party.trim().to_string();
                results.push(DraftResult {
                    season: raw.season,
                    round: raw.round,
                    slot: raw.slot,
                    overall: raw.overall,
                    party,
                    original_owner: clean(raw.original_owner),
                    player_id: clean(raw.player_id),
                    player_name: clean(raw.player_name),
                    award_ref: raw.award_ref,
                });
            }
            Err(e) => {
                warn!("skipping malformed draft result row: {}", e);
            }
        }
    }
    results.sort_by_key(|r| (r.season, r.round, r.slot));
    Ok(results)
}

// ---------------------------------------------------------------------------
// Public path-based loaders
// ---------------------------------------------------------------------------

pub fn load_transactions(path: &Path) -> Result<Vec<TransactionRecord>, LedgerError> {
    let file = std::fs::File::open(path).map_err(|e| LedgerError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load_transactions_from_reader(file).map_err(|e| LedgerError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

/// Load draft results. A missing file means no draft has been resolved yet
/// and yields an empty list.
pub fn load_results(path: &Path) -> Result<Vec<DraftResult>, LedgerError> {
    if !path.exists() {
        warn!("draft results file {} not found; assuming none", path.display());
        return Ok(Vec::new());
    }
    let file = std::fs::File::open(path).map_err(|e| LedgerError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load_results_from_reader(file).map_err(|e| LedgerError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

/// Load both snapshot files relative to `base_dir`.
pub fn load_snapshot(base_dir: &Path, paths: &DataPaths) -> Result<LedgerSnapshot, LedgerError> {
    let transactions = load_transactions(&base_dir.join(&paths.transactions))?;
    let results = load_results(&base_dir.join(&paths.draft_results))?;
    Ok(LedgerSnapshot {
        transactions,
        results,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
