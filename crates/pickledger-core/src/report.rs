// CSV exports of the published outputs for human review.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::picks::pick::DraftPick;
use crate::reconcile::ReconciliationRecord;
use crate::rebuild::RebuildOutput;
use crate::xref::CrossReference;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to write CSV rows to {path}: {source}")]
    Csv {
        path: String,
        source: csv::Error,
    },
}

#[derive(Debug, Serialize)]
struct PickRow<'a> {
    pick_id: &'a str,
    season: i32,
    round: u32,
    slot_number: Option<u32>,
    overall_pick: Option<u32>,
    pick_type: &'static str,
    lifecycle_state: &'static str,
    source: &'static str,
    owner: Option<&'a str>,
    selection: Option<&'a str>,
    award_ref: Option<u64>,
    comp_sequence: Option<u32>,
    triggering_player: Option<&'a str>,
    recipient: Option<&'a str>,
    implied_round: Option<u32>,
    first_seen_record: Option<u64>,
    superseded_by_pick_id: Option<&'a str>,
    superseded_at: Option<String>,
}

impl<'a> From<&'a DraftPick> for PickRow<'a> {
    fn from(p: &'a DraftPick) -> Self {
        let meta = p.compensation.as_ref();
        PickRow {
            pick_id: &p.pick_id,
            season: p.season,
            round: p.round,
            slot_number: p.slot_number,
            overall_pick: p.overall_pick,
            pick_type: p.pick_type.as_str(),
            lifecycle_state: p.lifecycle_state.as_str(),
            source: p.source.as_str(),
            owner: p.owner.as_deref(),
            selection: p.selection.as_deref(),
            award_ref: meta.and_then(|m| m.award_ref),
            comp_sequence: meta.map(|m| m.sequence),
            triggering_player: meta.and_then(|m| m.triggering_player.as_deref()),
            recipient: meta.and_then(|m| m.recipient.as_deref()),
            implied_round: meta.and_then(|m| m.implied_round),
            first_seen_record: p.first_seen_record,
            superseded_by_pick_id: p.superseded_by_pick_id.as_deref(),
            superseded_at: p.superseded_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ReconciliationRow<'a> {
    classification: &'static str,
    severity: &'static str,
    match_key: Option<&'static str>,
    award_ref: Option<u64>,
    award_season: Option<i32>,
    award_round: Option<u32>,
    award_sequence: Option<u32>,
    pick_id: Option<&'a str>,
    pick_sequence: Option<u32>,
    diagnostic: &'a str,
}

impl<'a> From<&'a ReconciliationRecord> for ReconciliationRow<'a> {
    fn from(r: &'a ReconciliationRecord) -> Self {
        ReconciliationRow {
            classification: r.classification.as_str(),
            severity: r.severity.as_str(),
            match_key: r.key.map(|k| k.as_str()),
            award_ref: r.award.as_ref().map(|a| a.award_ref),
            award_season: r.award.as_ref().map(|a| a.season),
            award_round: r.award.as_ref().map(|a| a.round),
            award_sequence: r.award.as_ref().map(|a| a.sequence),
            pick_id: r.pick.as_ref().map(|p| p.pick_id.as_str()),
            pick_sequence: r.pick.as_ref().map(|p| p.sequence),
            diagnostic: &r.diagnostic,
        }
    }
}

#[derive(Debug, Serialize)]
struct XrefRow<'a> {
    record_id: u64,
    season: i32,
    round: u32,
    slot: Option<u32>,
    overall: Option<u32>,
    owner: Option<&'a str>,
    matched_pick_id: Option<&'a str>,
    canonical_pick_id: Option<&'a str>,
    method: &'static str,
    notes: String,
}

impl<'a> From<&'a CrossReference> for XrefRow<'a> {
    fn from(x: &'a CrossReference) -> Self {
        XrefRow {
            record_id: x.reference.record_id,
            season: x.reference.season,
            round: x.reference.round,
            slot: x.reference.slot,
            overall: x.reference.overall,
            owner: x.reference.owner.as_deref(),
            matched_pick_id: x.matched_pick_id.as_deref(),
            canonical_pick_id: x.canonical_pick_id.as_deref(),
            method: x.method.as_str(),
            notes: x.notes.join("; "),
        }
    }
}

fn write_rows<W: Write, T: Serialize>(writer: W, rows: impl IntoIterator<Item = T>) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_picks<W: Write>(writer: W, picks: &[DraftPick]) -> Result<(), csv::Error> {
    write_rows(writer, picks.iter().map(PickRow::from))
}

pub fn write_reconciliation<W: Write>(writer: W, records: &[ReconciliationRecord]) -> Result<(), csv::Error> {
    write_rows(writer, records.iter().map(ReconciliationRow::from))
}

pub fn write_cross_references<W: Write>(writer: W, rows: &[CrossReference]) -> Result<(), csv::Error> {
    write_rows(writer, rows.iter().map(XrefRow::from))
}

fn export<F>(path: &Path, write: F) -> Result<(), ReportError>
where
    F: FnOnce(fs::File) -> Result<(), csv::Error>,
{
    let file = fs::File::create(path).map_err(|source| ReportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    write(file).map_err(|source| ReportError::Csv {
        path: path.display().to_string(),
        source,
    })
}

/// Write `draft_picks.csv`, `reconciliation.csv`, and `pick_xref.csv` into
/// `dir`, creating it if needed.
pub fn write_all(dir: &Path, output: &RebuildOutput) -> Result<Vec<PathBuf>, ReportError> {
    fs::create_dir_all(dir).map_err(|source| ReportError::Io {
        path: dir.display().to_string(),
        source,
    })?;
    let picks = dir.join("draft_picks.csv");
    let reconciliation = dir.join("reconciliation.csv");
    let xref = dir.join("pick_xref.csv");

    export(&picks, |f| write_picks(f, &output.dimension.picks))?;
    export(&reconciliation, |f| write_reconciliation(f, &output.reconciliation))?;
    export(&xref, |f| write_cross_references(f, &output.cross_references))?;
    Ok(vec![picks, reconciliation, xref])
}
