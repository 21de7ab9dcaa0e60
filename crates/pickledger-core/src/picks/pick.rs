// Canonical draft pick representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of pick identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickType {
    /// One of the N standard picks in a round.
    Base,
    /// Awarded as compensation, appended after the base picks of its round.
    Compensatory,
    /// Forward reference whose slot is not yet known.
    Tbd,
}

impl PickType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickType::Base => "base",
            PickType::Compensatory => "compensatory",
            PickType::Tbd => "tbd",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "base" => Some(PickType::Base),
            "compensatory" => Some(PickType::Compensatory),
            "tbd" => Some(PickType::Tbd),
            _ => None,
        }
    }
}

impl fmt::Display for PickType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    ActiveTbd,
    /// Terminal. The row stays in the dimension and points at its replacement.
    Superseded,
    Actual,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::ActiveTbd => "active_tbd",
            LifecycleState::Superseded => "superseded",
            LifecycleState::Actual => "actual",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "active_tbd" => Some(LifecycleState::ActiveTbd),
            "superseded" => Some(LifecycleState::Superseded),
            "actual" => Some(LifecycleState::Actual),
            _ => None,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a pick row came from during assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickSource {
    /// Synthesized from league configuration (base slate or fallback).
    Generated,
    /// Taken from an actual draft result.
    Observed,
    /// Built from a sequenced compensation award.
    Awarded,
    /// Created from a transaction that referenced an unresolved pick.
    ForwardReference,
}

impl PickSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickSource::Generated => "generated",
            PickSource::Observed => "observed",
            PickSource::Awarded => "awarded",
            PickSource::ForwardReference => "forward_reference",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "generated" => Some(PickSource::Generated),
            "observed" => Some(PickSource::Observed),
            "awarded" => Some(PickSource::Awarded),
            "forward_reference" => Some(PickSource::ForwardReference),
            _ => None,
        }
    }
}

/// Compensation details carried only by compensatory picks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensatoryMeta {
    /// Ledger record id of the award this pick came from, when known.
    pub award_ref: Option<u64>,
    pub triggering_player: Option<String>,
    pub recipient: Option<String>,
    /// Round implied by the triggering contract's AAV.
    pub implied_round: Option<u32>,
    /// Chronological sequence within (season, round), fixed at first observation.
    pub sequence: u32,
}

/// A single row of the canonical draft pick dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftPick {
    /// `{season}_{round}_{slot}`, or `{season}_{round}_TBD` for forward references.
    pub pick_id: String,
    pub season: i32,
    pub round: u32,
    /// Position within the round. Base picks use 1..=N, compensatory N+1..
    pub slot_number: Option<u32>,
    /// 1-based rank within the season. `None` until assembled, and always for TBD.
    pub overall_pick: Option<u32>,
    pub pick_type: PickType,
    pub lifecycle_state: LifecycleState,
    pub source: PickSource,
    /// Party the pick originally belongs to.
    pub owner: Option<String>,
    /// Player taken with the pick, for observed results.
    pub selection: Option<String>,
    pub compensation: Option<CompensatoryMeta>,
    /// Ledger record id that first referenced a TBD pick.
    pub first_seen_record: Option<u64>,
    pub superseded_by_pick_id: Option<String>,
    pub superseded_at: Option<DateTime<Utc>>,
}

pub fn pick_id(season: i32, round: u32, slot: u32) -> String {
    format!("{season}_{round}_{slot}")
}

pub fn tbd_pick_id(season: i32, round: u32) -> String {
    format!("{season}_{round}_TBD")
}

impl DraftPick {
    /// A generated base pick with no owner or selection.
    pub fn base(season: i32, round: u32, slot: u32) -> Self {
        DraftPick {
            pick_id: pick_id(season, round, slot),
            season,
            round,
            slot_number: Some(slot),
            overall_pick: None,
            pick_type: PickType::Base,
            lifecycle_state: LifecycleState::Actual,
            source: PickSource::Generated,
            owner: None,
            selection: None,
            compensation: None,
            first_seen_record: None,
            superseded_by_pick_id: None,
            superseded_at: None,
        }
    }

    /// An active forward reference for (season, round).
    pub fn tbd(season: i32, round: u32, owner: Option<String>, first_seen_record: u64) -> Self {
        DraftPick {
            pick_id: tbd_pick_id(season, round),
            season,
            round,
            slot_number: None,
            overall_pick: None,
            pick_type: PickType::Tbd,
            lifecycle_state: LifecycleState::ActiveTbd,
            source: PickSource::ForwardReference,
            owner,
            selection: None,
            compensation: None,
            first_seen_record: Some(first_seen_record),
            superseded_by_pick_id: None,
            superseded_at: None,
        }
    }

    /// Whether the pick belongs in the "active" view of the dimension.
    pub fn is_active(&self) -> bool {
        self.lifecycle_state != LifecycleState::Superseded
    }

    /// Whether the pick takes part in overall numbering.
    pub fn is_numbered(&self) -> bool {
        self.pick_type != PickType::Tbd
    }

    /// Sort key for numbering: (round, slot).
    pub fn round_slot(&self) -> (u32, u32) {
        (self.round, self.slot_number.unwrap_or(u32::MAX))
    }

    pub fn comp_sequence(&self) -> Option<u32> {
        self.compensation.as_ref().map(|c| c.sequence)
    }
}
