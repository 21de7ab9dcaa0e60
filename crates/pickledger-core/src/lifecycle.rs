// Lifecycle controller for forward-reference (TBD) picks.
//
// State lives in an append-only event log. A placeholder is created once, at
// first observation, and may later be superseded by exactly one actual pick.
// Superseded rows stay in the dimension; only the active view drops them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::config::LeagueConfig;
use crate::error::EngineError;
use crate::picks::assembler::PickDimension;
use crate::picks::pick::{DraftPick, LifecycleState, PickSource, PickType};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    PickCreated {
        pick_id: String,
        season: i32,
        round: u32,
        /// Party holding the reference when it was first seen.
        owner: Option<String>,
        first_seen_record: u64,
        at: DateTime<Utc>,
    },
    PickSuperseded {
        pick_id: String,
        superseded_by: String,
        at: DateTime<Utc>,
    },
}

impl LifecycleEvent {
    pub fn pick_id(&self) -> &str {
        match self {
            LifecycleEvent::PickCreated { pick_id, .. } => pick_id,
            LifecycleEvent::PickSuperseded { pick_id, .. } => pick_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleEvent::PickCreated { .. } => "pick_created",
            LifecycleEvent::PickSuperseded { .. } => "pick_superseded",
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            LifecycleEvent::PickCreated { at, .. } => *at,
            LifecycleEvent::PickSuperseded { at, .. } => *at,
        }
    }
}

/// Append-only log of lifecycle events.
///
/// Events loaded from the store are "persisted"; everything appended in this
/// run is pending until the caller writes it out.
#[derive(Debug, Clone, Default)]
pub struct LifecycleLog {
    events: Vec<LifecycleEvent>,
    persisted: usize,
}

impl LifecycleLog {
    pub fn from_events(events: Vec<LifecycleEvent>) -> Self {
        let persisted = events.len();
        LifecycleLog { events, persisted }
    }

    pub fn events(&self) -> &[LifecycleEvent] {
        &self.events
    }

    /// Events appended since the log was loaded.
    pub fn pending(&self) -> &[LifecycleEvent] {
        &self.events[self.persisted..]
    }

    fn state_of(&self, pick_id: &str) -> Option<LifecycleState> {
        let mut state = None;
        for event in self.events.iter().filter(|e| e.pick_id() == pick_id) {
            state = match event {
                LifecycleEvent::PickCreated { .. } => state.or(Some(LifecycleState::ActiveTbd)),
                LifecycleEvent::PickSuperseded { .. } => Some(LifecycleState::Superseded),
            };
        }
        state
    }

    /// Append a creation event unless the placeholder already exists. The
    /// first observation's owner and record are kept for good.
    pub fn record_created(&mut self, pick: &DraftPick, at: DateTime<Utc>) -> bool {
        if self.state_of(&pick.pick_id).is_some() {
            return false;
        }
        self.events.push(LifecycleEvent::PickCreated {
            pick_id: pick.pick_id.clone(),
            season: pick.season,
            round: pick.round,
            owner: pick.owner.clone(),
            first_seen_record: pick.first_seen_record.unwrap_or(0),
            at,
        });
        true
    }

    /// Append a supersession. Returns `Ok(false)` when the placeholder is
    /// already superseded.
    pub fn supersede(&mut self, pick_id: &str, by: &str, at: DateTime<Utc>) -> Result<bool, EngineError> {
        match self.state_of(pick_id) {
            None => Err(EngineError::UnknownLifecyclePick {
                pick_id: pick_id.to_string(),
            }),
            Some(LifecycleState::Superseded) => Ok(false),
            Some(_) => {
                self.events.push(LifecycleEvent::PickSuperseded {
                    pick_id: pick_id.to_string(),
                    superseded_by: by.to_string(),
                    at,
                });
                Ok(true)
            }
        }
    }

    /// Current placeholder rows, folded from the log in (season, round) order.
    pub fn tbd_picks(&self) -> Result<Vec<DraftPick>, EngineError> {
        let mut picks: BTreeMap<String, DraftPick> = BTreeMap::new();
        for event in &self.events {
            match event {
                LifecycleEvent::PickCreated {
                    pick_id,
                    season,
                    round,
                    owner,
                    first_seen_record,
                    ..
                } => {
                    picks.entry(pick_id.clone()).or_insert_with(|| {
                        DraftPick::tbd(*season, *round, owner.clone(), *first_seen_record)
                    });
                }
                LifecycleEvent::PickSuperseded {
                    pick_id,
                    superseded_by,
                    at,
                } => {
                    let pick = picks
                        .get_mut(pick_id)
                        .ok_or_else(|| EngineError::UnknownLifecyclePick {
                            pick_id: pick_id.clone(),
                        })?;
                    // Terminal: a second supersession never rewrites the first.
                    if pick.lifecycle_state != LifecycleState::Superseded {
                        pick.lifecycle_state = LifecycleState::Superseded;
                        pick.superseded_by_pick_id = Some(superseded_by.clone());
                        pick.superseded_at = Some(*at);
                    }
                }
            }
        }
        let mut out: Vec<DraftPick> = picks.into_values().collect();
        out.sort_by_key(|p| (p.season, p.round));
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum LifecycleIssueKind {
    /// No actual pick of the owner exists in the placeholder's round.
    TbdUnmatched,
    /// Several of the owner's actual picks could replace the placeholder.
    TbdAmbiguous { candidates: Vec<String> },
    /// The placeholder was created without a known owner.
    TbdWithoutOwner,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleIssue {
    pub pick_id: String,
    pub kind: LifecycleIssueKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleReport {
    pub created: Vec<String>,
    /// (placeholder, replacement) pairs superseded in this run.
    pub superseded: Vec<(String, String)>,
    pub issues: Vec<LifecycleIssue>,
}

/// Record every newly extracted placeholder in the log.
pub fn observe(log: &mut LifecycleLog, extracted: &[DraftPick], as_of: DateTime<Utc>) -> Vec<String> {
    let mut created = Vec::new();
    for pick in extracted.iter().filter(|p| p.pick_type == PickType::Tbd) {
        if log.record_created(pick, as_of) {
            debug!("new forward reference {}", pick.pick_id);
            created.push(pick.pick_id.clone());
        }
    }
    created
}

/// The owner's observed picks in (season, round) that could stand in for a
/// forward reference. Base picks win over compensatory ones when both exist.
pub(crate) fn owner_candidates<'a>(
    season: i32,
    round: u32,
    owner: &str,
    dimension: &'a PickDimension,
) -> Vec<&'a DraftPick> {
    let owned: Vec<&DraftPick> = dimension
        .picks
        .iter()
        .filter(|p| {
            p.season == season
                && p.round == round
                && p.is_numbered()
                && p.source == PickSource::Observed
                && p.owner.as_deref() == Some(owner)
        })
        .collect();
    let base: Vec<&DraftPick> = owned
        .iter()
        .copied()
        .filter(|p| p.pick_type == PickType::Base)
        .collect();
    if base.is_empty() {
        owned
    } else {
        base
    }
}

/// Supersede every active placeholder that has exactly one qualifying actual
/// pick. Unmatched placeholders are reported only once their season is
/// resolved; before that they are simply still pending.
pub fn resolve(
    log: &mut LifecycleLog,
    dimension: &PickDimension,
    league: &LeagueConfig,
    as_of: DateTime<Utc>,
) -> Result<LifecycleReport, EngineError> {
    let mut report = LifecycleReport::default();

    for tbd in log.tbd_picks()?.into_iter().filter(|p| p.is_active()) {
        let resolved = league.is_resolved(tbd.season);
        let Some(owner) = tbd.owner.as_deref() else {
            if resolved {
                report.issues.push(LifecycleIssue {
                    pick_id: tbd.pick_id.clone(),
                    kind: LifecycleIssueKind::TbdWithoutOwner,
                });
            }
            continue;
        };

        let found = owner_candidates(tbd.season, tbd.round, owner, dimension);
        match found.as_slice() {
            [only] => {
                if log.supersede(&tbd.pick_id, &only.pick_id, as_of)? {
                    info!("{} superseded by {}", tbd.pick_id, only.pick_id);
                    report
                        .superseded
                        .push((tbd.pick_id.clone(), only.pick_id.clone()));
                }
            }
            [] => {
                if resolved {
                    report.issues.push(LifecycleIssue {
                        pick_id: tbd.pick_id.clone(),
                        kind: LifecycleIssueKind::TbdUnmatched,
                    });
                }
            }
            many => {
                let ids: Vec<String> = many.iter().map(|p| p.pick_id.clone()).collect();
                warn!(
                    "{} owned by {} has {} candidate replacements: {:?}",
                    tbd.pick_id,
                    owner,
                    ids.len(),
                    ids
                );
                report.issues.push(LifecycleIssue {
                    pick_id: tbd.pick_id.clone(),
                    kind: LifecycleIssueKind::TbdAmbiguous { candidates: ids },
                });
            }
        }
    }

    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
