// Transaction cross-reference resolver: maps the pick references recorded on
// ledger rows onto canonical pick identities.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ledger::TransactionRecord;
use crate::lifecycle::owner_candidates;
use crate::picks::assembler::PickDimension;
use crate::picks::pick::{tbd_pick_id, DraftPick};

/// A raw pick reference as the ledger states it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickReference {
    pub record_id: u64,
    pub season: i32,
    pub round: u32,
    pub slot: Option<u32>,
    pub overall: Option<u32>,
    /// Party the referenced pick belongs to: the stated original owner, else
    /// the party it moved away from.
    pub owner: Option<String>,
}

pub fn references_from_ledger(transactions: &[TransactionRecord]) -> Vec<PickReference> {
    let mut refs: Vec<PickReference> = transactions
        .iter()
        .filter_map(|t| {
            t.pick.as_ref().map(|h| PickReference {
                record_id: t.record_id,
                season: h.season,
                round: h.round,
                slot: h.slot,
                overall: h.overall,
                owner: h.original_owner.clone().or_else(|| t.from_party.clone()),
            })
        })
        .collect();
    refs.sort_by_key(|r| r.record_id);
    refs
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Overall,
    RoundSlot,
    Tbd,
    /// Forward reference whose placeholder belongs to another party, matched
    /// to the reference owner's own pick in the round.
    Owner,
    Unresolved,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::Overall => "overall",
            MatchMethod::RoundSlot => "round_slot",
            MatchMethod::Tbd => "tbd",
            MatchMethod::Owner => "owner",
            MatchMethod::Unresolved => "unresolved",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReference {
    pub reference: PickReference,
    /// Pick the reference landed on, before following supersession.
    pub matched_pick_id: Option<String>,
    /// Current canonical identity. `None` when unresolvable.
    pub canonical_pick_id: Option<String>,
    pub method: MatchMethod,
    pub notes: Vec<String>,
}

/// Follow `superseded_by_pick_id` to the live identity.
fn canonical(dimension: &PickDimension, pick: &DraftPick) -> String {
    let mut current = pick;
    let mut hops = 0;
    while let Some(next) = current
        .superseded_by_pick_id
        .as_deref()
        .filter(|_| !current.is_active())
    {
        match dimension.get(next) {
            Some(p) if hops < dimension.picks.len() => {
                current = p;
                hops += 1;
            }
            _ => return next.to_string(),
        }
    }
    current.pick_id.clone()
}

/// Resolve a forward reference via its (season, round) placeholder. The
/// placeholder carries the owner of its first sighting; a reference held by
/// anyone else must land on that party's own pick, never on the placeholder
/// owner's replacement.
fn through_placeholder<'a>(
    reference: &PickReference,
    tbd: &'a DraftPick,
    dimension: &'a PickDimension,
    notes: &mut Vec<String>,
) -> Option<(&'a DraftPick, MatchMethod)> {
    let (Some(mine), Some(held)) = (reference.owner.as_deref(), tbd.owner.as_deref()) else {
        return Some((tbd, MatchMethod::Tbd));
    };
    if mine == held {
        return Some((tbd, MatchMethod::Tbd));
    }

    let found = owner_candidates(reference.season, reference.round, mine, dimension);
    match found.as_slice() {
        [only] => {
            notes.push(format!(
                "owner_mismatch: {} is held for {held}; matched {mine}'s pick",
                tbd.pick_id
            ));
            Some((*only, MatchMethod::Owner))
        }
        [] if tbd.is_active() => {
            notes.push(format!(
                "owner_mismatch: {} is held for {held}; {mine}'s pick not yet drafted",
                tbd.pick_id
            ));
            Some((tbd, MatchMethod::Tbd))
        }
        many => {
            notes.push(format!(
                "owner_mismatch: {} is held for {held}; {} candidate picks for {mine}",
                tbd.pick_id,
                many.len()
            ));
            None
        }
    }
}

fn resolve_one(reference: &PickReference, dimension: &PickDimension) -> CrossReference {
    let mut notes = Vec::new();

    let mut hit: Option<(&DraftPick, MatchMethod)> = None;
    if let Some(overall) = reference.overall {
        match dimension.by_overall(reference.season, overall) {
            Some(p) => {
                if p.round != reference.round {
                    notes.push(format!(
                        "round_drift: stated round {}, overall {} is in round {}",
                        reference.round, overall, p.round
                    ));
                }
                hit = Some((p, MatchMethod::Overall));
            }
            None => notes.push(format!(
                "no pick at overall {} in {}",
                overall, reference.season
            )),
        }
    }
    if hit.is_none() {
        if let Some(slot) = reference.slot {
            if let Some(p) = dimension.by_round_slot(reference.season, reference.round, slot) {
                notes.push("matched on round and slot".to_string());
                hit = Some((p, MatchMethod::RoundSlot));
            }
        }
    }
    if hit.is_none() && reference.slot.is_none() && reference.overall.is_none() {
        if let Some(tbd) = dimension.get(&tbd_pick_id(reference.season, reference.round)) {
            hit = through_placeholder(reference, tbd, dimension, &mut notes);
        }
    }

    match hit {
        Some((pick, method)) => CrossReference {
            reference: reference.clone(),
            matched_pick_id: Some(pick.pick_id.clone()),
            canonical_pick_id: Some(canonical(dimension, pick)),
            method,
            notes,
        },
        None => {
            notes.push("unresolvable pick reference".to_string());
            CrossReference {
                reference: reference.clone(),
                matched_pick_id: None,
                canonical_pick_id: None,
                method: MatchMethod::Unresolved,
                notes,
            }
        }
    }
}

pub fn resolve_references(references: &[PickReference], dimension: &PickDimension) -> Vec<CrossReference> {
    let rows: Vec<CrossReference> = references
        .iter()
        .map(|r| resolve_one(r, dimension))
        .collect();

    let unresolved = rows
        .iter()
        .filter(|r| r.method == MatchMethod::Unresolved)
        .count();
    if unresolved > 0 {
        warn!("{} of {} pick references are unresolvable", unresolved, rows.len());
    }
    info!("resolved {} pick references", rows.len() - unresolved);
    rows
}
