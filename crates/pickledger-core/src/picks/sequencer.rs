// Compensatory sequencer.
//
// Each award receives a chronological sequence within its (season, round) the
// first time it is observed. The stamp is stored and reused verbatim on every
// later rebuild, so neither edits to the source row nor late-arriving awards
// can reorder picks that were already sequenced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::LeagueConfig;
use crate::picks::awards::{AwardFormat, ParsedAward};
use crate::picks::pick::{
    pick_id, CompensatoryMeta, DraftPick, LifecycleState, PickSource, PickType,
};

/// Sequence assigned to an award at first observation. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardStamp {
    pub award_ref: u64,
    pub season: i32,
    pub round: u32,
    pub sequence: u32,
    /// Content hash of the award when it was stamped.
    pub content_hash: String,
    pub stamped_at: DateTime<Utc>,
}

/// A parsed award together with its immutable sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationAward {
    pub award_ref: u64,
    pub format: AwardFormat,
    pub season: i32,
    pub stated_round: u32,
    pub implied_round: Option<u32>,
    pub round_matches_threshold: bool,
    pub recipient: Option<String>,
    pub triggering_player: Option<String>,
    /// Rank among all awards in the same (season, round), fixed at first observation.
    pub sequence: u32,
    pub content_hash: String,
    /// The award's current content differs from what was stamped.
    pub content_drift: bool,
}

impl CompensationAward {
    fn from_parsed(parsed: &ParsedAward, sequence: u32, content_hash: String, drift: bool) -> Self {
        CompensationAward {
            award_ref: parsed.award_ref,
            format: parsed.format,
            season: parsed.season,
            stated_round: parsed.stated_round,
            implied_round: parsed.implied_round,
            round_matches_threshold: parsed.round_matches_threshold,
            recipient: parsed.recipient.clone(),
            triggering_player: parsed.triggering_player.clone(),
            sequence,
            content_hash,
            content_drift: drift,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StampOutcome {
    /// Every current award with its sequence, ordered by (season, round, sequence).
    pub awards: Vec<CompensationAward>,
    /// Stamps created in this pass; the caller persists them.
    pub new_stamps: Vec<AwardStamp>,
}

/// Attach sequences to `parsed`, reusing `existing` stamps and minting new
/// ones for awards seen for the first time.
///
/// New awards in a (season, round) continue after the highest sequence ever
/// stamped there, in ascending ledger record id. Sequences are never reused,
/// even when a stamped award has since vanished from the ledger.
pub fn stamp_awards(
    parsed: &[ParsedAward],
    existing: &[AwardStamp],
    as_of: DateTime<Utc>,
) -> StampOutcome {
    let by_key: HashMap<(u64, i32, u32), &AwardStamp> = existing
        .iter()
        .map(|s| ((s.award_ref, s.season, s.round), s))
        .collect();
    let stamped_refs: HashSet<u64> = existing.iter().map(|s| s.award_ref).collect();

    let mut next: HashMap<(i32, u32), u32> = HashMap::new();
    for stamp in existing {
        let slot = next.entry((stamp.season, stamp.round)).or_insert(0);
        *slot = (*slot).max(stamp.sequence);
    }

    let mut ordered: Vec<&ParsedAward> = parsed.iter().collect();
    ordered.sort_by_key(|a| a.award_ref);

    let mut outcome = StampOutcome::default();
    for award in ordered {
        let hash = award.content_hash();
        let key = (award.award_ref, award.season, award.stated_round);
        match by_key.get(&key) {
            Some(stamp) => {
                let drift = stamp.content_hash != hash;
                outcome
                    .awards
                    .push(CompensationAward::from_parsed(award, stamp.sequence, hash, drift));
            }
            None => {
                let last = next.entry((award.season, award.stated_round)).or_insert(0);
                *last += 1;
                let sequence = *last;
                // A ref stamped under a different (season, round) means the
                // award was re-keyed after first observation.
                let drift = stamped_refs.contains(&award.award_ref);
                outcome.new_stamps.push(AwardStamp {
                    award_ref: award.award_ref,
                    season: award.season,
                    round: award.stated_round,
                    sequence,
                    content_hash: hash.clone(),
                    stamped_at: as_of,
                });
                outcome
                    .awards
                    .push(CompensationAward::from_parsed(award, sequence, hash, drift));
            }
        }
    }

    outcome
        .awards
        .sort_by_key(|a| (a.season, a.stated_round, a.sequence, a.award_ref));
    outcome
}

/// Build compensatory picks for awards in resolved seasons.
///
/// Slots run contiguously from N+1 in sequence order; if a stamped award has
/// dropped out of the ledger the slots close up while each pick keeps its
/// stamped sequence.
pub fn compensatory_picks(awards: &[CompensationAward], league: &LeagueConfig) -> Vec<DraftPick> {
    let mut groups: BTreeMap<(i32, u32), Vec<&CompensationAward>> = BTreeMap::new();
    for award in awards.iter().filter(|a| league.is_resolved(a.season)) {
        groups
            .entry((award.season, award.stated_round))
            .or_default()
            .push(award);
    }

    let mut picks = Vec::new();
    for ((season, round), mut group) in groups {
        group.sort_by_key(|a| (a.sequence, a.award_ref));
        for (rank, award) in group.into_iter().enumerate() {
            let slot = league.num_teams + rank as u32 + 1;
            picks.push(DraftPick {
                pick_id: pick_id(season, round, slot),
                season,
                round,
                slot_number: Some(slot),
                overall_pick: None,
                pick_type: PickType::Compensatory,
                lifecycle_state: LifecycleState::Actual,
                source: PickSource::Awarded,
                owner: award.recipient.clone(),
                selection: None,
                compensation: Some(CompensatoryMeta {
                    award_ref: Some(award.award_ref),
                    triggering_player: award.triggering_player.clone(),
                    recipient: award.recipient.clone(),
                    implied_round: award.implied_round,
                    sequence: award.sequence,
                }),
                first_seen_record: None,
                superseded_by_pick_id: None,
                superseded_at: None,
            });
        }
    }
    picks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picks::awards::build_registry;
    use crate::picks::test_support::{as_of, league, signing};

    fn parsed(refs_and_text: &[(u64, &str)]) -> Vec<ParsedAward> {
        let league = league(12, 5, 2020, 2026, 2025);
        let txns: Vec<_> = refs_and_text
            .iter()
            .map(|(id, text)| signing(*id, "2023-03-01", text, Some(35.0)))
            .collect();
        build_registry(&txns, &league).awards
    }

    #[test]
    fn first_pass_ranks_by_record_id_within_season_round() {
        let awards = parsed(&[(30, "2024 1st"), (10, "2024 1st"), (20, "2024 2nd"), (40, "2024 1st")]);
        let outcome = stamp_awards(&awards, &[], as_of());

        let seq: Vec<(u64, u32, u32)> = outcome
            .awards
            .iter()
            .map(|a| (a.award_ref, a.stated_round, a.sequence))
            .collect();
        assert_eq!(seq, vec![(10, 1, 1), (30, 1, 2), (40, 1, 3), (20, 2, 1)]);
        assert_eq!(outcome.new_stamps.len(), 4);
        assert!(outcome.awards.iter().all(|a| !a.content_drift));
    }

    #[test]
    fn existing_stamps_are_reused() {
        let awards = parsed(&[(10, "2024 1st"), (30, "2024 1st")]);
        let first = stamp_awards(&awards, &[], as_of());

        let second = stamp_awards(&awards, &first.new_stamps, as_of());
        assert!(second.new_stamps.is_empty());
        assert_eq!(first.awards, second.awards);
    }

    #[test]
    fn late_arriving_earlier_record_does_not_reorder() {
        let awards = parsed(&[(10, "2024 1st"), (30, "2024 1st")]);
        let first = stamp_awards(&awards, &[], as_of());

        // Record 20 shows up later with a smaller id than 30.
        let grown = parsed(&[(10, "2024 1st"), (20, "2024 1st"), (30, "2024 1st")]);
        let second = stamp_awards(&grown, &first.new_stamps, as_of());

        let seq: HashMap<u64, u32> = second.awards.iter().map(|a| (a.award_ref, a.sequence)).collect();
        assert_eq!(seq[&10], 1);
        assert_eq!(seq[&30], 2);
        assert_eq!(seq[&20], 3);
        assert_eq!(second.new_stamps.len(), 1);
    }

    #[test]
    fn sequences_are_not_reused_after_an_award_disappears() {
        let awards = parsed(&[(10, "2024 1st"), (30, "2024 1st")]);
        let first = stamp_awards(&awards, &[], as_of());

        let shrunk = parsed(&[(30, "2024 1st"), (50, "2024 1st")]);
        let second = stamp_awards(&shrunk, &first.new_stamps, as_of());
        let seq: HashMap<u64, u32> = second.awards.iter().map(|a| (a.award_ref, a.sequence)).collect();
        assert_eq!(seq[&30], 2);
        assert_eq!(seq[&50], 3);
    }

    #[test]
    fn content_edits_keep_sequence_and_flag_drift() {
        let league = league(12, 5, 2020, 2026, 2025);
        let original = signing(10, "2023-03-01", "2024 1st", Some(35.0));
        let first = stamp_awards(
            &build_registry(&[original.clone()], &league).awards,
            &[],
            as_of(),
        );

        // Unrelated edit: no drift.
        let mut cosmetic = original.clone();
        cosmetic.sort_order = Some(-5);
        let again = stamp_awards(
            &build_registry(&[cosmetic], &league).awards,
            &first.new_stamps,
            as_of(),
        );
        assert_eq!(again.awards[0].sequence, 1);
        assert!(!again.awards[0].content_drift);

        // Substantive edit: same sequence, drift surfaced.
        let mut edited = original;
        edited.aav = Some(31.0);
        let drifted = stamp_awards(
            &build_registry(&[edited], &league).awards,
            &first.new_stamps,
            as_of(),
        );
        assert_eq!(drifted.awards[0].sequence, 1);
        assert!(drifted.awards[0].content_drift);
        assert!(drifted.new_stamps.is_empty());
    }

    #[test]
    fn rekeyed_award_gets_new_stamp_and_drift() {
        let first = stamp_awards(&parsed(&[(10, "2024 1st")]), &[], as_of());
        let moved = stamp_awards(&parsed(&[(10, "2024 2nd")]), &first.new_stamps, as_of());
        assert_eq!(moved.new_stamps.len(), 1);
        assert_eq!(moved.awards[0].stated_round, 2);
        assert_eq!(moved.awards[0].sequence, 1);
        assert!(moved.awards[0].content_drift);
    }

    #[test]
    fn picks_take_slots_after_base_picks() {
        let league = league(12, 5, 2020, 2026, 2025);
        let outcome = stamp_awards(
            &parsed(&[(10, "2024 1st"), (11, "2024 1st"), (12, "2024 3rd")]),
            &[],
            as_of(),
        );
        let picks = compensatory_picks(&outcome.awards, &league);

        let ids: Vec<&str> = picks.iter().map(|p| p.pick_id.as_str()).collect();
        assert_eq!(ids, vec!["2024_1_13", "2024_1_14", "2024_3_13"]);
        let meta = picks[1].compensation.as_ref().unwrap();
        assert_eq!(meta.sequence, 2);
        assert_eq!(meta.award_ref, Some(11));
        assert_eq!(picks[1].owner.as_deref(), Some("Owls"));
        assert!(picks.iter().all(|p| p.pick_type == PickType::Compensatory));
    }

    #[test]
    fn slots_close_up_over_sequence_gaps() {
        let league = league(12, 5, 2020, 2026, 2025);
        let first = stamp_awards(&parsed(&[(10, "2024 1st"), (20, "2024 1st")]), &[], as_of());
        let later = stamp_awards(&parsed(&[(20, "2024 1st")]), &first.new_stamps, as_of());
        let picks = compensatory_picks(&later.awards, &league);

        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].slot_number, Some(13));
        assert_eq!(picks[0].comp_sequence(), Some(2));
    }

    #[test]
    fn unresolved_seasons_produce_no_picks() {
        let league = league(12, 5, 2020, 2026, 2023);
        let outcome = stamp_awards(&parsed(&[(10, "2024 1st")]), &[], as_of());
        assert!(compensatory_picks(&outcome.awards, &league).is_empty());
    }
}
