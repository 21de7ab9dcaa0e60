// Pick assembler: unions base, compensatory, and TBD picks per season and
// assigns overall numbers across variable-length rounds.
//
// Rounds of a resolved season that have actual draft results are built from
// those results; every other round uses the generated base slate plus the
// sequenced compensatory picks.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::config::LeagueConfig;
use crate::error::EngineError;
use crate::ledger::DraftResult;
use crate::picks::pick::{
    pick_id, CompensatoryMeta, DraftPick, LifecycleState, PickSource, PickType,
};
use crate::picks::sequencer::CompensationAward;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Everything the assembler consumes for one rebuild.
#[derive(Debug, Clone, Default)]
pub struct AssemblyInput<'a> {
    pub base: Vec<DraftPick>,
    pub compensatory: Vec<DraftPick>,
    pub tbd: Vec<DraftPick>,
    pub results: &'a [DraftResult],
    pub awards: &'a [CompensationAward],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum RoundIssueKind {
    /// Fewer than N observed base rows; the listed slots were synthesized.
    IncompleteBaseData { observed: u32, synthesized: Vec<u32> },
    /// Observed compensatory slots do not run contiguously from N+1.
    CompensatoryGap { slots: Vec<u32> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundIssue {
    pub season: i32,
    pub round: u32,
    pub kind: RoundIssueKind,
}

/// The canonical draft pick dimension produced by one rebuild.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PickDimension {
    /// Ordered by season, then numbered picks by overall, then TBD picks.
    pub picks: Vec<DraftPick>,
    pub round_issues: Vec<RoundIssue>,
    index: HashMap<String, usize>,
}

impl PickDimension {
    fn from_parts(picks: Vec<DraftPick>, round_issues: Vec<RoundIssue>) -> Result<Self, EngineError> {
        let mut index = HashMap::with_capacity(picks.len());
        for (i, pick) in picks.iter().enumerate() {
            if index.insert(pick.pick_id.clone(), i).is_some() {
                return Err(EngineError::DuplicateIdentity {
                    pick_id: pick.pick_id.clone(),
                });
            }
        }
        Ok(PickDimension {
            picks,
            round_issues,
            index,
        })
    }

    pub fn get(&self, pick_id: &str) -> Option<&DraftPick> {
        self.index.get(pick_id).map(|&i| &self.picks[i])
    }

    /// The active view: every pick except superseded placeholders.
    pub fn active(&self) -> impl Iterator<Item = &DraftPick> {
        self.picks.iter().filter(|p| p.is_active())
    }

    pub fn season(&self, season: i32) -> impl Iterator<Item = &DraftPick> {
        self.picks.iter().filter(move |p| p.season == season)
    }

    pub fn compensatory(&self) -> Vec<DraftPick> {
        self.picks
            .iter()
            .filter(|p| p.pick_type == PickType::Compensatory)
            .cloned()
            .collect()
    }

    pub fn by_overall(&self, season: i32, overall: u32) -> Option<&DraftPick> {
        self.picks
            .iter()
            .find(|p| p.season == season && p.overall_pick == Some(overall))
    }

    pub fn by_round_slot(&self, season: i32, round: u32, slot: u32) -> Option<&DraftPick> {
        self.get(&pick_id(season, round, slot))
    }

    pub fn is_incomplete_base(&self, season: i32, round: u32) -> bool {
        self.round_issues.iter().any(|i| {
            i.season == season
                && i.round == round
                && matches!(i.kind, RoundIssueKind::IncompleteBaseData { .. })
        })
    }

    /// Swap in a fresh set of TBD rows (after lifecycle transitions), keeping
    /// the numbered picks untouched.
    pub fn replace_tbd(&mut self, tbd: Vec<DraftPick>) -> Result<(), EngineError> {
        let mut picks: Vec<DraftPick> = std::mem::take(&mut self.picks)
            .into_iter()
            .filter(|p| p.is_numbered())
            .collect();
        picks.extend(tbd);
        sort_dimension(&mut picks);
        let issues = std::mem::take(&mut self.round_issues);
        *self = PickDimension::from_parts(picks, issues)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Overall numbering
// ---------------------------------------------------------------------------

/// Rank one season's numbered picks by (round, slot), 1-based. TBD picks are
/// left unranked. Compensatory picks in earlier rounds push every later round
/// down by their count.
pub fn assign_overall(season_picks: &mut [DraftPick]) {
    let mut order: Vec<usize> = (0..season_picks.len())
        .filter(|&i| season_picks[i].is_numbered())
        .collect();
    order.sort_by_key(|&i| season_picks[i].round_slot());
    for (rank, i) in order.into_iter().enumerate() {
        season_picks[i].overall_pick = Some(rank as u32 + 1);
    }
    for pick in season_picks.iter_mut().filter(|p| !p.is_numbered()) {
        pick.overall_pick = None;
    }
}

/// Check the numbering invariants for one season: overall is contiguous from
/// 1 and strictly increasing under (round, slot) order.
pub fn verify_season_numbering(season: i32, season_picks: &[DraftPick]) -> Result<(), EngineError> {
    let mut numbered: Vec<&DraftPick> = season_picks.iter().filter(|p| p.is_numbered()).collect();
    numbered.sort_by_key(|p| p.round_slot());

    let mut previous_slot: Option<(u32, u32)> = None;
    for (i, pick) in numbered.iter().enumerate() {
        let expected = i as u32 + 1;
        if pick.overall_pick != Some(expected) {
            return Err(EngineError::NumberingViolation {
                season,
                detail: format!(
                    "{} has overall {:?}, expected {}",
                    pick.pick_id, pick.overall_pick, expected
                ),
            });
        }
        if previous_slot == Some(pick.round_slot()) {
            return Err(EngineError::NumberingViolation {
                season,
                detail: format!("{} shares (round, slot) with its predecessor", pick.pick_id),
            });
        }
        previous_slot = Some(pick.round_slot());
    }
    if let Some(tbd) = season_picks
        .iter()
        .find(|p| !p.is_numbered() && p.overall_pick.is_some())
    {
        return Err(EngineError::NumberingViolation {
            season,
            detail: format!("placeholder {} carries an overall number", tbd.pick_id),
        });
    }
    Ok(())
}

fn sort_dimension(picks: &mut [DraftPick]) {
    picks.sort_by(|a, b| {
        (a.season, !a.is_numbered(), a.round_slot(), &a.pick_id).cmp(&(
            b.season,
            !b.is_numbered(),
            b.round_slot(),
            &b.pick_id,
        ))
    });
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

fn observed_pick(result: &DraftResult, pick_type: PickType, compensation: Option<CompensatoryMeta>) -> DraftPick {
    DraftPick {
        pick_id: pick_id(result.season, result.round, result.slot),
        season: result.season,
        round: result.round,
        slot_number: Some(result.slot),
        overall_pick: None,
        pick_type,
        lifecycle_state: LifecycleState::Actual,
        source: PickSource::Observed,
        owner: Some(result.owner().to_string()),
        selection: result
            .player_name
            .clone()
            .or_else(|| result.player_id.clone()),
        compensation,
        first_seen_record: None,
        superseded_by_pick_id: None,
        superseded_at: None,
    }
}

/// Award metadata for an observed compensatory selection: by the result's
/// award reference, else by (season, round, sequence).
fn observed_meta(
    result: &DraftResult,
    sequence: u32,
    by_ref: &HashMap<u64, &CompensationAward>,
    by_position: &HashMap<(i32, u32, u32), &CompensationAward>,
) -> CompensatoryMeta {
    let award = match result.award_ref {
        Some(r) => by_ref.get(&r).copied(),
        None => by_position
            .get(&(result.season, result.round, sequence))
            .copied(),
    };
    CompensatoryMeta {
        award_ref: result.award_ref,
        triggering_player: award.and_then(|a| a.triggering_player.clone()),
        recipient: award.and_then(|a| a.recipient.clone()),
        implied_round: award.and_then(|a| a.implied_round),
        sequence,
    }
}

/// Build the round from actual results. Base slots missing from the results
/// are filled from the generated baseline and the round is flagged.
#[allow(clippy::too_many_arguments)]
fn observed_round(
    season: i32,
    round: u32,
    rows: &[&DraftResult],
    baseline: &BTreeMap<(i32, u32, u32), DraftPick>,
    league: &LeagueConfig,
    by_ref: &HashMap<u64, &CompensationAward>,
    by_position: &HashMap<(i32, u32, u32), &CompensationAward>,
    issues: &mut Vec<RoundIssue>,
) -> Result<Vec<DraftPick>, EngineError> {
    let n = league.num_teams;
    let mut picks = Vec::new();

    let mut observed_base: BTreeMap<u32, &DraftResult> = BTreeMap::new();
    for result in rows.iter().filter(|r| r.slot <= n) {
        if observed_base.insert(result.slot, *result).is_some() {
            return Err(EngineError::DuplicateIdentity {
                pick_id: pick_id(season, round, result.slot),
            });
        }
    }
    let mut synthesized = Vec::new();
    for slot in 1..=n {
        match observed_base.get(&slot) {
            Some(result) => picks.push(observed_pick(result, PickType::Base, None)),
            None => {
                synthesized.push(slot);
                let fallback = baseline
                    .get(&(season, round, slot))
                    .cloned()
                    .unwrap_or_else(|| DraftPick::base(season, round, slot));
                picks.push(fallback);
            }
        }
    }
    if !synthesized.is_empty() {
        warn!(
            "season {} round {}: {} of {} base picks observed; synthesized slots {:?}",
            season,
            round,
            observed_base.len(),
            n,
            synthesized
        );
        issues.push(RoundIssue {
            season,
            round,
            kind: RoundIssueKind::IncompleteBaseData {
                observed: observed_base.len() as u32,
                synthesized,
            },
        });
    }

    let mut comp_slots: Vec<u32> = rows.iter().filter(|r| r.slot > n).map(|r| r.slot).collect();
    comp_slots.sort_unstable();
    let contiguous = comp_slots
        .iter()
        .enumerate()
        .all(|(i, &slot)| slot == n + i as u32 + 1);
    if !contiguous {
        warn!(
            "season {} round {}: compensatory slots {:?} are not contiguous from {}",
            season,
            round,
            comp_slots,
            n + 1
        );
        issues.push(RoundIssue {
            season,
            round,
            kind: RoundIssueKind::CompensatoryGap { slots: comp_slots },
        });
    }
    for result in rows.iter().filter(|r| r.slot > n) {
        let sequence = result.slot - n;
        let meta = observed_meta(result, sequence, by_ref, by_position);
        picks.push(observed_pick(result, PickType::Compensatory, Some(meta)));
    }

    Ok(picks)
}

/// Assemble the canonical dimension.
///
/// Fails on duplicate identities or broken numbering; never publishes a
/// partially consistent dimension.
pub fn assemble(input: AssemblyInput<'_>, league: &LeagueConfig) -> Result<PickDimension, EngineError> {
    let in_range = |season: i32| league.seasons().contains(&season);

    let mut baseline: BTreeMap<(i32, u32, u32), DraftPick> = BTreeMap::new();
    for pick in input.base {
        let key = (pick.season, pick.round, pick.slot_number.unwrap_or(0));
        if baseline.insert(key, pick.clone()).is_some() {
            return Err(EngineError::DuplicateIdentity {
                pick_id: pick.pick_id,
            });
        }
    }

    // Results grouped by (season, round), resolved seasons only.
    let mut observed: BTreeMap<(i32, u32), Vec<&DraftResult>> = BTreeMap::new();
    for result in input.results {
        if !league.is_resolved(result.season) || !in_range(result.season) {
            warn!(
                "ignoring draft result {}_{}_{}: season outside the resolved range",
                result.season, result.round, result.slot
            );
            continue;
        }
        if result.round > league.num_rounds {
            warn!(
                "ignoring draft result {}_{}_{}: round exceeds configured {} rounds",
                result.season, result.round, result.slot, league.num_rounds
            );
            continue;
        }
        observed
            .entry((result.season, result.round))
            .or_default()
            .push(result);
    }

    let by_ref: HashMap<u64, &CompensationAward> =
        input.awards.iter().map(|a| (a.award_ref, a)).collect();
    let by_position: HashMap<(i32, u32, u32), &CompensationAward> = input
        .awards
        .iter()
        .map(|a| ((a.season, a.stated_round, a.sequence), a))
        .collect();

    let mut comp_by_round: BTreeMap<(i32, u32), Vec<DraftPick>> = BTreeMap::new();
    for pick in input.compensatory {
        if !in_range(pick.season) {
            warn!("ignoring compensatory pick {}: season outside configured range", pick.pick_id);
            continue;
        }
        comp_by_round
            .entry((pick.season, pick.round))
            .or_default()
            .push(pick);
    }

    let mut seasons: BTreeSet<i32> = league.seasons().collect();
    seasons.extend(input.tbd.iter().map(|p| p.season));

    let mut issues = Vec::new();
    let mut all = Vec::with_capacity(baseline.len() + input.tbd.len());
    for season in seasons {
        let mut season_picks = Vec::new();
        if in_range(season) {
            for round in 1..=league.num_rounds {
                match observed.get(&(season, round)) {
                    Some(rows) => season_picks.extend(observed_round(
                        season,
                        round,
                        rows,
                        &baseline,
                        league,
                        &by_ref,
                        &by_position,
                        &mut issues,
                    )?),
                    None => {
                        season_picks.extend(
                            baseline
                                .range((season, round, 0)..=(season, round, u32::MAX))
                                .map(|(_, p)| p.clone()),
                        );
                        if let Some(comp) = comp_by_round.remove(&(season, round)) {
                            season_picks.extend(comp);
                        }
                    }
                }
            }
        }
        season_picks.extend(input.tbd.iter().filter(|p| p.season == season).cloned());

        assign_overall(&mut season_picks);
        verify_season_numbering(season, &season_picks)?;
        verify_base_slate(season, &season_picks, league)?;
        debug!(
            "season {}: {} numbered picks, {} placeholders",
            season,
            season_picks.iter().filter(|p| p.is_numbered()).count(),
            season_picks.iter().filter(|p| !p.is_numbered()).count()
        );
        all.extend(season_picks);
    }

    sort_dimension(&mut all);
    PickDimension::from_parts(all, issues)
}

/// Resolved seasons must carry exactly N base picks in every round.
fn verify_base_slate(season: i32, season_picks: &[DraftPick], league: &LeagueConfig) -> Result<(), EngineError> {
    if !league.is_resolved(season) {
        return Ok(());
    }
    for round in 1..=league.num_rounds {
        let found = season_picks
            .iter()
            .filter(|p| p.round == round && p.pick_type == PickType::Base)
            .count();
        if found != league.num_teams as usize {
            return Err(EngineError::BaseSlateViolation {
                season,
                round,
                found,
                expected: league.num_teams,
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picks::base::generate_base_picks;
    use crate::picks::sequencer::compensatory_picks;
    use crate::picks::test_support::{awards_for, league, result};
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn overall_of(dim: &PickDimension, id: &str) -> Option<u32> {
        dim.get(id).and_then(|p| p.overall_pick)
    }

    #[test]
    fn five_round_one_awards_shift_round_two() {
        let league = league(12, 5, 2024, 2024, 2024);
        let awards = awards_for(&[(2024, 1); 5]);
        let input = AssemblyInput {
            base: generate_base_picks(&league),
            compensatory: compensatory_picks(&awards, &league),
            awards: &awards,
            ..Default::default()
        };
        let dim = assemble(input, &league).unwrap();

        let round_one: Vec<&DraftPick> = dim.season(2024).filter(|p| p.round == 1).collect();
        assert_eq!(round_one.len(), 17);
        assert_eq!(overall_of(&dim, "2024_1_1"), Some(1));
        assert_eq!(overall_of(&dim, "2024_1_13"), Some(13));
        assert_eq!(overall_of(&dim, "2024_1_17"), Some(17));
        assert_eq!(overall_of(&dim, "2024_2_1"), Some(18));
        assert_eq!(overall_of(&dim, "2024_5_12"), Some(65));

        let seqs: Vec<u32> = round_one.iter().filter_map(|p| p.comp_sequence()).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn compensatory_picks_in_several_rounds_accumulate() {
        let league = league(4, 3, 2024, 2024, 2024);
        let awards = awards_for(&[(2024, 1), (2024, 2), (2024, 2)]);
        let input = AssemblyInput {
            base: generate_base_picks(&league),
            compensatory: compensatory_picks(&awards, &league),
            awards: &awards,
            ..Default::default()
        };
        let dim = assemble(input, &league).unwrap();

        // Round 1: 4 base + 1 comp = 5; round 2: 4 base + 2 comp = 6.
        assert_eq!(overall_of(&dim, "2024_1_5"), Some(5));
        assert_eq!(overall_of(&dim, "2024_2_1"), Some(6));
        assert_eq!(overall_of(&dim, "2024_2_6"), Some(11));
        assert_eq!(overall_of(&dim, "2024_3_1"), Some(12));
        assert_eq!(overall_of(&dim, "2024_3_4"), Some(15));
    }

    #[test]
    fn short_observed_round_synthesizes_missing_base_slot() {
        let league = league(12, 2, 2024, 2024, 2024);
        // 11 base rows (slot 7 missing) plus a compensatory selection at 13.
        let mut results: Vec<DraftResult> = (1..=12)
            .filter(|s| *s != 7)
            .map(|s| result(2024, 1, s, "Hawks"))
            .collect();
        results.push(result(2024, 1, 13, "Owls"));

        let input = AssemblyInput {
            base: generate_base_picks(&league),
            results: &results,
            ..Default::default()
        };
        let dim = assemble(input, &league).unwrap();

        assert!(dim.is_incomplete_base(2024, 1));
        assert!(!dim.is_incomplete_base(2024, 2));

        let synthesized = dim.get("2024_1_7").unwrap();
        assert_eq!(synthesized.pick_type, PickType::Base);
        assert_eq!(synthesized.source, PickSource::Generated);

        let thirteenth = dim.get("2024_1_13").unwrap();
        assert_eq!(thirteenth.pick_type, PickType::Compensatory);
        assert_eq!(thirteenth.source, PickSource::Observed);
        assert_eq!(thirteenth.overall_pick, Some(13));

        let base_count = dim
            .season(2024)
            .filter(|p| p.round == 1 && p.pick_type == PickType::Base)
            .count();
        assert_eq!(base_count, 12);

        match &dim.round_issues[0].kind {
            RoundIssueKind::IncompleteBaseData {
                observed,
                synthesized,
            } => {
                assert_eq!(*observed, 11);
                assert_eq!(synthesized, &vec![7]);
            }
            other => panic!("expected IncompleteBaseData, got {other:?}"),
        }
    }

    #[test]
    fn observed_compensatory_pick_joins_award_metadata() {
        let league = league(2, 1, 2024, 2024, 2024);
        let awards = awards_for(&[(2024, 1), (2024, 1)]);
        let mut by_ref = result(2024, 1, 3, "Owls");
        by_ref.award_ref = Some(awards[0].award_ref);
        let by_position = result(2024, 1, 4, "Bears");
        let results = vec![
            result(2024, 1, 1, "Hawks"),
            result(2024, 1, 2, "Bears"),
            by_ref,
            by_position,
        ];
        let input = AssemblyInput {
            base: generate_base_picks(&league),
            results: &results,
            awards: &awards,
            ..Default::default()
        };
        let dim = assemble(input, &league).unwrap();

        let first = dim.get("2024_1_3").unwrap().compensation.clone().unwrap();
        assert_eq!(first.award_ref, Some(awards[0].award_ref));
        assert_eq!(first.sequence, 1);
        assert_eq!(first.triggering_player, awards[0].triggering_player);

        let second = dim.get("2024_1_4").unwrap().compensation.clone().unwrap();
        assert_eq!(second.award_ref, None);
        assert_eq!(second.sequence, 2);
        assert_eq!(second.recipient, awards[1].recipient);
    }

    #[test]
    fn observed_round_replaces_awarded_picks() {
        let league = league(2, 1, 2024, 2024, 2024);
        let awards = awards_for(&[(2024, 1), (2024, 1)]);
        // Results show only one compensatory selection.
        let results = vec![
            result(2024, 1, 1, "Hawks"),
            result(2024, 1, 2, "Bears"),
            result(2024, 1, 3, "Owls"),
        ];
        let input = AssemblyInput {
            base: generate_base_picks(&league),
            compensatory: compensatory_picks(&awards, &league),
            results: &results,
            awards: &awards,
            ..Default::default()
        };
        let dim = assemble(input, &league).unwrap();
        assert!(dim.get("2024_1_4").is_none());
        assert_eq!(dim.compensatory().len(), 1);
    }

    #[test]
    fn compensatory_gap_is_flagged_not_renumbered() {
        let league = league(2, 1, 2024, 2024, 2024);
        let results = vec![
            result(2024, 1, 1, "Hawks"),
            result(2024, 1, 2, "Bears"),
            result(2024, 1, 4, "Owls"),
        ];
        let input = AssemblyInput {
            base: generate_base_picks(&league),
            results: &results,
            ..Default::default()
        };
        let dim = assemble(input, &league).unwrap();
        assert_eq!(overall_of(&dim, "2024_1_4"), Some(3));
        assert!(dim.round_issues.iter().any(|i| matches!(
            &i.kind,
            RoundIssueKind::CompensatoryGap { slots } if slots == &vec![4]
        )));
    }

    #[test]
    fn compensatory_rows_out_of_file_order_are_contiguous() {
        let league = league(2, 1, 2024, 2024, 2024);
        let results = vec![
            result(2024, 1, 4, "Owls"),
            result(2024, 1, 1, "Hawks"),
            result(2024, 1, 3, "Bears"),
            result(2024, 1, 2, "Bears"),
        ];
        let input = AssemblyInput {
            base: generate_base_picks(&league),
            results: &results,
            ..Default::default()
        };
        let dim = assemble(input, &league).unwrap();
        assert!(dim.round_issues.is_empty(), "{:?}", dim.round_issues);
        assert_eq!(overall_of(&dim, "2024_1_3"), Some(3));
        assert_eq!(overall_of(&dim, "2024_1_4"), Some(4));
    }

    #[test]
    fn results_for_unresolved_seasons_are_ignored() {
        let league = league(2, 1, 2024, 2025, 2024);
        let results = vec![result(2025, 1, 1, "Hawks")];
        let input = AssemblyInput {
            base: generate_base_picks(&league),
            results: &results,
            ..Default::default()
        };
        let dim = assemble(input, &league).unwrap();
        assert_eq!(dim.get("2025_1_1").unwrap().source, PickSource::Generated);
    }

    #[test]
    fn tbd_picks_are_appended_unranked() {
        let league = league(2, 2, 2025, 2025, 2024);
        let input = AssemblyInput {
            base: generate_base_picks(&league),
            tbd: vec![DraftPick::tbd(2025, 2, Some("Hawks".into()), 3)],
            ..Default::default()
        };
        let dim = assemble(input, &league).unwrap();

        let tbd = dim.get("2025_2_TBD").unwrap();
        assert!(tbd.overall_pick.is_none());
        assert_eq!(dim.picks.last().unwrap().pick_id, "2025_2_TBD");
        assert_eq!(overall_of(&dim, "2025_2_2"), Some(4));
    }

    #[test]
    fn duplicate_identity_is_fatal() {
        let league = league(2, 1, 2024, 2024, 2024);
        let mut base = generate_base_picks(&league);
        base.push(DraftPick::base(2024, 1, 2));
        let input = AssemblyInput {
            base,
            ..Default::default()
        };
        assert_eq!(
            assemble(input, &league),
            Err(EngineError::DuplicateIdentity {
                pick_id: "2024_1_2".into()
            })
        );
    }

    #[test]
    fn duplicate_observed_slot_is_fatal() {
        let league = league(1, 1, 2024, 2024, 2024);
        let results = vec![
            result(2024, 1, 1, "Hawks"),
            result(2024, 1, 2, "Owls"),
            result(2024, 1, 2, "Bears"),
        ];
        let input = AssemblyInput {
            base: generate_base_picks(&league),
            results: &results,
            ..Default::default()
        };
        assert!(matches!(
            assemble(input, &league),
            Err(EngineError::NumberingViolation { .. }) | Err(EngineError::DuplicateIdentity { .. })
        ));
    }

    #[test]
    fn duplicate_observed_base_slot_is_fatal() {
        let league = league(2, 1, 2024, 2024, 2024);
        let results = vec![
            result(2024, 1, 1, "Hawks"),
            result(2024, 1, 1, "Bears"),
            result(2024, 1, 2, "Owls"),
        ];
        let input = AssemblyInput {
            base: generate_base_picks(&league),
            results: &results,
            ..Default::default()
        };
        assert_eq!(
            assemble(input, &league),
            Err(EngineError::DuplicateIdentity {
                pick_id: "2024_1_1".into()
            })
        );
    }

    #[test]
    fn verify_detects_non_contiguous_numbering() {
        let mut picks = vec![DraftPick::base(2024, 1, 1), DraftPick::base(2024, 1, 2)];
        picks[0].overall_pick = Some(1);
        picks[1].overall_pick = Some(3);
        assert!(matches!(
            verify_season_numbering(2024, &picks),
            Err(EngineError::NumberingViolation { season: 2024, .. })
        ));
    }

    #[test]
    fn replace_tbd_keeps_numbered_picks() {
        let league = league(2, 1, 2025, 2025, 2024);
        let input = AssemblyInput {
            base: generate_base_picks(&league),
            tbd: vec![DraftPick::tbd(2025, 1, None, 1)],
            ..Default::default()
        };
        let mut dim = assemble(input, &league).unwrap();

        let mut superseded = DraftPick::tbd(2025, 1, None, 1);
        superseded.lifecycle_state = LifecycleState::Superseded;
        superseded.superseded_by_pick_id = Some("2025_1_1".into());
        dim.replace_tbd(vec![superseded]).unwrap();

        assert_eq!(dim.picks.len(), 3);
        assert_eq!(dim.active().count(), 2);
        assert_eq!(
            dim.get("2025_1_TBD").unwrap().lifecycle_state,
            LifecycleState::Superseded
        );
    }

    #[test]
    fn assembly_is_idempotent() {
        let league = league(12, 5, 2023, 2025, 2024);
        let parsed_awards = awards_for(&[(2024, 1), (2024, 3), (2023, 1)]);
        let build = || {
            let input = AssemblyInput {
                base: generate_base_picks(&league),
                compensatory: compensatory_picks(&parsed_awards, &league),
                awards: &parsed_awards,
                ..Default::default()
            };
            assemble(input, &league).unwrap()
        };
        assert_eq!(build().picks, build().picks);
    }

    proptest! {
        #[test]
        fn overall_is_contiguous_for_any_award_mix(
            n in 1u32..14,
            rounds in 1u32..6,
            comp in proptest::collection::vec(1u32..6, 0..20),
        ) {
            let league = league(n, rounds, 2024, 2024, 2024);
            let keys: Vec<(i32, u32)> = comp
                .into_iter()
                .filter(|r| *r <= rounds)
                .map(|r| (2024, r))
                .collect();
            let awards = awards_for(&keys);
            let input = AssemblyInput {
                base: generate_base_picks(&league),
                compensatory: compensatory_picks(&awards, &league),
                awards: &awards,
                ..Default::default()
            };
            let dim = assemble(input, &league).unwrap();

            let mut numbered: Vec<&DraftPick> = dim.picks.iter().filter(|p| p.is_numbered()).collect();
            numbered.sort_by_key(|p| p.round_slot());
            for (i, p) in numbered.iter().enumerate() {
                prop_assert_eq!(p.overall_pick, Some(i as u32 + 1));
            }
            prop_assert_eq!(numbered.len() as u32, n * rounds + keys.len() as u32);

            let ids: HashSet<&str> = dim.picks.iter().map(|p| p.pick_id.as_str()).collect();
            prop_assert_eq!(ids.len(), dim.picks.len());
        }
    }
}
