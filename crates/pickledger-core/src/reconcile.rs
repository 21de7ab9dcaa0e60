// Reconciliation between the award registry and the assembled dimension.
//
// Report only: nothing here alters picks or awards.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{info, warn};

use crate::config::LeagueConfig;
use crate::picks::assembler::PickDimension;
use crate::picks::pick::{DraftPick, PickType};
use crate::picks::sequencer::CompensationAward;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Matched,
    SequenceMismatch,
    AwardWithoutPick,
    PickWithoutAward,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Matched => "matched",
            Classification::SequenceMismatch => "sequence_mismatch",
            Classification::AwardWithoutPick => "award_without_pick",
            Classification::PickWithoutAward => "pick_without_award",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Classification::Matched => Severity::Info,
            Classification::SequenceMismatch => Severity::Warn,
            Classification::AwardWithoutPick | Classification::PickWithoutAward => Severity::Error,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }
}

/// Which key paired the two sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKey {
    AwardRef,
    SeasonRoundSequence,
}

impl MatchKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKey::AwardRef => "award_ref",
            MatchKey::SeasonRoundSequence => "season_round_sequence",
        }
    }
}

/// The registry's view of a compensatory pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardSide {
    pub award_ref: u64,
    pub season: i32,
    pub round: u32,
    pub sequence: u32,
    pub recipient: Option<String>,
    pub triggering_player: Option<String>,
}

impl From<&CompensationAward> for AwardSide {
    fn from(a: &CompensationAward) -> Self {
        AwardSide {
            award_ref: a.award_ref,
            season: a.season,
            round: a.stated_round,
            sequence: a.sequence,
            recipient: a.recipient.clone(),
            triggering_player: a.triggering_player.clone(),
        }
    }
}

/// The dimension's view of a compensatory pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickSide {
    pub pick_id: String,
    pub season: i32,
    pub round: u32,
    pub sequence: u32,
    pub award_ref: Option<u64>,
    pub owner: Option<String>,
}

impl PickSide {
    fn from_pick(p: &DraftPick) -> Option<Self> {
        let meta = p.compensation.as_ref()?;
        Some(PickSide {
            pick_id: p.pick_id.clone(),
            season: p.season,
            round: p.round,
            sequence: meta.sequence,
            award_ref: meta.award_ref,
            owner: p.owner.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationRecord {
    pub award: Option<AwardSide>,
    pub pick: Option<PickSide>,
    pub classification: Classification,
    pub severity: Severity,
    pub key: Option<MatchKey>,
    pub diagnostic: String,
}

impl ReconciliationRecord {
    fn new(
        award: Option<AwardSide>,
        pick: Option<PickSide>,
        classification: Classification,
        key: Option<MatchKey>,
        diagnostic: String,
    ) -> Self {
        ReconciliationRecord {
            award,
            pick,
            classification,
            severity: classification.severity(),
            key,
            diagnostic,
        }
    }

    fn sort_key(&self) -> (i32, u32, u32, u64, String) {
        match (&self.award, &self.pick) {
            (Some(a), p) => (
                a.season,
                a.round,
                a.sequence,
                a.award_ref,
                p.as_ref().map(|p| p.pick_id.clone()).unwrap_or_default(),
            ),
            (None, Some(p)) => (p.season, p.round, p.sequence, u64::MAX, p.pick_id.clone()),
            (None, None) => (i32::MAX, u32::MAX, u32::MAX, u64::MAX, String::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationSummary {
    pub matched: usize,
    pub sequence_mismatch: usize,
    pub award_without_pick: usize,
    pub pick_without_award: usize,
}

impl ReconciliationSummary {
    pub fn from_records(records: &[ReconciliationRecord]) -> Self {
        let mut s = ReconciliationSummary::default();
        for r in records {
            match r.classification {
                Classification::Matched => s.matched += 1,
                Classification::SequenceMismatch => s.sequence_mismatch += 1,
                Classification::AwardWithoutPick => s.award_without_pick += 1,
                Classification::PickWithoutAward => s.pick_without_award += 1,
            }
        }
        s
    }

    pub fn drift(&self) -> usize {
        self.sequence_mismatch + self.award_without_pick + self.pick_without_award
    }
}

/// Full outer correspondence between awards and compensatory picks of the
/// resolved seasons.
///
/// Picks naming an award reference pair on it first; the rest pair on
/// (season, round, sequence). Anything left over is reported one-sided.
pub fn reconcile(
    awards: &[CompensationAward],
    dimension: &PickDimension,
    league: &LeagueConfig,
) -> Vec<ReconciliationRecord> {
    let awards: Vec<AwardSide> = awards
        .iter()
        .filter(|a| league.is_resolved(a.season))
        .map(AwardSide::from)
        .collect();
    let picks: Vec<PickSide> = dimension
        .picks
        .iter()
        .filter(|p| p.pick_type == PickType::Compensatory && league.is_resolved(p.season))
        .filter_map(PickSide::from_pick)
        .collect();

    let by_ref: HashMap<u64, usize> = awards
        .iter()
        .enumerate()
        .map(|(i, a)| (a.award_ref, i))
        .collect();
    let mut used_awards: HashSet<usize> = HashSet::new();
    let mut used_picks: HashSet<usize> = HashSet::new();
    let mut records = Vec::new();

    // Pass 1: explicit award reference.
    for (pi, pick) in picks.iter().enumerate() {
        let Some(ai) = pick.award_ref.and_then(|r| by_ref.get(&r).copied()) else {
            continue;
        };
        if !used_awards.insert(ai) {
            continue;
        }
        used_picks.insert(pi);
        let award = &awards[ai];
        let same_position =
            (award.season, award.round, award.sequence) == (pick.season, pick.round, pick.sequence);
        let (class, diagnostic) = if same_position {
            (
                Classification::Matched,
                format!("award {} is {}", award.award_ref, pick.pick_id),
            )
        } else {
            (
                Classification::SequenceMismatch,
                format!(
                    "award {} stamped at {}/{} seq {}, but {} sits at {}/{} seq {}",
                    award.award_ref,
                    award.season,
                    award.round,
                    award.sequence,
                    pick.pick_id,
                    pick.season,
                    pick.round,
                    pick.sequence
                ),
            )
        };
        records.push(ReconciliationRecord::new(
            Some(award.clone()),
            Some(pick.clone()),
            class,
            Some(MatchKey::AwardRef),
            diagnostic,
        ));
    }

    // Pass 2: position, only for picks that name no award. A pick naming an
    // unknown or already claimed award stays one-sided.
    let mut by_position: HashMap<(i32, u32, u32), usize> = HashMap::new();
    for (ai, a) in awards.iter().enumerate() {
        if !used_awards.contains(&ai) {
            by_position.entry((a.season, a.round, a.sequence)).or_insert(ai);
        }
    }
    for (pi, pick) in picks.iter().enumerate() {
        if used_picks.contains(&pi) || pick.award_ref.is_some() {
            continue;
        }
        let Some(ai) = by_position.remove(&(pick.season, pick.round, pick.sequence)) else {
            continue;
        };
        used_awards.insert(ai);
        used_picks.insert(pi);
        let award = &awards[ai];
        records.push(ReconciliationRecord::new(
            Some(award.clone()),
            Some(pick.clone()),
            Classification::Matched,
            Some(MatchKey::SeasonRoundSequence),
            format!(
                "award {} is {} by position",
                award.award_ref, pick.pick_id
            ),
        ));
    }

    for (ai, award) in awards.iter().enumerate() {
        if !used_awards.contains(&ai) {
            records.push(ReconciliationRecord::new(
                Some(award.clone()),
                None,
                Classification::AwardWithoutPick,
                None,
                format!(
                    "award {} ({}/{} seq {}) has no compensatory pick",
                    award.award_ref, award.season, award.round, award.sequence
                ),
            ));
        }
    }
    for (pi, pick) in picks.iter().enumerate() {
        if !used_picks.contains(&pi) {
            let diagnostic = match pick.award_ref {
                Some(r) if by_ref.contains_key(&r) => format!(
                    "{} names award {}, which another pick already claims",
                    pick.pick_id, r
                ),
                Some(r) => format!("{} names award {}, which is not in the registry", pick.pick_id, r),
                None => format!("{} has no award at seq {}", pick.pick_id, pick.sequence),
            };
            records.push(ReconciliationRecord::new(
                None,
                Some(pick.clone()),
                Classification::PickWithoutAward,
                None,
                diagnostic,
            ));
        }
    }

    records.sort_by_key(|r| r.sort_key());

    let summary = ReconciliationSummary::from_records(&records);
    info!(
        "reconciliation: {} matched, {} sequence mismatches, {} awards without pick, {} picks without award",
        summary.matched, summary.sequence_mismatch, summary.award_without_pick, summary.pick_without_award
    );
    if summary.drift() > 0 {
        warn!("reconciliation found {} discrepancies", summary.drift());
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::DraftResult;
    use crate::picks::assembler::{assemble, AssemblyInput};
    use crate::picks::base::generate_base_picks;
    use crate::picks::sequencer::compensatory_picks;
    use crate::picks::test_support::{awards_for, league, result};

    fn with_award(mut r: DraftResult, award_ref: u64) -> DraftResult {
        r.award_ref = Some(award_ref);
        r
    }

    #[test]
    fn fixture_yields_all_four_classifications() {
        let league = league(2, 2, 2024, 2024, 2024);
        // Awards 1 and 2 in round 1 (seq 1, 2); award 3 in round 2 (seq 1).
        let awards = awards_for(&[(2024, 1), (2024, 1), (2024, 2)]);
        let results = vec![
            result(2024, 1, 1, "Hawks"),
            result(2024, 1, 2, "Bears"),
            // seq 1, names award 1: matched.
            with_award(result(2024, 1, 3, "Owls"), 1),
            // seq 3, names award 2 (seq 2): sequence mismatch.
            with_award(result(2024, 1, 5, "Owls"), 2),
            // seq 4, no award anywhere: pick without award.
            result(2024, 1, 6, "Owls"),
            // Round 2 has no compensatory selection: award 3 without pick.
            result(2024, 2, 1, "Hawks"),
            result(2024, 2, 2, "Bears"),
        ];
        let dim = assemble(
            AssemblyInput {
                base: generate_base_picks(&league),
                results: &results,
                awards: &awards,
                ..Default::default()
            },
            &league,
        )
        .unwrap();

        let records = reconcile(&awards, &dim, &league);
        let classes: HashSet<Classification> = records.iter().map(|r| r.classification).collect();
        assert_eq!(classes.len(), 4);

        let summary = ReconciliationSummary::from_records(&records);
        assert_eq!(
            summary,
            ReconciliationSummary {
                matched: 1,
                sequence_mismatch: 1,
                award_without_pick: 1,
                pick_without_award: 1,
            }
        );

        let mismatch = records
            .iter()
            .find(|r| r.classification == Classification::SequenceMismatch)
            .unwrap();
        assert_eq!(mismatch.severity, Severity::Warn);
        assert_eq!(mismatch.key, Some(MatchKey::AwardRef));
        assert_eq!(mismatch.pick.as_ref().unwrap().pick_id, "2024_1_5");

        let orphan_award = records
            .iter()
            .find(|r| r.classification == Classification::AwardWithoutPick)
            .unwrap();
        assert_eq!(orphan_award.severity, Severity::Error);
        assert_eq!(orphan_award.award.as_ref().unwrap().award_ref, 3);
        assert!(orphan_award.pick.is_none());
    }

    #[test]
    fn awarded_picks_match_on_reference() {
        let league = league(12, 5, 2024, 2024, 2024);
        let awards = awards_for(&[(2024, 1), (2024, 1), (2024, 3)]);
        let dim = assemble(
            AssemblyInput {
                base: generate_base_picks(&league),
                compensatory: compensatory_picks(&awards, &league),
                awards: &awards,
                ..Default::default()
            },
            &league,
        )
        .unwrap();

        let records = reconcile(&awards, &dim, &league);
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.classification == Classification::Matched
            && r.key == Some(MatchKey::AwardRef)
            && r.severity == Severity::Info));
    }

    #[test]
    fn observed_pick_without_reference_matches_by_position() {
        let league = league(1, 1, 2024, 2024, 2024);
        let awards = awards_for(&[(2024, 1)]);
        let results = vec![result(2024, 1, 1, "Hawks"), result(2024, 1, 2, "Owls")];
        let dim = assemble(
            AssemblyInput {
                base: generate_base_picks(&league),
                results: &results,
                awards: &awards,
                ..Default::default()
            },
            &league,
        )
        .unwrap();

        let records = reconcile(&awards, &dim, &league);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].classification, Classification::Matched);
        assert_eq!(records[0].key, Some(MatchKey::SeasonRoundSequence));
    }

    #[test]
    fn unknown_award_reference_is_not_matched_by_position() {
        let league = league(1, 1, 2024, 2024, 2024);
        let awards = awards_for(&[(2024, 1)]);
        // Slot 2 is seq 1, where award 1 sits, but the pick names award 999.
        let results = vec![
            result(2024, 1, 1, "Hawks"),
            with_award(result(2024, 1, 2, "Owls"), 999),
        ];
        let dim = assemble(
            AssemblyInput {
                base: generate_base_picks(&league),
                results: &results,
                awards: &awards,
                ..Default::default()
            },
            &league,
        )
        .unwrap();

        let records = reconcile(&awards, &dim, &league);
        assert_eq!(
            ReconciliationSummary::from_records(&records),
            ReconciliationSummary {
                matched: 0,
                sequence_mismatch: 0,
                award_without_pick: 1,
                pick_without_award: 1,
            }
        );
        let orphan = records
            .iter()
            .find(|r| r.classification == Classification::PickWithoutAward)
            .unwrap();
        assert_eq!(orphan.severity, Severity::Error);
        assert_eq!(orphan.pick.as_ref().unwrap().pick_id, "2024_1_2");
        assert!(orphan.diagnostic.contains("not in the registry"));
    }

    #[test]
    fn second_claim_on_an_award_stays_one_sided() {
        let league = league(1, 1, 2024, 2024, 2024);
        let awards = awards_for(&[(2024, 1), (2024, 1)]);
        // Both selections name award 1; award 2 is left at seq 2.
        let results = vec![
            result(2024, 1, 1, "Hawks"),
            with_award(result(2024, 1, 2, "Owls"), 1),
            with_award(result(2024, 1, 3, "Owls"), 1),
        ];
        let dim = assemble(
            AssemblyInput {
                base: generate_base_picks(&league),
                results: &results,
                awards: &awards,
                ..Default::default()
            },
            &league,
        )
        .unwrap();

        let records = reconcile(&awards, &dim, &league);
        let summary = ReconciliationSummary::from_records(&records);
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.pick_without_award, 1);
        assert_eq!(summary.award_without_pick, 1);
        let orphan = records
            .iter()
            .find(|r| r.classification == Classification::PickWithoutAward)
            .unwrap();
        assert_eq!(orphan.pick.as_ref().unwrap().pick_id, "2024_1_3");
        assert!(orphan.diagnostic.contains("already claims"));
    }

    #[test]
    fn unresolved_seasons_are_excluded() {
        let league = league(12, 5, 2024, 2026, 2024);
        let awards = awards_for(&[(2026, 1)]);
        let dim = assemble(
            AssemblyInput {
                base: generate_base_picks(&league),
                awards: &awards,
                ..Default::default()
            },
            &league,
        )
        .unwrap();
        assert!(reconcile(&awards, &dim, &league).is_empty());
    }
}
