// Rebuild orchestration: one full, synchronous pass over an immutable ledger
// snapshot.
//
// Ordering:
//   registry -> sequencer -> base slate / compensatory picks
//   TBD extraction -> lifecycle log
//   assembly -> lifecycle transitions -> reconciliation -> cross-references
//
// Any structural failure aborts before the caller can publish anything.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{DiagnosticsConfig, LeagueConfig};
use crate::error::EngineError;
use crate::ledger::LedgerSnapshot;
use crate::lifecycle::{self, LifecycleEvent, LifecycleIssue, LifecycleLog, LifecycleReport};
use crate::picks::assembler::{assemble, AssemblyInput, PickDimension, RoundIssue};
use crate::picks::awards::{build_registry, RegistryStats};
use crate::picks::base::generate_base_picks;
use crate::picks::sequencer::{compensatory_picks, stamp_awards, AwardStamp, CompensationAward};
use crate::picks::tbd::extract_tbd_picks;
use crate::reconcile::{reconcile, ReconciliationRecord, ReconciliationSummary};
use crate::xref::{references_from_ledger, resolve_references, CrossReference, MatchMethod};

/// Inputs that would otherwise be ambient. Every timestamp written by a
/// rebuild comes from `as_of`.
#[derive(Debug, Clone, Copy)]
pub struct RebuildContext {
    pub as_of: DateTime<Utc>,
}

/// Persisted append-only state carried between rebuilds.
#[derive(Debug, Clone, Default)]
pub struct RebuildState {
    pub stamps: Vec<AwardStamp>,
    pub events: Vec<LifecycleEvent>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    pub registry: RegistryStats,
    pub parse_failure_rate: f64,
    /// Parse failures exceeded the configured rate.
    pub parse_failure_alert: bool,
    /// Awards whose season is past the resolved boundary.
    pub pending_awards: usize,
    /// Award refs whose content changed since their sequence was stamped.
    pub drifted_awards: Vec<u64>,
    pub round_issues: Vec<RoundIssue>,
    pub lifecycle_issues: Vec<LifecycleIssue>,
    pub reconciliation: ReconciliationSummary,
    pub unresolved_references: usize,
}

#[derive(Debug, Clone)]
pub struct RebuildOutput {
    pub dimension: PickDimension,
    pub awards: Vec<CompensationAward>,
    pub reconciliation: Vec<ReconciliationRecord>,
    pub cross_references: Vec<CrossReference>,
    /// Stamps minted in this run; the caller appends them to the store.
    pub new_stamps: Vec<AwardStamp>,
    /// Lifecycle events appended in this run.
    pub new_events: Vec<LifecycleEvent>,
    pub lifecycle: LifecycleReport,
    pub diagnostics: Diagnostics,
}

pub fn rebuild(
    snapshot: &LedgerSnapshot,
    league: &LeagueConfig,
    diagnostics_config: &DiagnosticsConfig,
    state: &RebuildState,
    ctx: &RebuildContext,
) -> Result<RebuildOutput, EngineError> {
    let mut diagnostics = Diagnostics::default();

    // Awards.
    let registry = build_registry(&snapshot.transactions, league);
    diagnostics.parse_failure_rate = registry.stats.failure_rate();
    if diagnostics.parse_failure_rate > diagnostics_config.parse_failure_warn_rate {
        diagnostics.parse_failure_alert = true;
        warn!(
            "{} of {} compensation texts unparseable ({:.1}%, threshold {:.1}%)",
            registry.stats.unrecognized,
            registry.stats.compensation_texts,
            diagnostics.parse_failure_rate * 100.0,
            diagnostics_config.parse_failure_warn_rate * 100.0
        );
    }
    if registry.stats.threshold_mismatches > 0 {
        warn!(
            "{} awards state a round their AAV does not imply",
            registry.stats.threshold_mismatches
        );
    }
    diagnostics.registry = registry.stats.clone();

    let stamped = stamp_awards(&registry.awards, &state.stamps, ctx.as_of);
    diagnostics.drifted_awards = stamped
        .awards
        .iter()
        .filter(|a| a.content_drift)
        .map(|a| a.award_ref)
        .collect();
    for award_ref in &diagnostics.drifted_awards {
        warn!("award {} changed since its sequence was stamped", award_ref);
    }
    diagnostics.pending_awards = stamped
        .awards
        .iter()
        .filter(|a| !league.is_resolved(a.season))
        .count();
    info!(
        "registry: {} awards ({} newly stamped, {} pending)",
        stamped.awards.len(),
        stamped.new_stamps.len(),
        diagnostics.pending_awards
    );

    // Placeholders.
    let mut log = LifecycleLog::from_events(state.events.clone());
    let created = lifecycle::observe(
        &mut log,
        &extract_tbd_picks(&snapshot.transactions),
        ctx.as_of,
    );

    // Dimension.
    let mut dimension = assemble(
        AssemblyInput {
            base: generate_base_picks(league),
            compensatory: compensatory_picks(&stamped.awards, league),
            tbd: log.tbd_picks()?,
            results: &snapshot.results,
            awards: &stamped.awards,
        },
        league,
    )?;
    diagnostics.round_issues = dimension.round_issues.clone();

    let mut lifecycle_report = lifecycle::resolve(&mut log, &dimension, league, ctx.as_of)?;
    lifecycle_report.created = created;
    dimension.replace_tbd(log.tbd_picks()?)?;
    diagnostics.lifecycle_issues = lifecycle_report.issues.clone();
    info!(
        "dimension: {} picks ({} active), {} placeholders created, {} superseded",
        dimension.picks.len(),
        dimension.active().count(),
        lifecycle_report.created.len(),
        lifecycle_report.superseded.len()
    );

    // Reports.
    let reconciliation = reconcile(&stamped.awards, &dimension, league);
    diagnostics.reconciliation = ReconciliationSummary::from_records(&reconciliation);

    let cross_references = resolve_references(
        &references_from_ledger(&snapshot.transactions),
        &dimension,
    );
    diagnostics.unresolved_references = cross_references
        .iter()
        .filter(|x| x.method == MatchMethod::Unresolved)
        .count();

    Ok(RebuildOutput {
        dimension,
        awards: stamped.awards,
        reconciliation,
        cross_references,
        new_stamps: stamped.new_stamps,
        new_events: log.pending().to_vec(),
        lifecycle: lifecycle_report,
        diagnostics,
    })
}

impl RebuildState {
    /// The state a store would hold after persisting `output`.
    pub fn advanced(&self, output: &RebuildOutput) -> RebuildState {
        let mut next = self.clone();
        next.stamps.extend(output.new_stamps.iter().cloned());
        next.events.extend(output.new_events.iter().cloned());
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picks::test_support::{as_of, league, pick_trade, result, signing};

    fn ctx() -> RebuildContext {
        RebuildContext { as_of: as_of() }
    }

    fn snapshot() -> LedgerSnapshot {
        LedgerSnapshot {
            transactions: vec![
                signing(10, "2023-04-01", "2024 1st", Some(35.0)),
                signing(11, "2023-05-01", "2024 1st", Some(31.0)),
                signing(12, "2023-06-01", "garbled", Some(1.0)),
                pick_trade(20, 2026, 2, None, Some("Hawks")),
            ],
            results: Vec::new(),
        }
    }

    #[test]
    fn first_run_stamps_awards_and_creates_placeholders() {
        let league = league(12, 5, 2024, 2026, 2025);
        let out = rebuild(
            &snapshot(),
            &league,
            &DiagnosticsConfig::default(),
            &RebuildState::default(),
            &ctx(),
        )
        .unwrap();

        assert_eq!(out.new_stamps.len(), 2);
        assert_eq!(out.lifecycle.created, vec!["2026_2_TBD"]);
        assert_eq!(out.new_events.len(), 1);
        assert_eq!(out.dimension.get("2024_1_14").unwrap().comp_sequence(), Some(2));
        assert_eq!(out.dimension.get("2024_2_1").unwrap().overall_pick, Some(15));
        assert_eq!(out.diagnostics.registry.unrecognized, 1);
        assert!(out.diagnostics.parse_failure_alert);
        assert_eq!(out.diagnostics.reconciliation.matched, 2);
    }

    #[test]
    fn second_run_over_advanced_state_is_identical() {
        let league = league(12, 5, 2024, 2026, 2025);
        let snap = snapshot();
        let diag = DiagnosticsConfig::default();
        let first = rebuild(&snap, &league, &diag, &RebuildState::default(), &ctx()).unwrap();
        let state = RebuildState::default().advanced(&first);

        let second = rebuild(&snap, &league, &diag, &state, &ctx()).unwrap();
        assert!(second.new_stamps.is_empty());
        assert!(second.new_events.is_empty());
        assert_eq!(first.dimension.picks, second.dimension.picks);
        assert_eq!(first.awards, second.awards);
        assert_eq!(first.reconciliation, second.reconciliation);
    }

    #[test]
    fn parse_failure_alert_respects_threshold() {
        let league = league(12, 5, 2024, 2026, 2025);
        let lenient = DiagnosticsConfig {
            parse_failure_warn_rate: 0.5,
        };
        let out = rebuild(&snapshot(), &league, &lenient, &RebuildState::default(), &ctx()).unwrap();
        assert!(!out.diagnostics.parse_failure_alert);
    }

    #[test]
    fn placeholder_supersedes_once_results_land() {
        let league = league(2, 2, 2025, 2025, 2025);
        let mut snap = LedgerSnapshot {
            transactions: vec![pick_trade(1, 2025, 2, None, Some("Hawks"))],
            results: Vec::new(),
        };
        let pending_league = league_with_boundary(&league, 2024);
        let diag = DiagnosticsConfig::default();
        let first = rebuild(&snap, &pending_league, &diag, &RebuildState::default(), &ctx()).unwrap();
        assert!(first.dimension.get("2025_2_TBD").unwrap().is_active());

        snap.results = vec![
            result(2025, 1, 1, "Hawks"),
            result(2025, 1, 2, "Bears"),
            result(2025, 2, 1, "Bears"),
            result(2025, 2, 2, "Hawks"),
        ];
        let state = RebuildState::default().advanced(&first);
        let second = rebuild(&snap, &league, &diag, &state, &ctx()).unwrap();
        let tbd = second.dimension.get("2025_2_TBD").unwrap();
        assert_eq!(tbd.superseded_by_pick_id.as_deref(), Some("2025_2_2"));
        assert_eq!(second.new_events.len(), 1);
        assert!(second
            .cross_references
            .iter()
            .any(|x| x.canonical_pick_id.as_deref() == Some("2025_2_2")));
    }

    fn league_with_boundary(league: &LeagueConfig, resolved: i32) -> LeagueConfig {
        LeagueConfig {
            latest_resolved_season: resolved,
            ..league.clone()
        }
    }
}
