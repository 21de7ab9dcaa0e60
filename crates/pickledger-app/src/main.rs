// pickledger entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file)
// 2. Load config
// 3. Open database, load stamps and lifecycle events
// 4. Load the ledger snapshot
// 5. Rebuild
// 6. Publish to the database, then write the CSV reports

use std::path::PathBuf;

use pickledger_core::config;
use pickledger_core::db;
use pickledger_core::ledger;
use pickledger_core::rebuild::{self, RebuildContext};
use pickledger_core::report;

use anyhow::Context;
use tracing::{error, info, warn};

fn main() -> anyhow::Result<()> {
    // Optional first argument: working directory holding config/ and data/.
    let base_dir = match std::env::args().nth(1) {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir().context("failed to resolve working directory")?,
    };

    init_tracing(&base_dir)?;
    info!("pickledger starting in {}", base_dir.display());

    if let Err(e) = run(&base_dir) {
        error!("rebuild failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}

fn run(base_dir: &std::path::Path) -> anyhow::Result<()> {
    let (config, copied) = config::load_config_in(base_dir).context("failed to load configuration")?;
    for path in &copied {
        info!("copied default config to {}", path.display());
    }
    info!(
        "Config loaded: league={}, {} teams, {} rounds, seasons {}-{}, resolved through {}",
        config.league.name,
        config.league.num_teams,
        config.league.num_rounds,
        config.league.first_season,
        config.league.last_season,
        config.league.latest_resolved_season
    );

    let db_path = base_dir.join(&config.db_path);
    let db = db::Database::open(&db_path.to_string_lossy()).context("failed to open database")?;
    let state = db.load_rebuild_state().context("failed to load rebuild state")?;
    info!(
        "Database opened at {} ({} stamps, {} lifecycle events)",
        db_path.display(),
        state.stamps.len(),
        state.events.len()
    );

    let snapshot =
        ledger::load_snapshot(base_dir, &config.data_paths).context("failed to load ledger snapshot")?;
    info!(
        "Loaded {} transactions, {} draft results",
        snapshot.transactions.len(),
        snapshot.results.len()
    );

    let ctx = RebuildContext {
        as_of: chrono::Utc::now(),
    };
    let output = rebuild::rebuild(&snapshot, &config.league, &config.diagnostics, &state, &ctx)
        .context("rebuild aborted")?;

    db.publish(&output).context("failed to publish rebuild")?;
    info!(
        "Published {} picks, {} reconciliation rows, {} cross-references",
        output.dimension.picks.len(),
        output.reconciliation.len(),
        output.cross_references.len()
    );

    let out_dir = base_dir.join(&config.output_dir);
    let written = report::write_all(&out_dir, &output).context("failed to write reports")?;
    for path in &written {
        info!("wrote {}", path.display());
    }

    let d = &output.diagnostics;
    if d.reconciliation.drift() > 0 || !d.lifecycle_issues.is_empty() || d.unresolved_references > 0 {
        warn!(
            "review needed: {} reconciliation discrepancies, {} lifecycle issues, {} unresolved references",
            d.reconciliation.drift(),
            d.lifecycle_issues.len(),
            d.unresolved_references
        );
    }
    Ok(())
}

/// Initialize tracing to log to `logs/pickledger.log` under the base directory.
fn init_tracing(base_dir: &std::path::Path) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = base_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("pickledger.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pickledger=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
