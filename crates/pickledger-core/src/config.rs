// Configuration loading and parsing (league.toml, pipeline.toml).

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub league: LeagueConfig,
    pub db_path: String,
    pub data_paths: DataPaths,
    pub output_dir: String,
    pub diagnostics: DiagnosticsConfig,
}

// ---------------------------------------------------------------------------
// league.toml structs
// ---------------------------------------------------------------------------

/// Wrapper for the top-level `[league]` table in league.toml.
#[derive(Debug, Clone, Deserialize)]
struct LeagueFile {
    league: LeagueConfig,
}

/// League shape and the season boundary every engine component is handed
/// explicitly.
#[derive(Debug, Clone, Deserialize)]
pub struct LeagueConfig {
    pub name: String,
    /// League size N: base picks per round.
    pub num_teams: u32,
    /// Rounds per draft (R).
    pub num_rounds: u32,
    /// First season the base slate is generated for.
    pub first_season: i32,
    /// Last season the base slate is generated for.
    pub last_season: i32,
    /// Newest season for which actual draft results exist.
    pub latest_resolved_season: i32,
    /// Contract-rate bands used to infer the expected compensatory round.
    #[serde(default)]
    pub aav_thresholds: Vec<AavThreshold>,
}

/// One band of the AAV → round table. A contract whose AAV is at least
/// `min_aav` implies `round`, checked from the highest band down.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AavThreshold {
    pub min_aav: f64,
    pub round: u32,
}

impl LeagueConfig {
    /// Whether actual draft results are expected to exist for `season`.
    pub fn is_resolved(&self, season: i32) -> bool {
        season <= self.latest_resolved_season
    }

    /// Seasons the base slate covers, oldest first.
    pub fn seasons(&self) -> std::ops::RangeInclusive<i32> {
        self.first_season..=self.last_season
    }

    /// Map an average annual value onto the round it implies. Returns `None`
    /// when the value falls below every configured band.
    pub fn implied_round(&self, aav: f64) -> Option<u32> {
        if !aav.is_finite() {
            return None;
        }
        let mut bands = self.aav_thresholds.clone();
        bands.sort_by(|a, b| b.min_aav.total_cmp(&a.min_aav));
        bands.iter().find(|t| aav >= t.min_aav).map(|t| t.round)
    }
}

// ---------------------------------------------------------------------------
// pipeline.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire pipeline.toml file.
#[derive(Debug, Clone, Deserialize)]
struct PipelineFile {
    database: DatabaseSection,
    data_paths: DataPaths,
    output: OutputSection,
    #[serde(default)]
    diagnostics: DiagnosticsConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OutputSection {
    dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub transactions: String,
    pub draft_results: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosticsConfig {
    /// Share of compensation texts that may fail to parse before the rebuild
    /// logs an aggregate warning.
    pub parse_failure_warn_rate: f64,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        DiagnosticsConfig {
            parse_failure_warn_rate: 0.05,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/league.toml` and
/// `config/pipeline.toml`, both relative to the given `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config_in()` which handles default initialization first.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    let league_path = config_dir.join("league.toml");
    let league_text = read_file(&league_path)?;
    let league_file: LeagueFile =
        toml::from_str(&league_text).map_err(|e| ConfigError::ParseError {
            path: league_path.clone(),
            source: e,
        })?;

    let pipeline_path = config_dir.join("pipeline.toml");
    let pipeline_text = read_file(&pipeline_path)?;
    let pipeline_file: PipelineFile =
        toml::from_str(&pipeline_text).map_err(|e| ConfigError::ParseError {
            path: pipeline_path.clone(),
            source: e,
        })?;

    let config = Config {
        league: league_file.league,
        db_path: pipeline_file.database.path,
        data_paths: pipeline_file.data_paths,
        output_dir: pipeline_file.output.dir,
        diagnostics: pipeline_file.diagnostics,
    };

    validate(&config)?;

    Ok(config)
}

/// Files the rebuild reads from `config/`. Both ship under `defaults/`.
pub const CONFIG_FILES: [&str; 2] = ["league.toml", "pipeline.toml"];

fn copy_failed(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

/// Shipped defaults in `dir`, sorted by name. `.example` templates are
/// documentation only and never installed.
fn shipped_defaults(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| copy_failed(format!("failed to read {}: {e}", dir.display())))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| copy_failed(format!("failed to read {}: {e}", dir.display())))?
            .path();
        let is_template = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(true, |n| n.ends_with(".example"));
        if path.is_file() && !is_template {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Install `source` at `target` unless the operator already has a copy there.
/// Returns whether anything was written.
fn install_default(source: &Path, target: &Path) -> Result<bool, ConfigError> {
    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(copy_failed(format!("failed to create {}: {e}", target.display()))),
    };
    let content = std::fs::read(source)
        .map_err(|e| copy_failed(format!("failed to read {}: {e}", source.display())))?;
    std::io::Write::write_all(&mut dest, &content)
        .map_err(|e| copy_failed(format!("failed to write {}: {e}", target.display())))?;
    Ok(true)
}

/// Seed `config/` with any of `league.toml` / `pipeline.toml` (and other
/// shipped defaults) that the operator has not created yet. Existing files
/// are never overwritten. Returns the paths written, sorted.
///
/// A base directory with neither `defaults/` nor `config/` cannot be run
/// from and is an error.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        if config_dir.is_dir() {
            return Ok(Vec::new());
        }
        return Err(copy_failed(format!(
            "neither defaults/ nor config/ directory found in {}; \
             run from a directory holding the pickledger defaults",
            base_dir.display()
        )));
    }

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| copy_failed(format!("failed to create {}: {e}", config_dir.display())))?;

    let mut installed = Vec::new();
    for source in shipped_defaults(&defaults_dir)? {
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = config_dir.join(name);
        if install_default(&source, &target)? {
            installed.push(target);
        }
    }
    Ok(installed)
}

/// Copy any missing defaults into `base_dir/config`, then load. Returns the
/// config and the files that were copied.
pub fn load_config_in(base_dir: &Path) -> Result<(Config, Vec<PathBuf>), ConfigError> {
    let copied = ensure_config_files(base_dir)?;
    let config = load_config_from(base_dir)?;
    Ok((config, copied))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let league = &config.league;

    if league.num_teams == 0 {
        return Err(invalid("league.num_teams", "must be greater than 0"));
    }
    if league.num_rounds == 0 {
        return Err(invalid("league.num_rounds", "must be greater than 0"));
    }
    if league.first_season > league.last_season {
        return Err(invalid(
            "league.first_season",
            format!(
                "must not be after last_season ({} > {})",
                league.first_season, league.last_season
            ),
        ));
    }
    if league.latest_resolved_season > league.last_season {
        return Err(invalid(
            "league.latest_resolved_season",
            format!(
                "must not be after last_season ({} > {})",
                league.latest_resolved_season, league.last_season
            ),
        ));
    }

    let mut seen_rounds = HashSet::new();
    for (i, band) in league.aav_thresholds.iter().enumerate() {
        let field = format!("league.aav_thresholds[{i}]");
        if !band.min_aav.is_finite() || band.min_aav < 0.0 {
            return Err(invalid(
                &format!("{field}.min_aav"),
                format!("must be a non-negative number, got {}", band.min_aav),
            ));
        }
        if band.round == 0 || band.round > league.num_rounds {
            return Err(invalid(
                &format!("{field}.round"),
                format!("must be within 1..={}, got {}", league.num_rounds, band.round),
            ));
        }
        if !seen_rounds.insert(band.round) {
            return Err(invalid(
                &format!("{field}.round"),
                format!("round {} appears in more than one band", band.round),
            ));
        }
    }

    let rate = config.diagnostics.parse_failure_warn_rate;
    if !(0.0..=1.0).contains(&rate) {
        return Err(invalid(
            "diagnostics.parse_failure_warn_rate",
            format!("must be between 0.0 and 1.0 inclusive, got {rate}"),
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
