// Compensatory award registry: free-text compensation references parsed into
// structured awards.
//
// Two formats are recognized:
//   historical   "2024 1st"          season stated, recipient = destination party
//   prospective  "2nd to Night Owls" season = transaction year + 1
//
// Anything else is excluded from the registry and counted, never fatal.

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::LazyLock;
use tracing::debug;

use crate::config::LeagueConfig;
use crate::ledger::TransactionRecord;

// ---------------------------------------------------------------------------
// Text parsing
// ---------------------------------------------------------------------------

const ROUND_TOKEN: &str =
    r"(?P<round>\d{1,2}(?:st|nd|rd|th)?|first|second|third|fourth|fifth|sixth|seventh)";

static HISTORICAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^\s*(?P<season>\d{{4}})\s+{ROUND_TOKEN}(?:\s+round)?\s*$"
    ))
    .expect("invalid historical compensation regex")
});

static PROSPECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^\s*{ROUND_TOKEN}(?:\s+round)?\s+to\s+(?P<recipient>\S.*?)\s*$"
    ))
    .expect("invalid prospective compensation regex")
});

/// Result of reading one compensation text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompensationText {
    /// `"<season> <ordinal-round>"`.
    HistoricalAward { season: i32, round: u32 },
    /// `"<ordinal-round> to <recipient>"`; season comes from the transaction.
    ProspectiveAward { round: u32, recipient: String },
    Unrecognized,
}

/// Convert a round token ("1st", "3", "second") to a round number.
fn parse_round_token(token: &str) -> Option<u32> {
    let lower = token.to_ascii_lowercase();
    let named = match lower.as_str() {
        "first" => Some(1),
        "second" => Some(2),
        "third" => Some(3),
        "fourth" => Some(4),
        "fifth" => Some(5),
        "sixth" => Some(6),
        "seventh" => Some(7),
        _ => None,
    };
    if named.is_some() {
        return named;
    }
    let digits = lower.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    digits.parse().ok()
}

/// Parse a compensation text. Rounds outside `1..=num_rounds` are unrecognized.
pub fn parse_compensation(text: &str, num_rounds: u32) -> CompensationText {
    let in_range = |r: u32| (1..=num_rounds).contains(&r);

    if let Some(caps) = HISTORICAL.captures(text) {
        let season = caps["season"].parse::<i32>().ok();
        let round = parse_round_token(&caps["round"]).filter(|r| in_range(*r));
        if let (Some(season), Some(round)) = (season, round) {
            return CompensationText::HistoricalAward { season, round };
        }
        return CompensationText::Unrecognized;
    }

    if let Some(caps) = PROSPECTIVE.captures(text) {
        let round = parse_round_token(&caps["round"]).filter(|r| in_range(*r));
        let recipient = caps["recipient"].trim().to_string();
        if let Some(round) = round {
            if !recipient.is_empty() {
                return CompensationText::ProspectiveAward { round, recipient };
            }
        }
    }

    CompensationText::Unrecognized
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwardFormat {
    Historical,
    Prospective,
}

/// A compensation award as read from the ledger, before sequencing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedAward {
    /// Ledger record id of the transaction carrying the compensation text.
    pub award_ref: u64,
    pub format: AwardFormat,
    pub season: i32,
    pub stated_round: u32,
    /// Round implied by the contract AAV, if any band matched.
    pub implied_round: Option<u32>,
    pub round_matches_threshold: bool,
    pub recipient: Option<String>,
    pub triggering_player: Option<String>,
    pub aav: Option<f64>,
}

impl ParsedAward {
    /// SHA-256 over the award's substantive fields, hex encoded. Ledger fields
    /// that do not define the award (display order, kind, names when an id is
    /// present) are not part of the hash.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.season.to_be_bytes());
        hasher.update(self.stated_round.to_be_bytes());
        hasher.update(b"|");
        hasher.update(self.recipient.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"|");
        hasher.update(self.triggering_player.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"|");
        if let Some(aav) = self.aav {
            hasher.update(aav.to_bits().to_be_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// Counters describing one registry pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    /// Transactions carrying any compensation text.
    pub compensation_texts: usize,
    pub parsed: usize,
    pub unrecognized: usize,
    pub threshold_mismatches: usize,
}

impl RegistryStats {
    /// Share of compensation texts that could not be parsed.
    pub fn failure_rate(&self) -> f64 {
        if self.compensation_texts == 0 {
            0.0
        } else {
            self.unrecognized as f64 / self.compensation_texts as f64
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AwardRegistry {
    pub awards: Vec<ParsedAward>,
    pub stats: RegistryStats,
}

/// Parse every compensation reference in the ledger into awards, ordered by
/// ledger record id.
pub fn build_registry(transactions: &[TransactionRecord], league: &LeagueConfig) -> AwardRegistry {
    let mut registry = AwardRegistry::default();

    for txn in transactions {
        let Some(text) = txn.compensation.as_deref() else {
            continue;
        };
        registry.stats.compensation_texts += 1;

        let (format, season, stated_round, recipient) =
            match parse_compensation(text, league.num_rounds) {
                CompensationText::HistoricalAward { season, round } => {
                    (AwardFormat::Historical, season, round, txn.to_party.clone())
                }
                CompensationText::ProspectiveAward { round, recipient } => (
                    AwardFormat::Prospective,
                    txn.year() + 1,
                    round,
                    Some(recipient),
                ),
                CompensationText::Unrecognized => {
                    debug!(
                        "record {}: unrecognized compensation text {:?}",
                        txn.record_id, text
                    );
                    registry.stats.unrecognized += 1;
                    continue;
                }
            };

        let implied_round = txn.aav.and_then(|aav| league.implied_round(aav));
        let round_matches_threshold = implied_round == Some(stated_round);
        if !round_matches_threshold {
            registry.stats.threshold_mismatches += 1;
            debug!(
                "record {}: stated round {} but AAV {:?} implies {:?}",
                txn.record_id, stated_round, txn.aav, implied_round
            );
        }

        registry.stats.parsed += 1;
        registry.awards.push(ParsedAward {
            award_ref: txn.record_id,
            format,
            season,
            stated_round,
            implied_round,
            round_matches_threshold,
            recipient,
            triggering_player: txn.player_id.clone().or_else(|| txn.player_name.clone()),
            aav: txn.aav,
        });
    }

    registry.awards.sort_by_key(|a| a.award_ref);
    registry
}
