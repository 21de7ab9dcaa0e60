// Base pick slate: every (season, round, slot 1..=N) in the configured range.

use crate::config::LeagueConfig;
use crate::picks::pick::DraftPick;

/// Enumerate the standard base picks for every configured season, ordered by
/// (season, round, slot). Overall numbers are left for the assembler.
pub fn generate_base_picks(league: &LeagueConfig) -> Vec<DraftPick> {
    let per_season = (league.num_rounds * league.num_teams) as usize;
    let seasons = league.seasons().count();
    let mut picks = Vec::with_capacity(per_season * seasons);
    for season in league.seasons() {
        for round in 1..=league.num_rounds {
            for slot in 1..=league.num_teams {
                picks.push(DraftPick::base(season, round, slot));
            }
        }
    }
    picks
}
