//! Winner rank resolution.
//!
//! A winner's "rank" is where the winning horse sat in the odds ranking of
//! its round on the current board: 1 means the favourite won.

use serde::Serialize;

use super::{ordinal, time_of_day_minutes, valid_ranked};
use crate::normalize::parse_round_number;
use crate::types::{Racecourse, Winner};

/// A winner paired with its resolved odds rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedWinner {
    #[serde(flatten)]
    pub winner: Winner,
    pub rank: Option<usize>,
    /// "1st", "2nd", or "-" when unresolved.
    pub rank_label: String,
}

/// 1-based position of `horse_number` in the valid-price ranking of the
/// round named by `race_number` ("R4") at `racecourse`.
pub fn winner_rank(
    racecourses: &[Racecourse],
    racecourse: &str,
    race_number: &str,
    horse_number: u32,
) -> Option<usize> {
    let course = racecourses.iter().find(|rc| rc.name == racecourse)?;
    let round = course.round(parse_round_number(race_number))?;
    valid_ranked(&round.horses)
        .iter()
        .position(|h| h.number == horse_number)
        .map(|i| i + 1)
}

/// Resolve every winner against the board, keeping input order.
pub fn annotate_winners(racecourses: &[Racecourse], winners: &[Winner]) -> Vec<RankedWinner> {
    winners
        .iter()
        .map(|w| {
            let rank = winner_rank(racecourses, &w.racecourse, &w.race_number, w.winner.number);
            RankedWinner {
                winner: w.clone(),
                rank,
                rank_label: rank.map(ordinal).unwrap_or_else(|| "-".to_string()),
            }
        })
        .collect()
}

/// Stable sort by start time; unparsable times go last.
pub fn sort_by_time(winners: &mut [RankedWinner]) {
    winners.sort_by_key(|w| time_of_day_minutes(&w.winner.time).unwrap_or(u32::MAX));
}
