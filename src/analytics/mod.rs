//! Analytics over the canonical race model.
//!
//! Everything here is a pure function of its input: rankings, Dutch
//! staking margins, favourites and winner ranks are recomputed from the
//! current board on demand and never cached on the model itself.

pub mod dutch;
pub mod movers;
pub mod winners;

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::types::{Horse, Round};
use dutch::{format_signed_pct, top_dutch};

/// Minimum priced runners before a Top-N horse list is shown.
const TOP3_MIN: usize = 3;
const TOP6_MIN: usize = 6;

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Price ordering: valid prices ascending, then every unpriced horse.
fn by_price(a: &Horse, b: &Horse) -> Ordering {
    match (a.has_price(), b.has_price()) {
        (true, true) => a.odds.total_cmp(&b.odds),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    }
}

/// All horses ordered by odds for display. Stable: ties keep input order.
pub fn ranked(horses: &[Horse]) -> Vec<&Horse> {
    let mut sorted: Vec<&Horse> = horses.iter().collect();
    sorted.sort_by(|a, b| by_price(a, b));
    sorted
}

/// Only horses with a valid price, ordered by odds.
pub fn valid_ranked(horses: &[Horse]) -> Vec<&Horse> {
    let mut sorted: Vec<&Horse> = horses.iter().filter(|h| h.has_price()).collect();
    sorted.sort_by(|a, b| by_price(a, b));
    sorted
}

/// English ordinal: 1st, 2nd, 3rd, 4th, 11th, 12th, 13th, 21st…
pub fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (1, r) if r != 11 => "st",
        (2, r) if r != 12 => "nd",
        (3, r) if r != 13 => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// "HH:MM" → minutes past midnight. `None` for anything else.
pub fn time_of_day_minutes(time: &str) -> Option<u32> {
    let (h, m) = time.trim().split_once(':')?;
    let h: u32 = h.trim().parse().ok()?;
    let m: u32 = m.trim().parse().ok()?;
    (h < 24 && m < 60).then_some(h * 60 + m)
}

// ---------------------------------------------------------------------------
// Horse filter
// ---------------------------------------------------------------------------

/// Restricts displayed runners to a set of saddle numbers ("1,3,5").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HorseFilter {
    numbers: BTreeSet<u32>,
}

impl HorseFilter {
    /// Parse a comma-separated list. Each entry is read up to its first
    /// non-digit ("1 2" is horse 1); entries that do not start with a digit
    /// are dropped. An empty result means "no filter".
    pub fn parse(input: &str) -> Self {
        let numbers = input
            .split(',')
            .filter_map(|part| {
                let part = part.trim();
                let end = part
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(part.len());
                part[..end].parse::<u32>().ok()
            })
            .collect();
        Self { numbers }
    }

    pub fn is_active(&self) -> bool {
        !self.numbers.is_empty()
    }

    pub fn allows(&self, horse: &Horse) -> bool {
        !self.is_active() || self.numbers.contains(&horse.number)
    }
}

// ---------------------------------------------------------------------------
// Round summary
// ---------------------------------------------------------------------------

/// One displayed row of a round table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedRow {
    /// 1-based odds rank among priced horses; `None` when unpriced.
    pub rank: Option<usize>,
    pub number: u32,
    pub position: u32,
    pub name: String,
    pub jockey: String,
    pub odds: String,
}

/// Display-ready view of a round: ranked rows plus staking rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSummary {
    pub round_number: u32,
    pub time: String,
    pub rows: Vec<RankedRow>,
    /// Top-2 Dutch profit %, when at least two priced horses are shown.
    pub t2: Option<f64>,
    pub t3: Option<f64>,
    pub t2_label: String,
    pub t3_label: String,
    pub top3: Option<Vec<u32>>,
    pub top6: Option<Vec<u32>>,
}

impl RoundSummary {
    pub fn build(round: &Round, filter: &HorseFilter) -> Self {
        let shown: Vec<&Horse> = ranked(&round.horses)
            .into_iter()
            .filter(|h| filter.allows(h))
            .collect();

        let priced: Vec<&Horse> = shown.iter().copied().filter(|h| h.has_price()).collect();
        let prices: Vec<f64> = priced.iter().map(|h| h.odds).collect();

        let rows = shown
            .iter()
            .map(|h| RankedRow {
                rank: priced
                    .iter()
                    .position(|p| std::ptr::eq(*p, *h))
                    .map(|i| i + 1),
                number: h.number,
                position: h.position,
                name: h.display_name().to_string(),
                jockey: h.display_jockey().to_string(),
                odds: h.display_odds(),
            })
            .collect();

        let t2 = top_dutch(&prices, 2);
        let t3 = top_dutch(&prices, 3);

        Self {
            round_number: round.round_number,
            time: round.time.clone(),
            rows,
            t2,
            t3,
            t2_label: t2.map(format_signed_pct).unwrap_or_else(|| "-".to_string()),
            t3_label: t3.map(format_signed_pct).unwrap_or_else(|| "-".to_string()),
            top3: top_numbers(&priced, TOP3_MIN),
            top6: top_numbers(&priced, TOP6_MIN),
        }
    }
}

/// Saddle numbers of the `n` shortest-priced horses, when at least `n` exist.
pub fn top_numbers(priced: &[&Horse], n: usize) -> Option<Vec<u32>> {
    (priced.len() >= n).then(|| priced.iter().take(n).map(|h| h.number).collect())
}

/// Valid prices of a round in ranked order.
pub fn ranked_prices(round: &Round) -> Vec<f64> {
    valid_ranked(&round.horses).iter().map(|h| h.odds).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
