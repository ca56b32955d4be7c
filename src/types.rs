//! Shared types for PADDOCK.
//!
//! The canonical race model produced by the normalizer and consumed by
//! analytics, the scheduler, the exporter and the dashboard. Records are
//! plain data: once normalized they are never mutated, only replaced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Race model
// ---------------------------------------------------------------------------

/// A runner in a single round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Horse {
    /// Saddle number; the join key within a round.
    pub number: u32,
    /// Form position as scraped (not the odds rank).
    pub position: u32,
    /// Canonical price. `0.0` means "no market".
    pub odds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_odds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jockey: Option<String>,
}

impl Horse {
    /// Whether this horse carries a usable market price.
    pub fn has_price(&self) -> bool {
        is_valid_price(self.odds)
    }

    /// Price as shown to users: `$4.50`, or `-` when there is no market.
    pub fn display_odds(&self) -> String {
        if self.has_price() {
            format_price(self.odds)
        } else {
            "-".to_string()
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn display_jockey(&self) -> &str {
        match self.jockey.as_deref() {
            Some(j) if !j.trim().is_empty() => j,
            _ => "N/A",
        }
    }

    /// Helper to build a test horse with only number and odds set.
    #[cfg(test)]
    pub fn sample(number: u32, odds: f64) -> Self {
        Horse {
            number,
            position: number,
            odds,
            previous_odds: None,
            name: Some(format!("Runner {number}")),
            jockey: None,
        }
    }
}

/// One scheduled race at a racecourse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub round_number: u32,
    /// Start time as "HH:MM" (or "N/A" when the scrape had none).
    pub time: String,
    pub horses: Vec<Horse>,
}

impl Round {
    /// Number of horses with a valid price.
    pub fn priced_count(&self) -> usize {
        self.horses.iter().filter(|h| h.has_price()).count()
    }
}

/// A racecourse and its rounds, in the order received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Racecourse {
    pub name: String,
    pub rounds: Vec<Round>,
}

impl Racecourse {
    /// Find a round by its number.
    pub fn round(&self, round_number: u32) -> Option<&Round> {
        self.rounds.iter().find(|r| r.round_number == round_number)
    }
}

// ---------------------------------------------------------------------------
// Derived views
// ---------------------------------------------------------------------------

/// Price direction of a favourite against its previous quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Movement {
    Up,
    Down,
    Neutral,
}

impl Movement {
    /// Compare a current price with an optional previous one.
    pub fn between(odds: f64, previous: Option<f64>) -> Self {
        match previous {
            Some(prev) if odds < prev => Movement::Down,
            Some(prev) if odds > prev => Movement::Up,
            _ => Movement::Neutral,
        }
    }
}

impl fmt::Display for Movement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Movement::Up => write!(f, "up"),
            Movement::Down => write!(f, "down"),
            Movement::Neutral => write!(f, "neutral"),
        }
    }
}

/// The shortest-priced runner of a round (a "market mover").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub racecourse: String,
    pub round: u32,
    pub time: String,
    pub horse_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horse_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jockey: Option<String>,
    pub position: u32,
    pub odds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_odds: Option<f64>,
    pub movement: Movement,
}

// ---------------------------------------------------------------------------
// Winners
// ---------------------------------------------------------------------------

/// A race result as reported by the winners endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Winner {
    pub racecourse: String,
    /// e.g. "R4"
    pub race_number: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub time: String,
    pub winner: WinningHorse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinningHorse {
    pub number: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub jockey: String,
    #[serde(default)]
    pub win_odds: f64,
    #[serde(default)]
    pub odds_rank: Option<u32>,
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// Everything one successful fetch produced. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceBoard {
    /// "Today's Result" or "Schedule of <date>"
    pub title: String,
    pub racecourses: Vec<Racecourse>,
    #[serde(default)]
    pub winners: Vec<Winner>,
    /// Timestamp reported by the backend, if any.
    #[serde(default)]
    pub source_timestamp: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl RaceBoard {
    /// A board for a valid response that carried no usable records.
    pub fn empty(title: impl Into<String>) -> Self {
        RaceBoard {
            title: title.into(),
            racecourses: Vec::new(),
            winners: Vec::new(),
            source_timestamp: None,
            fetched_at: Utc::now(),
        }
    }

    pub fn racecourse(&self, name: &str) -> Option<&Racecourse> {
        self.racecourses.iter().find(|rc| rc.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.racecourses.iter().all(|rc| rc.rounds.is_empty())
    }

    pub fn round_count(&self) -> usize {
        self.racecourses.iter().map(|rc| rc.rounds.len()).sum()
    }
}

impl fmt::Display for RaceBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} racecourses, {} rounds, {} winners",
            self.title,
            self.racecourses.len(),
            self.round_count(),
            self.winners.len(),
        )
    }
}

// ---------------------------------------------------------------------------
// Price helpers
// ---------------------------------------------------------------------------

/// A price is valid when it is finite and strictly positive.
pub fn is_valid_price(odds: f64) -> bool {
    odds.is_finite() && odds > 0.0
}

/// Fixed two-decimal currency rendering, independent of locale.
pub fn format_price(odds: f64) -> String {
    format!("${odds:.2}")
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failures of a fetch + normalize cycle.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PaddockError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Fetch cancelled")]
    Cancelled,

    #[error("Malformed input at {}: {reason}", describe_location(.index))]
    MalformedInput { index: Option<usize>, reason: String },

    #[error("No usable race records in response")]
    EmptyResult,
}

impl PaddockError {
    pub fn malformed(index: Option<usize>, reason: impl Into<String>) -> Self {
        PaddockError::MalformedInput {
            index,
            reason: reason.into(),
        }
    }

    /// Cancellation is an expected outcome, not a failure to report.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PaddockError::Cancelled)
    }
}

fn describe_location(index: &Option<usize>) -> String {
    match index {
        Some(i) => format!("racetrack #{i}"),
        None => "payload".to_string(),
    }
}

impl From<reqwest::Error> for PaddockError {
    fn from(err: reqwest::Error) -> Self {
        PaddockError::Network(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
