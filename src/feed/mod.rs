//! Race data feeds.
//!
//! Defines the `RaceSource` trait the scheduler fetches through, the request
//! kinds the scraping backend understands, and the raw payload schema.
//! `ApiClient` is the HTTP implementation; tests substitute their own.

pub mod client;
pub mod raw;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::engine::cancel::CancelToken;
use crate::types::{PaddockError, Winner};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Day selector for the upcoming-races endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateToken {
    Today,
    Tomorrow,
    Date(NaiveDate),
}

impl fmt::Display for DateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateToken::Today => write!(f, "today"),
            DateToken::Tomorrow => write!(f, "tomorrow"),
            DateToken::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl FromStr for DateToken {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "today" => Ok(DateToken::Today),
            "tomorrow" => Ok(DateToken::Tomorrow),
            other => NaiveDate::parse_from_str(other, "%Y-%m-%d")
                .map(DateToken::Date)
                .map_err(|_| anyhow::anyhow!("Unknown date token: {s}")),
        }
    }
}

/// What a single fetch asks the backend for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchRequest {
    /// Today's race cards and results.
    AllRaces,
    /// The schedule for a given day.
    Upcoming(DateToken),
    /// Today's winners only; the current board's racecourses are kept.
    Winners,
}

impl FetchRequest {
    /// Backend path for this request.
    pub fn path(&self) -> String {
        match self {
            FetchRequest::AllRaces => "/api/scrape/all-races".to_string(),
            FetchRequest::Upcoming(token) => format!("/api/scrape/upcoming/{token}"),
            FetchRequest::Winners => "/api/scrape/winners".to_string(),
        }
    }

    /// Board title shown for the resulting data.
    pub fn title(&self) -> String {
        match self {
            FetchRequest::AllRaces | FetchRequest::Winners => "Today's Result".to_string(),
            FetchRequest::Upcoming(token) => format!("Schedule of {token}"),
        }
    }

    pub fn is_schedule(&self) -> bool {
        matches!(self, FetchRequest::Upcoming(_))
    }
}

impl fmt::Display for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchRequest::AllRaces => write!(f, "all-races"),
            FetchRequest::Upcoming(token) => write!(f, "upcoming/{token}"),
            FetchRequest::Winners => write!(f, "winners"),
        }
    }
}

// ---------------------------------------------------------------------------
// Response envelope
// ---------------------------------------------------------------------------

/// `{ data: [...], timestamp?: string }` as returned by every scrape endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub timestamp: Option<String>,
}

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// Abstraction over the scraping backend.
///
/// Every call takes the fetch's `CancelToken`; implementations should
/// resolve to `PaddockError::Cancelled` promptly once it fires.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RaceSource: Send + Sync {
    /// Fetch raw racetrack records for a request.
    async fn fetch_races(
        &self,
        request: &FetchRequest,
        cancel: &CancelToken,
    ) -> Result<Envelope, PaddockError>;

    /// Fetch today's winners.
    async fn fetch_winners(&self, cancel: &CancelToken) -> Result<Vec<Winner>, PaddockError>;

    /// Probe backend health.
    async fn health(&self) -> Result<(), PaddockError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
