//! Raw scraped racetracks → canonical racecourses.
//!
//! Shapes are validated per racetrack against the schema in `feed::raw`;
//! a mismatch fails with `MalformedInput` naming the racetrack index.
//! Numeric fields are permissive: anything unparsable becomes `0` and is
//! logged, so one bad cell never loses a whole card.

use serde::Deserialize;
use std::fmt;
use tracing::{debug, warn};

use crate::feed::raw::{RawHorse, RawOdds, RawRace, RawRacetrack, Scalar};
use crate::types::{Horse, PaddockError, Racecourse, Round};

/// Placeholder used when a race has no start time.
const MISSING_TIME: &str = "N/A";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Which scraped price column becomes the canonical `odds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OddsField {
    #[default]
    WinFixed,
    PlaceFixed,
    EachWayFixed,
    Open,
}

impl OddsField {
    fn pick<'a>(&self, odds: &'a RawOdds) -> &'a Scalar {
        match self {
            OddsField::WinFixed => &odds.win_fixed,
            OddsField::PlaceFixed => &odds.place_fixed,
            OddsField::EachWayFixed => &odds.each_way_fixed,
            OddsField::Open => &odds.open,
        }
    }
}

impl fmt::Display for OddsField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OddsField::WinFixed => write!(f, "winFixed"),
            OddsField::PlaceFixed => write!(f, "placeFixed"),
            OddsField::EachWayFixed => write!(f, "eachWayFixed"),
            OddsField::Open => write!(f, "open"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NormalizeOptions {
    pub odds_field: OddsField,
    /// Drop the first race of the first racetrack (schedule payloads lead
    /// with a placeholder slot).
    pub skip_first_race_of_first_track: bool,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Normalize a raw `data` array from the scraping backend.
pub fn normalize(
    raw: &serde_json::Value,
    options: &NormalizeOptions,
) -> Result<Vec<Racecourse>, PaddockError> {
    let items = raw
        .as_array()
        .ok_or_else(|| PaddockError::malformed(None, format!("expected an array, got {}", kind_of(raw))))?;

    let mut racecourses = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let track = RawRacetrack::deserialize(item)
            .map_err(|e| PaddockError::malformed(Some(index), e.to_string()))?;
        let skip_first = index == 0 && options.skip_first_race_of_first_track;
        racecourses.push(normalize_track(&track, options.odds_field, skip_first));
    }

    debug!(
        racecourses = racecourses.len(),
        odds_field = %options.odds_field,
        "Normalized scraped racetracks"
    );
    Ok(racecourses)
}

/// Parse a round number out of a race label: first decimal run ("R12" → 12),
/// else the whole label as an integer, else `0`.
pub fn parse_round_number(label: &str) -> u32 {
    let digits: String = label
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if !digits.is_empty() {
        if let Ok(n) = digits.parse() {
            return n;
        }
    }
    label.trim().parse().unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

fn normalize_track(track: &RawRacetrack, field: OddsField, skip_first: bool) -> Racecourse {
    let races = if skip_first {
        track.completed_races.get(1..).unwrap_or(&[])
    } else {
        &track.completed_races[..]
    };

    Racecourse {
        name: track.racetrack.clone(),
        rounds: races
            .iter()
            .map(|race| normalize_race(&track.racetrack, race, field))
            .collect(),
    }
}

fn normalize_race(track: &str, race: &RawRace, field: OddsField) -> Round {
    let label = race.race_number.as_text();
    let round_number = parse_round_number(&label);
    if round_number == 0 {
        warn!(track, race = %label, "Unparsable race number, using 0");
    }

    let time = match race.time.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => MISSING_TIME.to_string(),
    };

    Round {
        round_number,
        time,
        horses: race
            .horses
            .iter()
            .map(|h| normalize_horse(track, round_number, h, field))
            .collect(),
    }
}

fn normalize_horse(track: &str, round: u32, horse: &RawHorse, field: OddsField) -> Horse {
    let number = horse.horse_number.as_u32().unwrap_or_else(|| {
        warn!(track, round, raw = ?horse.horse_number, "Unparsable horse number, using 0");
        0
    });

    let position = horse.rank.as_u32().unwrap_or_else(|| {
        debug!(track, round, number, raw = ?horse.rank, "Unparsable rank, using 0");
        0
    });

    let odds = match field.pick(&horse.odds).as_f64() {
        Some(o) if o >= 0.0 => o,
        other => {
            // Empty or scratched prices are routine; keep this quiet.
            debug!(track, round, number, %field, parsed = ?other, "No usable price, using 0");
            0.0
        }
    };

    Horse {
        number,
        position,
        odds,
        previous_odds: None,
        name: horse.horse_name.clone().filter(|n| !n.trim().is_empty()),
        jockey: horse.jockey.clone().filter(|j| !j.trim().is_empty()),
    }
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
