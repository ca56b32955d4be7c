//! Raw scraped payload schema.
//!
//! Mirrors what the scraping backend emits for each racetrack. Field shapes
//! are checked by serde; numeric fields arrive as strings or numbers and are
//! kept as `Scalar` so the normalizer can apply its lenient parsing rules.

use serde::Deserialize;

/// A JSON scalar that may hold a number in either text or numeric form.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
    #[default]
    Missing,
}

impl Scalar {
    /// Parse as a decimal price. Accepts a leading `$` and trailing junk
    /// after a numeric prefix ("3.50", "$3.50", "3.5F"); `None` otherwise.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) if n.is_finite() => Some(*n),
            Scalar::Number(_) => None,
            Scalar::Text(s) => {
                let s = s.trim();
                let s = s.strip_prefix('$').unwrap_or(s);
                leading_decimal(s)
            }
            Scalar::Missing => None,
        }
    }

    /// Parse as a non-negative integer from its leading digits.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Scalar::Number(n) if n.is_finite() && *n >= 0.0 => Some(n.trunc() as u32),
            Scalar::Number(_) => None,
            Scalar::Text(s) => {
                let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse().ok()
            }
            Scalar::Missing => None,
        }
    }

    /// Text form, for identifiers such as race numbers.
    pub fn as_text(&self) -> String {
        match self {
            Scalar::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
            Scalar::Number(n) => n.to_string(),
            Scalar::Text(s) => s.clone(),
            Scalar::Missing => String::new(),
        }
    }
}

/// Longest `[+-]?digits[.digits]` prefix of `s`, parsed.
fn leading_decimal(s: &str) -> Option<f64> {
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (i, c) in s.char_indices() {
        match c {
            '+' | '-' if i == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }
    if !seen_digit {
        return None;
    }
    s[..end].trim_end_matches('.').parse().ok()
}

/// One racetrack as scraped.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRacetrack {
    pub racetrack: String,
    #[serde(default)]
    pub tracklink_url: Option<String>,
    pub completed_races: Vec<RawRace>,
}

/// One race on a racetrack.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRace {
    #[serde(default)]
    pub race_number: Scalar,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub horses: Vec<RawHorse>,
    #[serde(default)]
    pub horse_count: Option<Scalar>,
}

/// One runner in a race.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHorse {
    #[serde(default)]
    pub rank: Scalar,
    #[serde(default)]
    pub horse_number: Scalar,
    #[serde(default)]
    pub horse_name: Option<String>,
    #[serde(default)]
    pub jockey: Option<String>,
    #[serde(default)]
    pub odds: RawOdds,
}

/// Every price column the scraper reports.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOdds {
    #[serde(default)]
    pub open: Scalar,
    #[serde(default)]
    pub fluc1: Scalar,
    #[serde(default)]
    pub fluc2: Scalar,
    #[serde(default)]
    pub win_fixed: Scalar,
    #[serde(default)]
    pub place_fixed: Scalar,
    #[serde(default)]
    pub each_way_fixed: Scalar,
}
