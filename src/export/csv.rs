//! Sectioned CSV export.
//!
//! Layout:
//!
//! ```text
//! RACE TABLES
//!
//! Racecourse: <name>
//! Round <n> - <time>
//! Horse No,Position,Horse Name,Odds
//! <no>,<pos>,"<name>",$<odds>
//!
//!
//!
//!
//! MARKET MOVERS
//!
//! Racecourse,Round,Time,Horse Number,Horse Name,Position,Odds
//! <course>,<round>,"<time>",<no>,"<name>",<pos>,$<odds>
//! ```
//!
//! Delimiters inside text are substituted rather than escaped: commas
//! become `;` and double quotes become `'`.

use crate::analytics::valid_ranked;
use crate::types::{format_price, Favorite, Racecourse};

pub const RACE_TABLES: &str = "RACE TABLES";
pub const MARKET_MOVERS: &str = "MARKET MOVERS";
pub const ROUND_COLUMNS: &str = "Horse No,Position,Horse Name,Odds";
pub const MOVER_COLUMNS: &str = "Racecourse,Round,Time,Horse Number,Horse Name,Position,Odds";

/// Make a value safe to place in a field.
fn clean(value: &str) -> String {
    value.replace(',', ";").replace('"', "'")
}

pub fn render_csv(racecourses: &[Racecourse], movers: &[Favorite]) -> String {
    let mut lines: Vec<String> = vec![RACE_TABLES.to_string(), String::new()];

    for course in racecourses {
        lines.push(format!("Racecourse: {}", clean(&course.name)));
        for round in &course.rounds {
            lines.push(format!("Round {} - {}", round.round_number, clean(&round.time)));
            lines.push(ROUND_COLUMNS.to_string());
            for horse in valid_ranked(&round.horses) {
                lines.push(format!(
                    "{},{},\"{}\",{}",
                    horse.number,
                    horse.position,
                    clean(horse.display_name()),
                    format_price(horse.odds),
                ));
            }
            lines.push(String::new());
        }
        lines.push(String::new());
    }

    lines.push(String::new());
    lines.push(String::new());
    lines.push(MARKET_MOVERS.to_string());
    lines.push(String::new());
    lines.push(MOVER_COLUMNS.to_string());
    for fav in movers {
        lines.push(format!(
            "{},{},\"{}\",{},\"{}\",{},{}",
            clean(&fav.racecourse),
            fav.round,
            clean(&fav.time),
            fav.horse_number,
            clean(fav.horse_name.as_deref().unwrap_or_default()),
            fav.position,
            format_price(fav.odds),
        ));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
