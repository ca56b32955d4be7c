//! Multi-sheet XLSX export.
//!
//! The workbook is planned as plain rows first (`plan_workbook`), then
//! written with rust_xlsxwriter. Sheets, in order:
//!   - one per selected racecourse
//!   - `Market Movers`
//!   - `Winners`, only when winners exist

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};
use std::collections::HashSet;

use crate::analytics::dutch::{format_signed_pct, top_dutch};
use crate::analytics::winners::{sort_by_time, RankedWinner};
use crate::analytics::{ordinal, ranked_prices, top_numbers, valid_ranked};
use crate::types::{format_price, Favorite, Racecourse, Round};

/// Excel's sheet name limit.
const MAX_SHEET_NAME: usize = 31;
const FORBIDDEN: [char; 7] = [':', '\\', '/', '?', '*', '[', ']'];

const RACECOURSE_WIDTHS: &[f64] = &[10.0, 10.0, 25.0, 20.0, 10.0];
const MOVERS_WIDTHS: &[f64] = &[20.0, 8.0, 10.0, 12.0, 25.0, 20.0, 10.0, 10.0];
const WINNERS_WIDTHS: &[f64] = &[20.0, 8.0, 10.0, 10.0, 25.0, 20.0, 10.0, 8.0];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
}

impl Cell {
    fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }
}

/// One planned worksheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetPlan {
    pub name: String,
    pub widths: &'static [f64],
    /// Empty rows are blank separators.
    pub rows: Vec<Vec<Cell>>,
}

// ---------------------------------------------------------------------------
// Sheet names
// ---------------------------------------------------------------------------

/// Truncate to 31 characters, then strip `: \ / ? * [ ]`. Excel also
/// rejects names that start or end with an apostrophe.
pub fn sheet_name(raw: &str) -> String {
    let truncated: String = raw.chars().take(MAX_SHEET_NAME).collect();
    let cleaned: String = truncated.chars().filter(|c| !FORBIDDEN.contains(c)).collect();
    let cleaned = cleaned.trim_matches(|c: char| c == '\'' || c.is_whitespace());
    if cleaned.is_empty() {
        "Sheet".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Excel compares sheet names case-insensitively.
fn unique_name(base: String, used: &mut HashSet<String>) -> String {
    if used.insert(base.to_lowercase()) {
        return base;
    }
    for n in 2.. {
        let suffix = format!(" ({n})");
        let keep = MAX_SHEET_NAME.saturating_sub(suffix.chars().count());
        let stem: String = base.chars().take(keep).collect();
        let candidate = format!("{}{suffix}", stem.trim_end());
        if used.insert(candidate.to_lowercase()) {
            return candidate;
        }
    }
    unreachable!("sheet name suffixes are unbounded")
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

pub fn plan_workbook(
    racecourses: &[Racecourse],
    movers: &[Favorite],
    winners: &[RankedWinner],
) -> Vec<SheetPlan> {
    let mut used = HashSet::new();
    let mut sheets: Vec<SheetPlan> = racecourses
        .iter()
        .map(|rc| SheetPlan {
            name: unique_name(sheet_name(&rc.name), &mut used),
            widths: RACECOURSE_WIDTHS,
            rows: rc.rounds.iter().flat_map(round_rows).collect(),
        })
        .collect();

    sheets.push(SheetPlan {
        name: unique_name("Market Movers".to_string(), &mut used),
        widths: MOVERS_WIDTHS,
        rows: mover_rows(movers),
    });

    if !winners.is_empty() {
        sheets.push(SheetPlan {
            name: unique_name("Winners".to_string(), &mut used),
            widths: WINNERS_WIDTHS,
            rows: winner_rows(winners),
        });
    }
    sheets
}

fn round_rows(round: &Round) -> Vec<Vec<Cell>> {
    let mut rows = vec![
        vec![Cell::Text(format!("Round {} - {}", round.round_number, round.time))],
        ["Horse No", "Rank", "Horse Name", "Jockey", "Odds"]
            .into_iter()
            .map(Cell::text)
            .collect(),
    ];

    let priced = valid_ranked(&round.horses);
    for (i, horse) in priced.iter().enumerate() {
        rows.push(vec![
            Cell::Number(f64::from(horse.number)),
            Cell::Text(ordinal(i + 1)),
            Cell::text(horse.display_name()),
            Cell::text(horse.display_jockey()),
            Cell::Text(format_price(horse.odds)),
        ]);
    }
    rows.push(Vec::new());

    let prices = ranked_prices(round);
    let pct = |n| top_dutch(&prices, n).map(format_signed_pct).unwrap_or_else(|| "-".into());
    rows.push(vec![Cell::text("T2"), Cell::Text(pct(2))]);
    rows.push(vec![Cell::text("T3"), Cell::Text(pct(3))]);
    if let Some(top6) = top_numbers(&priced, 6) {
        let joined = top6.iter().map(u32::to_string).collect::<Vec<_>>().join(",");
        rows.push(vec![Cell::text("Top6"), Cell::Text(joined)]);
    }
    rows.push(Vec::new());
    rows
}

fn mover_rows(movers: &[Favorite]) -> Vec<Vec<Cell>> {
    let mut rows = vec![
        vec![Cell::text("MARKET MOVERS")],
        [
            "Racecourse", "Round", "Time", "Horse Number", "Horse Name", "Jockey", "Position", "Odds",
        ]
        .into_iter()
        .map(Cell::text)
        .collect(),
    ];
    for fav in movers {
        rows.push(vec![
            Cell::text(fav.racecourse.as_str()),
            Cell::Number(f64::from(fav.round)),
            Cell::text(fav.time.as_str()),
            Cell::Number(f64::from(fav.horse_number)),
            Cell::text(fav.horse_name.as_deref().unwrap_or_default()),
            Cell::text(fav.jockey.as_deref().unwrap_or("N/A")),
            Cell::Number(f64::from(fav.position)),
            Cell::Text(format_price(fav.odds)),
        ]);
    }
    rows
}

fn winner_rows(winners: &[RankedWinner]) -> Vec<Vec<Cell>> {
    let mut sorted = winners.to_vec();
    sort_by_time(&mut sorted);

    let mut rows = vec![[
        "Racecourse", "Race", "Time", "Horse No", "Horse Name", "Jockey", "Win Odds", "Rank",
    ]
    .into_iter()
    .map(Cell::text)
    .collect::<Vec<_>>()];
    for w in &sorted {
        let horse = &w.winner.winner;
        rows.push(vec![
            Cell::text(w.winner.racecourse.as_str()),
            Cell::text(w.winner.race_number.as_str()),
            Cell::text(w.winner.time.as_str()),
            Cell::Number(f64::from(horse.number)),
            Cell::text(horse.name.as_str()),
            Cell::text(horse.jockey.as_str()),
            Cell::Text(format_price(horse.win_odds)),
            Cell::text(w.rank_label.as_str()),
        ]);
    }
    rows
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

pub fn render_xlsx(sheets: &[SheetPlan]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    for plan in sheets {
        let sheet = workbook.add_worksheet();
        sheet
            .set_name(plan.name.as_str())
            .with_context(|| format!("invalid sheet name {:?}", plan.name))?;
        for (col, width) in plan.widths.iter().enumerate() {
            sheet.set_column_width(col as u16, *width)?;
        }
        write_rows(sheet, &plan.rows)?;
    }
    workbook
        .save_to_buffer()
        .context("failed to serialize workbook")
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<Cell>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, cell) in row.iter().enumerate() {
            let (r, c) = (row_idx as u32, col_idx as u16);
            let written = match cell {
                Cell::Text(s) => worksheet.write_string(r, c, s.as_str()),
                Cell::Number(n) => worksheet.write_number(r, c, *n),
            };
            written.with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
