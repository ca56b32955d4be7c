//! Tabular export of the current board.
//!
//! Two formats: a sectioned CSV text and a multi-sheet XLSX workbook. Both
//! are pure functions of the board and the course selection; `save` is the
//! only part that touches the filesystem.

pub mod csv;
pub mod xlsx;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::analytics::movers::favorites;
use crate::analytics::winners::annotate_winners;
use crate::types::{RaceBoard, Racecourse};

// ---------------------------------------------------------------------------
// Format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" => Ok(ExportFormat::Xlsx),
            other => anyhow::bail!("Unknown export format: {other}"),
        }
    }
}

/// `racing-odds-2025-03-08T14-05-09.csv`
pub fn export_filename(now: DateTime<Utc>, format: ExportFormat) -> String {
    format!(
        "racing-odds-{}.{}",
        now.format("%Y-%m-%dT%H-%M-%S"),
        format.extension()
    )
}

// ---------------------------------------------------------------------------
// Course selection
// ---------------------------------------------------------------------------

/// Which racecourses an export (or a view) covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CourseSelection {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl CourseSelection {
    /// Parse a `courses=A,B` query value. Missing or blank means all.
    pub fn from_query(value: Option<&str>) -> Self {
        let names: BTreeSet<String> = value
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .collect();
        if names.is_empty() {
            CourseSelection::All
        } else {
            CourseSelection::Only(names)
        }
    }

    pub fn includes(&self, name: &str) -> bool {
        match self {
            CourseSelection::All => true,
            CourseSelection::Only(names) => names.contains(name),
        }
    }

    /// Selected racecourses, in board order.
    pub fn apply(&self, racecourses: &[Racecourse]) -> Vec<Racecourse> {
        racecourses
            .iter()
            .filter(|rc| self.includes(&rc.name))
            .cloned()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Serialize the selected part of `board` in `format`.
pub fn render(board: &RaceBoard, selection: &CourseSelection, format: ExportFormat) -> Result<Vec<u8>> {
    let selected = selection.apply(&board.racecourses);
    let movers = favorites(&selected);

    match format {
        ExportFormat::Csv => Ok(csv::render_csv(&selected, &movers).into_bytes()),
        ExportFormat::Xlsx => {
            let winners = annotate_winners(&board.racecourses, &board.winners);
            let sheets = xlsx::plan_workbook(&selected, &movers, &winners);
            xlsx::render_xlsx(&sheets)
        }
    }
}

/// Render and write into `dir`, returning the written path.
pub fn save(
    dir: &Path,
    board: &RaceBoard,
    selection: &CourseSelection,
    format: ExportFormat,
    now: DateTime<Utc>,
) -> Result<PathBuf> {
    let bytes = render(board, selection, format)
        .with_context(|| format!("Failed to render {format} export"))?;

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;
    let path = dir.join(export_filename(now, format));
    std::fs::write(&path, &bytes)
        .with_context(|| format!("Failed to write export to {}", path.display()))?;

    info!(path = %path.display(), bytes = bytes.len(), %format, "Export written");
    Ok(path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
