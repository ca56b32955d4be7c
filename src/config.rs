//! Configuration loading from TOML with environment variable overrides.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! section and field has a default, so a missing file or a partial file is
//! fine. `PADDOCK_API_URL` overrides `[api] base_url`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::export::ExportFormat;
use crate::feed::client::DEFAULT_BASE_URL;
use crate::normalize::{NormalizeOptions, OddsField};

pub const API_URL_ENV: &str = "PADDOCK_API_URL";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub normalizer: NormalizerConfig,
    pub refresh: RefreshConfig,
    pub export: ExportConfig,
    pub dashboard: DashboardConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Scrapes drive a browser on the backend and can take a while.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Which scraped price becomes the canonical odds.
    pub odds_field: OddsField,
    /// Drop the leading placeholder race of schedule payloads.
    pub skip_first_upcoming_race: bool,
}

impl NormalizerConfig {
    /// Base options; the scheduler decides per request whether to skip.
    pub fn options(&self) -> NormalizeOptions {
        NormalizeOptions {
            odds_field: self.odds_field,
            skip_first_race_of_first_track: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RefreshConfig {
    pub interval_minutes: u32,
    /// Start the auto-refresh timer at launch instead of a single fetch.
    pub auto_start: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 5,
            auto_start: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
    /// Write every new board to `output_dir`.
    pub auto_export: bool,
    pub formats: Vec<ExportFormat>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("exports"),
            auto_export: false,
            formats: vec![ExportFormat::Csv, ExportFormat::Xlsx],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub preferences_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            preferences_path: "paddock_preferences.json".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist, then apply environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::parse_file(path)?
        } else {
            info!(path, "No config file found, using defaults");
            AppConfig::default()
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn parse_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.api.base_url = url.trim().to_string();
        }
    }
}
