//! Persistence layer.
//!
//! A small key-value preference store saved to a JSON file. Values are
//! arbitrary JSON; the file is rewritten on every change.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default preferences file path.
const DEFAULT_PREFERENCES_FILE: &str = "paddock_preferences.json";

pub const ZOOM_KEY: &str = "zoom_level";
pub const DEFAULT_ZOOM: f64 = 1.0;
pub const MIN_ZOOM: f64 = 0.5;
pub const MAX_ZOOM: f64 = 2.0;

#[derive(Debug)]
pub struct PreferenceStore {
    path: PathBuf,
    values: BTreeMap<String, serde_json::Value>,
}

impl PreferenceStore {
    /// Open the store, loading existing values. A missing file is an empty store.
    pub fn open(path: Option<&str>) -> Result<Self> {
        let path = PathBuf::from(path.unwrap_or(DEFAULT_PREFERENCES_FILE));

        if !path.exists() {
            info!(path = %path.display(), "No saved preferences found, starting fresh");
            return Ok(Self {
                path,
                values: BTreeMap::new(),
            });
        }

        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read preferences from {}", path.display()))?;
        let values: BTreeMap<String, serde_json::Value> = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse preferences from {}", path.display()))?;

        info!(path = %path.display(), keys = values.len(), "Preferences loaded from disk");
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: &str, value: serde_json::Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        self.persist()?;
        debug!(key, "Preference saved");
        Ok(())
    }

    /// Returns whether the key existed.
    pub fn remove(&mut self, key: &str) -> Result<bool> {
        let existed = self.values.remove(key).is_some();
        if existed {
            self.persist()?;
        }
        Ok(existed)
    }

    // -- Text zoom -------------------------------------------------------

    pub fn zoom_level(&self) -> f64 {
        match self.get(ZOOM_KEY).and_then(serde_json::Value::as_f64) {
            Some(z) if z.is_finite() => z.clamp(MIN_ZOOM, MAX_ZOOM),
            Some(_) | None => DEFAULT_ZOOM,
        }
    }

    /// Store a zoom level clamped to 0.5–2.0 and return what was stored.
    pub fn set_zoom_level(&mut self, zoom: f64) -> Result<f64> {
        let zoom = if zoom.is_finite() {
            zoom.clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            warn!(zoom, "Ignoring non-finite zoom level");
            DEFAULT_ZOOM
        };
        self.set(ZOOM_KEY, serde_json::json!(zoom))?;
        Ok(zoom)
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.values)
            .context("Failed to serialise preferences")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write preferences to {}", self.path.display()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
