//! Application Configuration
//!
//! Persistent settings for qrshield.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::guard::{ThreatHeuristic, ThreatRules};
use crate::media::CameraRequest;
use crate::scanner::controller::{DEFAULT_SNAPSHOT_MARGIN, DEFAULT_TICK};
use crate::scanner::{DecodeOptions, ScannerConfig};

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Scanning ===
    /// Minimum time between decode attempts in milliseconds
    pub scan_interval_ms: u64,

    /// Width of the raster handed to the decoder
    pub scan_width: u32,

    /// Padding around the symbol when cropping the snapshot
    pub snapshot_margin: f32,

    /// Decoder tuning
    pub decode: DecodeOptions,

    // === Camera ===
    pub camera: CameraRequest,

    // === Screening ===
    /// Threat heuristic rule table
    pub threat_rules: ThreatRules,

    /// Ask before opening links flagged as dangerous
    pub confirm_dangerous_links: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scan_interval_ms: 250,
            scan_width: 400,
            snapshot_margin: DEFAULT_SNAPSHOT_MARGIN,
            decode: DecodeOptions::default(),
            camera: CameraRequest::default(),
            threat_rules: ThreatRules::default(),
            confirm_dangerous_links: true,
        }
    }
}

impl Settings {
    /// Get settings file path
    pub fn file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("qrshield").join("settings.json"))
    }

    /// Load settings from disk
    pub fn load() -> Result<Self> {
        let path = Self::file_path().ok_or_else(|| anyhow::anyhow!("No config directory"))?;
        Self::load_from(&path)
    }

    /// Load settings from `path`, falling back to defaults when it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(settings)
    }

    /// Save settings to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Controller configuration for a live camera scan
    pub fn scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            scan_interval: Duration::from_millis(self.scan_interval_ms),
            tick: DEFAULT_TICK,
            scan_width: self.scan_width,
            snapshot_margin: self.snapshot_margin.max(0.0),
            decode: self.decode,
            camera: self.camera.clone(),
            max_samples: None,
        }
    }

    /// Compile the rule table; bad patterns are reported here, not at scan time
    pub fn threat_heuristic(&self) -> Result<ThreatHeuristic> {
        ThreatHeuristic::new(&self.threat_rules).context("Invalid threat rules in settings")
    }
}
