// src/config.rs
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, VerifyError};

/// Visibility cut-offs. Each stage keeps its own value; they are not unified.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityThresholds {
    pub classifier: f64,         // below this the classifier falls back to partial credit
    pub rep_counter: f64,        // frames below this never move the state machine
    pub form_gate: f64,          // key joints (shoulders, hips, knees)
    pub form_criteria: f64,      // per-exercise joint set checked before scoring
}

impl Default for VisibilityThresholds {
    fn default() -> Self {
        Self {
            classifier: 0.4,
            rep_counter: 0.5,
            form_gate: 0.5,
            form_criteria: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    pub analysis_stride: u64,          // analyze every Nth received frame
    pub audit_every: u64,              // snapshot every Nth analyzed frame
    pub keyframe_every: u64,           // keyframe every Nth analyzed frame
    pub max_keyframes: usize,
    pub max_audit_snapshots: usize,    // oldest snapshots are dropped past this
    pub form_window: usize,            // rolling window for the session average
    pub min_state_interval_ms: u64,    // rep state machine debounce
    pub classifier_threshold: f64,     // below this the detected kind is "unknown"
    pub keyframe_width: u32,
    pub keyframe_height: u32,
    pub keyframe_quality: u8,          // JPEG quality 1-100
    pub frame_channel_capacity: usize,
    pub update_channel_capacity: usize,
    pub visibility: VisibilityThresholds,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            analysis_stride: 2,
            audit_every: 15,
            keyframe_every: 75,
            max_keyframes: 4,
            max_audit_snapshots: 600,
            form_window: 100,
            min_state_interval_ms: 300,
            classifier_threshold: 0.5,
            keyframe_width: 480,
            keyframe_height: 360,
            keyframe_quality: 60,
            frame_channel_capacity: 64,
            update_channel_capacity: 32,
            visibility: VisibilityThresholds::default(),
        }
    }
}

impl VerifierConfig {
    /// Reads a JSON config file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| VerifyError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        let config: VerifierConfig = serde_json::from_str(&text)?;
        Ok(config.sanitized())
    }

    /// Loads `config.json` from the per-user config directory, or defaults.
    pub fn load_or_default() -> Self {
        let Some(path) = default_config_path() else {
            return Self::default();
        };
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable config");
                Self::default()
            }
        }
    }

    /// Clamps values that would otherwise divide by zero or disable the pipeline.
    pub fn sanitized(mut self) -> Self {
        self.analysis_stride = self.analysis_stride.max(1);
        self.audit_every = self.audit_every.max(1);
        self.keyframe_every = self.keyframe_every.max(1);
        self.form_window = self.form_window.max(1);
        self.keyframe_quality = self.keyframe_quality.clamp(1, 100);
        self.frame_channel_capacity = self.frame_channel_capacity.max(1);
        self.update_channel_capacity = self.update_channel_capacity.max(1);
        self
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "exercise-verifier", "exercise-verifier")
        .map(|dirs| dirs.config_dir().join("config.json"))
}
