//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for the editing engine. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of history snapshots kept.
    pub history_limit: usize,
    /// Offset applied to each successive paste or duplicate.
    pub paste_offset: f64,
    /// Object-snap radius in screen pixels.
    pub snap_threshold_px: f64,
    /// Alignment-guide radius in screen pixels.
    pub guide_threshold_px: f64,
    pub grid_size: f64,
    /// Angle unit used by constrained line drawing.
    pub angle_snap_degrees: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub canvas_width: f64,
    pub canvas_height: f64,
    /// Segments per full circle when tessellating arcs and circles.
    pub arc_segments: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_limit: 50,
            paste_offset: 20.0,
            snap_threshold_px: 10.0,
            guide_threshold_px: crate::guides::GUIDE_THRESHOLD,
            grid_size: crate::snap::GRID_SIZE,
            angle_snap_degrees: 45.0,
            min_zoom: 0.1,
            max_zoom: 10.0,
            canvas_width: 1920.0,
            canvas_height: 1080.0,
            arc_segments: 64,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("paste_offset", self.paste_offset, true),
            ("snap_threshold_px", self.snap_threshold_px, true),
            ("guide_threshold_px", self.guide_threshold_px, true),
            ("grid_size", self.grid_size, false),
            ("angle_snap_degrees", self.angle_snap_degrees, false),
            ("min_zoom", self.min_zoom, false),
            ("max_zoom", self.max_zoom, false),
            ("canvas_width", self.canvas_width, false),
            ("canvas_height", self.canvas_height, false),
        ];
        for (name, value, zero_ok) in positive {
            if !value.is_finite() || value < 0.0 || (!zero_ok && value == 0.0) {
                return Err(ConfigError::Invalid(format!("{name} = {value}")));
            }
        }
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid("history_limit must be at least 1".into()));
        }
        if self.min_zoom > self.max_zoom {
            return Err(ConfigError::Invalid(format!(
                "min_zoom {} exceeds max_zoom {}",
                self.min_zoom, self.max_zoom
            )));
        }
        if self.arc_segments < crate::geometry::MIN_ARC_SEGMENTS {
            return Err(ConfigError::Invalid(format!(
                "arc_segments must be at least {}",
                crate::geometry::MIN_ARC_SEGMENTS
            )));
        }
        Ok(())
    }
}
