//! Configuration management for dynamic parameter tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling fast iteration without recompilation. The gating constants
//! (fall speed, minimum note height, detection margin, grace window) and
//! the canvas/clock/render parameters can all be adjusted via the config
//! file for rapid experimentation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub canvas: CanvasConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

/// Hit-line gating parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Pixels per millisecond at 120 BPM
    pub base_speed: f64,
    /// Lower bound for a note's drawn height in pixels
    pub min_height: f64,
    /// Distance above the canvas bottom at which a note counts as touching the hit-line
    pub detection_margin: f64,
    /// Delay between losing coverage and pausing
    pub grace_window_ms: u64,
}

impl GateConfig {
    pub fn grace_window(&self) -> Duration {
        Duration::from_millis(self.grace_window_ms)
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            base_speed: 0.3,
            min_height: 10.0,
            detection_margin: 6.0,
            grace_window_ms: 200,
        }
    }
}

/// Drawing surface dimensions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: f64,
    /// The hit-line sits at the bottom edge
    pub height: f64,
    /// Horizontal margin on both sides
    pub margin: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 1192.0,
            height: 500.0,
            margin: 0.0,
        }
    }
}

/// Clock driver parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Lower clamp for a frame delta (1/120 s)
    pub min_frame_ms: f64,
    /// Upper clamp for a frame delta (1/30 s)
    pub max_frame_ms: f64,
    /// Animation ticker period used by the async engine
    pub frame_interval_ms: u64,
    /// Distance covered by the step-back transport command
    pub step_back_seconds: f64,
}

impl ClockConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            min_frame_ms: 1000.0 / 120.0,
            max_frame_ms: 1000.0 / 30.0,
            frame_interval_ms: 16,
            step_back_seconds: 5.0,
        }
    }
}

/// Colors for a single track, natural and sharp lanes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackColors {
    pub normal: u32,
    pub sharp: u32,
}

/// Draw descriptor styling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub min_alpha: f32,
    pub max_alpha: f32,
    pub corner_radius: f64,
    /// Indexed by track id
    pub track_palette: Vec<TrackColors>,
    /// Used for tracks beyond the palette
    pub fallback_colors: TrackColors,
}

impl RenderConfig {
    pub fn colors_for_track(&self, track: u32) -> TrackColors {
        self.track_palette
            .get(track as usize)
            .copied()
            .unwrap_or(self.fallback_colors)
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            min_alpha: 0.7,
            max_alpha: 1.0,
            corner_radius: 5.0,
            track_palette: vec![
                TrackColors {
                    normal: 0xb500ff,
                    sharp: 0x530076,
                },
                TrackColors {
                    normal: 0xff00d2,
                    sharp: 0x7a0164,
                },
            ],
            fallback_colors: TrackColors {
                normal: 0xc772ff,
                sharp: 0x9900ff,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or the defaults if the file doesn't exist
    /// or the JSON is invalid. Missing sections and fields take defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default asset location
    pub fn load() -> Self {
        Self::load_from_file("assets/keyfall_config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.gate.base_speed, 0.3);
        assert_eq!(config.gate.min_height, 10.0);
        assert_eq!(config.gate.detection_margin, 6.0);
        assert_eq!(config.gate.grace_window(), Duration::from_millis(200));
        assert_eq!(config.canvas.height, 500.0);
        assert_eq!(config.clock.frame_interval(), Duration::from_millis(16));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.gate.grace_window_ms, config.gate.grace_window_ms);
        assert_eq!(parsed.render.track_palette, config.render.track_palette);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{ "gate": { "grace_window_ms": 350 } }"#).unwrap();
        assert_eq!(parsed.gate.grace_window_ms, 350);
        assert_eq!(parsed.gate.base_speed, 0.3);
        assert_eq!(parsed.canvas.width, 1192.0);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_file("does/not/exist.json");
        assert_eq!(config.gate.grace_window_ms, 200);
    }

    #[test]
    fn test_track_color_fallback() {
        let render = RenderConfig::default();
        assert_eq!(render.colors_for_track(1).normal, 0xff00d2);
        assert_eq!(render.colors_for_track(9).sharp, 0x9900ff);
    }
}
