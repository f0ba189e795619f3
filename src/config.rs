// config.rs: Threshold surface for the event trackers and the policy constants
// of the orientation, calibration and smoothing stages.
//
// The trackers behave identically whether the values came from a file or from
// `EventConfig::default()`. A missing or malformed file is never fatal.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::ConfigError;

// ─── Tracker thresholds ──────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    // ── Turns ──
    pub turn_magnitude_threshold: f64,
    pub left_turn_threshold: f64,
    pub right_turn_threshold: f64,
    pub turn_continuous_count_window: usize,

    // ── Longitudinal ──
    pub g_force_accelerator_threshold: f64,
    pub g_force_decelerator_threshold: f64,
    pub acceleration_continuous_count_window: usize,
    pub deceleration_continuous_count_window: usize,

    // ── Stop ──
    pub stop_end_continuous_count_window: usize,
    pub stop_magnitude_low: f64,
    pub stop_magnitude_high: f64,
    /// m/s, same unit as `GnssFix::speed`
    pub stop_min_speed: f64,

    // ── Orientation ──
    pub orientation_dead_zone: f64,
    pub orientation_confirmation_count: usize,

    // ── Tilt calibration ──
    pub calibration_magnitude_low: f64,
    pub calibration_magnitude_high: f64,
    pub calibration_short_window: usize,
    pub calibration_long_window: usize,
    pub calibration_min_published: usize,

    // ── Smoothing ──
    pub process_variance: f64,
    pub observation_variance: f64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            turn_magnitude_threshold: 0.2,
            left_turn_threshold: 0.15,
            right_turn_threshold: -0.15,
            turn_continuous_count_window: 10,
            g_force_accelerator_threshold: 0.25,
            g_force_decelerator_threshold: -0.25,
            acceleration_continuous_count_window: 10,
            deceleration_continuous_count_window: 10,
            stop_end_continuous_count_window: 100,
            stop_magnitude_low: 0.96,
            stop_magnitude_high: 1.04,
            stop_min_speed: 1.5,
            orientation_dead_zone: 0.05,
            orientation_confirmation_count: 10,
            calibration_magnitude_low: 0.96,
            calibration_magnitude_high: 1.04,
            calibration_short_window: 30,
            calibration_long_window: 100,
            calibration_min_published: 1,
            process_variance: 2.0,
            observation_variance: 2.0,
        }
    }
}

impl EventConfig {
    /// Load thresholds from a JSON file, falling back to the defaults when the file
    /// is missing or cannot be parsed. Absent keys take their default value.
    pub fn load_or_default(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Config {} not readable ({}), using defaults", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str::<EventConfig>(&content) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Config {} is invalid ({}), using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }
}

// ─── Channel wiring ──────────────────────────────────────────────────────────

/// What a broadcaster does when a subscriber's queue is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPolicy {
    /// Wait until the subscriber has room. A slow subscriber stalls the producer.
    #[default]
    Block,
    /// Drop the item for that subscriber only.
    DropNewest,
}

impl FromStr for DeliveryPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block" => Ok(DeliveryPolicy::Block),
            "drop" | "drop_newest" | "drop-newest" => Ok(DeliveryPolicy::DropNewest),
            other => Err(ConfigError::UnknownPolicy(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    pub events: EventConfig,
    /// Queue depth of every stage link and subscription; clamped to at least 1
    pub channel_capacity: usize,
    pub delivery: DeliveryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            events: EventConfig::default(),
            channel_capacity: 1,
            delivery: DeliveryPolicy::Block,
        }
    }
}

impl PipelineConfig {
    pub fn capacity(&self) -> usize {
        self.channel_capacity.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("drive_events_config_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = EventConfig::load_or_default(Path::new("/nonexistent/drive-events.json"));
        assert_eq!(config, EventConfig::default());
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let path = scratch_path("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(EventConfig::load_or_default(&path), EventConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let path = scratch_path("partial.json");
        fs::write(&path, r#"{"turn_continuous_count_window": 20, "left_turn_threshold": 0.1}"#).unwrap();
        let config = EventConfig::load_or_default(&path);
        assert_eq!(config.turn_continuous_count_window, 20);
        assert_eq!(config.left_turn_threshold, 0.1);
        assert_eq!(config.stop_end_continuous_count_window, 100);
    }

    #[test]
    fn test_save_then_load() {
        let path = scratch_path("saved.json");
        let mut config = EventConfig::default();
        config.g_force_accelerator_threshold = 0.3;
        config.save(&path).unwrap();
        assert_eq!(EventConfig::load_or_default(&path), config);
    }

    #[test]
    fn test_delivery_policy_parse() {
        assert_eq!("block".parse::<DeliveryPolicy>().unwrap(), DeliveryPolicy::Block);
        assert_eq!("Drop-Newest".parse::<DeliveryPolicy>().unwrap(), DeliveryPolicy::DropNewest);
        assert!("oldest".parse::<DeliveryPolicy>().is_err());
    }

    #[test]
    fn test_capacity_never_zero() {
        let config = PipelineConfig { channel_capacity: 0, ..PipelineConfig::default() };
        assert_eq!(config.capacity(), 1);
    }
}
