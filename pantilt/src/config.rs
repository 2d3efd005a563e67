//! Tracker configuration.
//!
//! Defaults reproduce the classic pan/tilt servo setup: a pan loop with
//! gains 400/0/400, a tilt loop with 500/0/500, both driving position
//! servos over a 0-1000 range, and a 30 frame age gate before locking.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::detection::SignatureMap;
use crate::error::ConfigError;
use crate::lock::MINIMUM_BLOCK_AGE_TO_LOCK;
use crate::pid::{DeviceKind, PidGains, PidLimits};

/// Default pan loop gain (used for both P and D).
pub const PAN_GAIN: i32 = 400;
/// Default tilt loop gain (used for both P and D).
pub const TILT_GAIN: i32 = 500;

/// Settings for one actuator axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisConfig {
    pub gains: PidGains,
    #[serde(default)]
    pub device: DeviceKind,
}

impl AxisConfig {
    pub fn position(gains: PidGains) -> Self {
        Self {
            gains,
            device: DeviceKind::Position,
        }
    }

    pub fn velocity(gains: PidGains) -> Self {
        Self {
            gains,
            device: DeviceKind::Velocity,
        }
    }
}

/// Complete tracker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// A detection must be strictly older than this many frames to lock
    pub min_age_to_lock: u32,
    /// Horizontal axis loop
    pub pan: AxisConfig,
    /// Vertical axis loop
    pub tilt: AxisConfig,
    /// Bounds shared by both loops
    pub limits: PidLimits,
    /// Signatures considered for tracking
    pub signature_map: SignatureMap,
    /// Only the first N matching detections are considered
    pub max_detections: Option<usize>,
}

impl TrackerConfig {
    /// Check that all ranges are ordered.
    ///
    /// Gains are not checked; zero or negative gains are legal and simply
    /// produce a loop that does nothing (or drives the wrong way).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;
        if limits.integral_min > limits.integral_max {
            return Err(ConfigError::Invalid(format!(
                "integral range is inverted: [{}, {}]",
                limits.integral_min, limits.integral_max
            )));
        }
        if limits.position_min > limits.position_max {
            return Err(ConfigError::Invalid(format!(
                "position range is inverted: [{}, {}]",
                limits.position_min, limits.position_max
            )));
        }
        if limits.deadband < 0 {
            return Err(ConfigError::Invalid(format!(
                "deadband must not be negative, got {}",
                limits.deadband
            )));
        }
        if self.max_detections == Some(0) {
            return Err(ConfigError::Invalid(
                "max_detections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Save to JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from JSON file and validate.
    ///
    /// Missing fields take their default values.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_age_to_lock: MINIMUM_BLOCK_AGE_TO_LOCK,
            pan: AxisConfig::position(PidGains::new(PAN_GAIN, 0, PAN_GAIN)),
            tilt: AxisConfig::position(PidGains::new(TILT_GAIN, 0, TILT_GAIN)),
            limits: PidLimits::default(),
            signature_map: SignatureMap::ALL,
            max_detections: None,
        }
    }
}
