//! Lab configuration, loaded from JSON.
//!
//! Every field has a default so a partial document (or `{}`) is a valid configuration.

use std::f64::consts::PI;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kinematics::Kinematics;
use crate::pose::Pose;
use crate::ray::{RayCaster, RAY_STEP};
use crate::regression::TrainerOptions;
use crate::sensor::{MissingBoundary, SensorOffsets, FINE_FAN_COUNT};
use crate::store::SAMPLE_STORE_PATH;
use crate::track::Track;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Which sensor fan feeds training and prediction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FanConfig {
    /// ±90°, ±45°, 0°.
    #[default]
    Coarse,
    /// `count` rays evenly covering `spread` radians (a half-turn by default).
    Even {
        count: usize,
        #[serde(default = "default_spread")]
        spread: f64,
    },
    /// Explicit offsets in radians.
    Custom { offsets: Vec<f64> },
}

fn default_spread() -> f64 {
    PI
}

impl FanConfig {
    pub fn offsets(&self) -> Option<SensorOffsets> {
        match self {
            FanConfig::Coarse => Some(SensorOffsets::coarse()),
            FanConfig::Even { count, spread } => SensorOffsets::even_spread(*count, *spread),
            FanConfig::Custom { offsets } => SensorOffsets::new(offsets.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    #[serde(default)]
    pub fan: FanConfig,
    #[serde(default = "default_ray_step")]
    pub ray_step: f64,
    /// Upper bound on samples per ray; defaults to the track diagonal.
    #[serde(default)]
    pub max_steps: Option<usize>,
    #[serde(default)]
    pub missing_boundary: MissingBoundary,
}

fn default_ray_step() -> f64 {
    RAY_STEP
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            fan: FanConfig::default(),
            ray_step: RAY_STEP,
            max_steps: None,
            missing_boundary: MissingBoundary::default(),
        }
    }
}

impl SensorConfig {
    pub fn caster(&self) -> RayCaster {
        RayCaster::new(self.ray_step, self.max_steps)
    }
}

/// Fine fan logged next to each sample during data collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,
    #[serde(default = "default_telemetry_count")]
    pub count: usize,
}

fn default_telemetry_enabled() -> bool {
    true
}

fn default_telemetry_count() -> usize {
    FINE_FAN_COUNT
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            count: FINE_FAN_COUNT,
        }
    }
}

/// Start pose, expressed relative to the track size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StartConfig {
    #[serde(default = "default_x_fraction")]
    pub x_fraction: f64,
    #[serde(default = "default_y_fraction")]
    pub y_fraction: f64,
    #[serde(default = "default_heading")]
    pub heading: f64,
}

fn default_x_fraction() -> f64 {
    0.5
}

fn default_y_fraction() -> f64 {
    1.0 / 6.0
}

fn default_heading() -> f64 {
    PI
}

impl Default for StartConfig {
    fn default() -> Self {
        Self {
            x_fraction: default_x_fraction(),
            y_fraction: default_y_fraction(),
            heading: default_heading(),
        }
    }
}

impl StartConfig {
    pub fn pose(&self, track: &Track) -> Pose {
        Pose::new(
            f64::from(track.width()) * self.x_fraction,
            f64::from(track.height()) * self.y_fraction,
            self.heading,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabConfig {
    #[serde(default = "default_store_path")]
    pub store_path: String,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default)]
    pub kinematics: Kinematics,
    #[serde(default)]
    pub start: StartConfig,
    #[serde(default)]
    pub sensors: SensorConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub training: TrainerOptions,
}

fn default_store_path() -> String {
    SAMPLE_STORE_PATH.to_string()
}

fn default_tick_interval_ms() -> u64 {
    10
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            tick_interval_ms: default_tick_interval_ms(),
            kinematics: Kinematics::default(),
            start: StartConfig::default(),
            sensors: SensorConfig::default(),
            telemetry: TelemetryConfig::default(),
            training: TrainerOptions::default(),
        }
    }
}

impl LabConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sensors.ray_step > 0.0 && self.sensors.ray_step.is_finite()) {
            return Err(ConfigError::Invalid("sensors.ray_step must be positive and finite"));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be non-zero"));
        }
        if self.sensors.max_steps == Some(0) {
            return Err(ConfigError::Invalid("sensors.max_steps must be non-zero"));
        }
        if self.sensors.fan.offsets().is_none() {
            return Err(ConfigError::Invalid("sensors.fan must contain at least one finite offset"));
        }
        if let MissingBoundary::Cap { max_distance } = self.sensors.missing_boundary {
            if !(max_distance > 0.0 && max_distance.is_finite()) {
                return Err(ConfigError::Invalid(
                    "sensors.missing_boundary.max_distance must be positive and finite",
                ));
            }
        }
        if self.telemetry.enabled && self.telemetry.count == 0 {
            return Err(ConfigError::Invalid("telemetry.count must be non-zero when enabled"));
        }
        if !self.kinematics.speed.is_finite() || !self.kinematics.angular_step.is_finite() {
            return Err(ConfigError::Invalid("kinematics constants must be finite"));
        }
        Ok(())
    }

    /// Pacing for [`crate::session::drive`].
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// The validated training/prediction fan.
    pub fn offsets(&self) -> Result<SensorOffsets, ConfigError> {
        self.sensors
            .fan
            .offsets()
            .ok_or(ConfigError::Invalid("sensors.fan must contain at least one finite offset"))
    }
}
