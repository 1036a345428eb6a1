// rtslam_sim/src/simulation/core/config.rs

use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use rtslam_core::config::AbslocConfig;
use rtslam_core::hardware::ChannelSet;

// =========================================================================
// == Top-Level Configuration ==
// =========================================================================

/// # ScenarioConfig
/// Everything needed to run one scenario, parsed from a `scenario.toml` file.
/// Missing sections and fields fall back to [`ScenarioConfig::default`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)] // Fail if the TOML has fields not in our struct
pub struct ScenarioConfig {
    #[serde(default)] // Use default if the [simulation] section is missing
    pub simulation: Simulation,

    #[serde(default)]
    pub robot: RobotConfig,

    #[serde(default)]
    pub sensor: SensorConfig,

    #[serde(default)]
    pub map: MapConfig,
}

impl ScenarioConfig {
    /// Layers the scenario file over the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Self::figment()
            .merge(Toml::file(path.as_ref()))
            .extract()
    }

    /// Same as [`ScenarioConfig::load`] for an in-memory TOML document.
    pub fn from_toml_str(toml: &str) -> Result<Self, figment::Error> {
        Self::figment().merge(Toml::string(toml)).extract()
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(ScenarioConfig::default()))
    }
}

// =========================================================================
// == Configuration Sub-Structs ==
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Simulation {
    /// Optional seed for the pseudo-random number generator for determinism.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Duration of the simulation in seconds.
    pub duration_seconds: f64,
    /// Rate of the sensor, and of the estimator loop, in Hz.
    pub rate_hz: f64,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            seed: None,
            duration_seconds: 20.0,
            rate_hz: 10.0,
        }
    }
}

/// Ground-truth motion and the estimator's random-walk process noise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RobotConfig {
    pub start_position: [f64; 3],
    pub start_yaw_deg: f64,
    /// Forward speed in m/s.
    pub speed: f64,
    /// Yaw rate in deg/s.
    pub yaw_rate_deg: f64,
    /// Position random-walk density, in m/sqrt(s).
    pub position_noise: f64,
    /// Quaternion random-walk density, per component, in 1/sqrt(s).
    pub orientation_noise: f64,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            start_position: [0.0; 3],
            start_yaw_deg: 0.0,
            speed: 1.0,
            yaw_rate_deg: 5.0,
            position_noise: 0.3,
            orientation_noise: 0.02,
        }
    }
}

/// A simulated absolute sensor and the estimator-side settings it runs with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensorConfig {
    pub channels: ChannelSet,
    /// Position noise standard deviation, in meters, per axis.
    pub position_noise_stddev: [f64; 3],
    /// Orientation noise standard deviation, in degrees, per Euler angle.
    pub orientation_noise_stddev_deg: [f64; 3],
    /// Number of readings the driver keeps before dropping the oldest.
    pub buffer_capacity: usize,
    /// Readings buffered at the start pose before the first fix is averaged.
    pub warmup_readings: usize,
    /// Time at which a one-shot re-initialization is requested.
    #[serde(default)]
    pub reinit_at_seconds: Option<f64>,
    #[serde(default)]
    pub absloc: AbslocConfig,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            channels: ChannelSet::FULL,
            position_noise_stddev: [0.1; 3],
            orientation_noise_stddev_deg: [1.0; 3],
            buffer_capacity: 64,
            warmup_readings: 10,
            reinit_at_seconds: None,
            absloc: AbslocConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapConfig {
    /// Capacity of the joint state.
    pub max_size: usize,
    /// Landmark positions, registered in the joint state at start-up.
    #[serde(default)]
    pub landmarks: Vec<[f64; 3]>,
    /// Prior standard deviation of every landmark coordinate, in meters.
    pub landmark_stddev: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            max_size: 64,
            landmarks: Vec::new(),
            landmark_stddev: 0.5,
        }
    }
}
