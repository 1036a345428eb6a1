// rtslam_core/src/config.rs

use nalgebra::{Vector3, Vector4};
use serde::{Deserialize, Serialize};

use crate::math::quaternion;

/// How a driver reports the per-axis uncertainty of its readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UncertaintyEncoding {
    /// The reported value is the variance and is used as-is.
    #[default]
    Variance,
    /// The reported value is a standard deviation and is squared.
    StdDev,
}

impl UncertaintyEncoding {
    /// Converts a reported uncertainty into a variance.
    pub fn to_variance(self, reported: f64) -> f64 {
        match self {
            UncertaintyEncoding::Variance => reported,
            UncertaintyEncoding::StdDev => reported * reported,
        }
    }
}

/// Weights used when averaging buffered readings into a first fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AverageWeighting {
    /// Each reading is weighted by its reported uncertainty.
    #[default]
    Variance,
    /// Each reading is weighted by the inverse of its reported uncertainty.
    Precision,
}

impl AverageWeighting {
    pub fn weight(self, uncertainty: f64) -> f64 {
        match self {
            AverageWeighting::Variance => uncertainty,
            AverageWeighting::Precision => 1.0 / uncertainty,
        }
    }
}

/// Mounting pose of a sensor in the robot frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MountingPose {
    /// Lever arm from the robot origin to the sensor, in meters.
    #[serde(default)]
    pub lever_arm: [f64; 3],
    /// Sensor orientation offset as `[roll, pitch, yaw]` in degrees.
    #[serde(default)]
    pub orientation_deg: [f64; 3],
}

impl MountingPose {
    pub fn translation(&self) -> Vector3<f64> {
        Vector3::from(self.lever_arm)
    }

    pub fn orientation(&self) -> Vector4<f64> {
        let e = Vector3::from(self.orientation_deg).map(f64::to_radians);
        quaternion::from_euler(&e)
    }
}

/// Configuration of an absolute localization sensor (GPS, motion capture...).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AbslocConfig {
    /// Estimate the sensor's absolute frame directly. When `false`, the robot
    /// starts at the origin and the first fix becomes the sensor origin offset.
    #[serde(default)]
    pub absolute: bool,
    #[serde(default)]
    pub mounting: MountingPose,
    #[serde(default)]
    pub uncertainty: UncertaintyEncoding,
    #[serde(default)]
    pub averaging: AverageWeighting,
    /// Squared Mahalanobis distance above which an innovation is rejected.
    #[serde(default)]
    pub gate: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_defaults_are_literal_conventions() {
        let config = AbslocConfig::default();
        assert!(!config.absolute);
        assert_eq!(config.uncertainty, UncertaintyEncoding::Variance);
        assert_eq!(config.averaging, AverageWeighting::Variance);
        assert_eq!(config.gate, None);
    }

    #[test]
    fn test_uncertainty_encoding_to_variance() {
        assert_eq!(UncertaintyEncoding::Variance.to_variance(0.04), 0.04);
        assert_abs_diff_eq!(UncertaintyEncoding::StdDev.to_variance(0.2), 0.04, epsilon = 1e-15);
    }

    #[test]
    fn test_average_weighting() {
        assert_eq!(AverageWeighting::Variance.weight(0.5), 0.5);
        assert_eq!(AverageWeighting::Precision.weight(0.5), 2.0);
    }

    #[test]
    fn test_mounting_orientation_in_degrees() {
        let mounting = MountingPose {
            lever_arm: [0.1, 0.2, 0.3],
            orientation_deg: [0.0, 0.0, 90.0],
        };
        assert_eq!(mounting.translation(), Vector3::new(0.1, 0.2, 0.3));
        let e = quaternion::to_euler(&mounting.orientation());
        assert_abs_diff_eq!(e, Vector3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2), epsilon = 1e-12);
    }
}
