// rtslam_sim/src/simulation/vehicles/unicycle.rs

use nalgebra::{Vector3, Vector4};

use rtslam_core::math::{quaternion, wrap_angle};

use crate::simulation::core::config::RobotConfig;

/// Planar ground-truth motion at constant forward speed and yaw rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Unicycle {
    position: Vector3<f64>,
    yaw: f64,
    speed: f64,
    yaw_rate: f64,
}

impl Unicycle {
    pub fn from_config(config: &RobotConfig) -> Self {
        Self {
            position: Vector3::from(config.start_position),
            yaw: wrap_angle(config.start_yaw_deg.to_radians()),
            speed: config.speed,
            yaw_rate: config.yaw_rate_deg.to_radians(),
        }
    }

    /// Advances the pose by `dt` seconds, integrating heading at mid-step.
    pub fn step(&mut self, dt: f64) {
        let heading = self.yaw + 0.5 * self.yaw_rate * dt;
        self.position.x += self.speed * heading.cos() * dt;
        self.position.y += self.speed * heading.sin() * dt;
        self.yaw = wrap_angle(self.yaw + self.yaw_rate * dt);
    }

    pub fn position(&self) -> Vector3<f64> {
        self.position
    }

    pub fn yaw(&self) -> f64 {
        self.yaw
    }

    /// Body-to-world quaternion `[w, x, y, z]`.
    pub fn orientation(&self) -> Vector4<f64> {
        quaternion::from_euler(&Vector3::new(0.0, 0.0, self.yaw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn config(speed: f64, yaw_rate_deg: f64) -> RobotConfig {
        RobotConfig {
            speed,
            yaw_rate_deg,
            ..RobotConfig::default()
        }
    }

    #[test]
    fn test_straight_line() {
        let mut vehicle = Unicycle::from_config(&config(2.0, 0.0));
        for _ in 0..10 {
            vehicle.step(0.1);
        }
        assert_abs_diff_eq!(vehicle.position(), Vector3::new(2.0, 0.0, 0.0), epsilon = 1e-12);
        assert_eq!(vehicle.orientation(), quaternion::identity());
    }

    #[test]
    fn test_full_circle_returns_to_start() {
        // 36 deg/s for 10 s.
        let mut vehicle = Unicycle::from_config(&config(1.0, 36.0));
        for _ in 0..1000 {
            vehicle.step(0.01);
        }
        assert_abs_diff_eq!(vehicle.position(), Vector3::zeros(), epsilon = 1e-9);
        assert_abs_diff_eq!(vehicle.yaw().sin(), 0.0, epsilon = 1e-9);
    }
}
