// rtslam_core/src/robot.rs

use nalgebra::{DMatrix, DVector, Matrix3, Vector3, Vector4};

use crate::error::Result;
use crate::mapping::Map;
use crate::math::{assign_block, assign_vec, project, project_vec, quaternion, to_dynamic};
use crate::types::IndexArray;

/// Size of the robot pose block: position (3) + orientation quaternion (4).
pub const POSE_SIZE: usize = 7;

/// A robot whose global pose lives in the joint state.
///
/// Layout of the pose block (`ia_pose`):
/// - Position `[x, y, z]` in the world frame, indices 0-2
/// - Orientation quaternion `[w, x, y, z]`, body to world, indices 3-6
#[derive(Debug, Clone)]
pub struct Robot {
    pub id: u64,
    ia_pose: IndexArray,
    /// Offset between the sensors' absolute frame and the estimated frame.
    /// Non-zero only when an absolute sensor runs in relative mode.
    origin_sensors: Vector3<f64>,
}

impl Robot {
    /// Reserves the pose block in the map and sets it to the identity pose
    /// with zero covariance.
    pub fn new(id: u64, map: &mut Map) -> Result<Self> {
        let ia_pose = map.reserve_states(POSE_SIZE)?;
        let robot = Self {
            id,
            ia_pose,
            origin_sensors: Vector3::zeros(),
        };
        robot.set_pose_prior(map, &Vector3::zeros(), &quaternion::identity(), &DMatrix::zeros(POSE_SIZE, POSE_SIZE));
        Ok(robot)
    }

    pub fn ia_pose(&self) -> &[usize] {
        &self.ia_pose
    }

    pub fn ia_position(&self) -> &[usize] {
        &self.ia_pose[0..3]
    }

    pub fn ia_orientation(&self) -> &[usize] {
        &self.ia_pose[3..7]
    }

    /// The full 7-vector pose estimate.
    pub fn pose(&self, map: &Map) -> DVector<f64> {
        project_vec(map.filter.x(), &self.ia_pose)
    }

    pub fn position(&self, map: &Map) -> Vector3<f64> {
        let x = map.filter.x();
        let ia = self.ia_position();
        Vector3::new(x[ia[0]], x[ia[1]], x[ia[2]])
    }

    pub fn orientation(&self, map: &Map) -> Vector4<f64> {
        let x = map.filter.x();
        let ia = self.ia_orientation();
        Vector4::new(x[ia[0]], x[ia[1]], x[ia[2]], x[ia[3]])
    }

    /// Covariance of the pose block.
    pub fn pose_covariance(&self, map: &Map) -> DMatrix<f64> {
        project(map.filter.p(), &self.ia_pose, &self.ia_pose)
    }

    /// Position in the sensors' absolute frame, `position + origin_sensors`.
    pub fn exported_position(&self, map: &Map) -> Vector3<f64> {
        self.position(map) + self.origin_sensors
    }

    pub fn origin_sensors(&self) -> &Vector3<f64> {
        &self.origin_sensors
    }

    pub fn set_origin_sensors(&mut self, origin: Vector3<f64>) {
        self.origin_sensors = origin;
    }

    /// Overwrites the pose mean and its covariance block. Cross-covariances
    /// with the rest of the state are left untouched.
    pub fn set_pose_prior(&self, map: &mut Map, position: &Vector3<f64>, orientation: &Vector4<f64>, covariance: &DMatrix<f64>) {
        let mut pose = DVector::zeros(POSE_SIZE);
        pose.fixed_rows_mut::<3>(0).copy_from(position);
        pose.fixed_rows_mut::<4>(3).copy_from(orientation);
        assign_vec(map.filter.x_mut(), &self.ia_pose, &pose);
        assign_block(map.filter.p_mut(), &self.ia_pose, &self.ia_pose, covariance);
    }

    /// Writes the position mean only.
    pub fn set_position(&self, map: &mut Map, position: &Vector3<f64>) {
        assign_vec(map.filter.x_mut(), self.ia_position(), &DVector::from_column_slice(position.as_slice()));
    }

    /// Writes the orientation mean only.
    pub fn set_orientation(&self, map: &mut Map, orientation: &Vector4<f64>) {
        assign_vec(map.filter.x_mut(), self.ia_orientation(), &DVector::from_column_slice(orientation.as_slice()));
    }

    /// Brings the orientation quaternion back to unit norm, propagating the
    /// covariance through the normalization Jacobian. Corrections drift the
    /// norm away from one.
    pub fn normalize_orientation(&self, map: &mut Map) {
        let q = self.orientation(map);
        let jac = to_dynamic(&quaternion::normalize_by_dq(&q));
        self.set_orientation(map, &quaternion::normalize(&q));

        let ia_q = self.ia_orientation().to_vec();
        let ia_x = map.ia_used_states();
        map.filter.predict(&ia_x, &jac, &ia_q, &DMatrix::zeros(4, 4));
    }

    /// Convenience for tests and hosts: the translation part of the pose
    /// covariance.
    pub fn position_covariance(&self, map: &Map) -> Matrix3<f64> {
        let p = project(map.filter.p(), self.ia_position(), self.ia_position());
        Matrix3::from_fn(|r, c| p[(r, c)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_new_robot_starts_at_identity_pose() {
        let mut map = Map::new(20);
        let robot = Robot::new(0, &mut map).unwrap();
        assert_eq!(robot.ia_pose(), &[0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(robot.position(&map), Vector3::zeros());
        assert_eq!(robot.orientation(&map), quaternion::identity());
    }

    #[test]
    fn test_exported_position_adds_sensor_origin() {
        let mut map = Map::new(7);
        let mut robot = Robot::new(0, &mut map).unwrap();
        robot.set_position(&mut map, &Vector3::new(1.0, 0.0, 0.0));
        robot.set_origin_sensors(Vector3::new(10.0, 20.0, 0.0));
        assert_eq!(robot.exported_position(&map), Vector3::new(11.0, 20.0, 0.0));
    }

    #[test]
    fn test_normalize_orientation_restores_unit_norm() {
        let mut map = Map::new(7);
        let robot = Robot::new(0, &mut map).unwrap();
        let mut cov = DMatrix::identity(POSE_SIZE, POSE_SIZE) * 0.01;
        cov[(0, 3)] = 0.005;
        cov[(3, 0)] = 0.005;
        robot.set_pose_prior(&mut map, &Vector3::zeros(), &Vector4::new(2.0, 0.0, 0.0, 0.0), &cov);

        robot.normalize_orientation(&mut map);

        assert_abs_diff_eq!(robot.orientation(&map), quaternion::identity(), epsilon = 1e-12);
        let p = robot.pose_covariance(&map);
        // Along q itself the normalization removes all variance.
        assert_abs_diff_eq!(p[(3, 3)], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p[(0, 3)], 0.0, epsilon = 1e-12);
        // Orthogonal directions are scaled by 1/|q|^2.
        assert_abs_diff_eq!(p[(4, 4)], 0.0025, epsilon = 1e-12);
        assert_abs_diff_eq!(p[(0, 0)], 0.01, epsilon = 1e-12);
    }
}
