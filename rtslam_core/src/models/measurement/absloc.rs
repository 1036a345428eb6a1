// rtslam_core/src/models/measurement/absloc.rs

use nalgebra::{DMatrix, DVector, Matrix3x4, Vector3, Vector4};

use crate::config::{MountingPose, UncertaintyEncoding};
use crate::gaussian::{Expectation, Measurement};
use crate::hardware::{HardwareSensorProprio, Quantity, RawReading};
use crate::math::quaternion;

/// Location of one 3-axis channel in the raw reading and in the measurement vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    /// Index in [`RawReading::data`] of the first value.
    pub raw: usize,
    /// Index in the measurement vector of the first value.
    pub slot: usize,
}

/// The channels a bound source reports, resolved once at binding time.
///
/// Channels are packed into the measurement vector as position then
/// orientation, without gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLayout {
    /// Size of the measurement, expectation and innovation vectors.
    pub inns: usize,
    pub position: Option<Channel>,
    pub orientation: Option<Channel>,
}

impl ChannelLayout {
    pub fn from_hardware(hardware: &dyn HardwareSensorProprio) -> Self {
        let inns = hardware.data_size();
        let mut next_slot = 0;
        let mut channel = |raw: usize| {
            let slot = next_slot;
            next_slot += 3;
            Channel { raw, slot }
        };

        let position = hardware.get_quantity(Quantity::Position).map(&mut channel);
        let orientation = hardware.get_quantity(Quantity::OrientationEuler).map(&mut channel);

        assert_eq!(
            next_slot, inns,
            "ChannelLayout: source reports {inns} channels but only position/orientation are understood"
        );

        Self {
            inns,
            position,
            orientation,
        }
    }
}

/// Model of an absolute localization sensor rigidly mounted on the robot.
///
/// Position channel: `h = p + R(q) T`.
/// Orientation channel: `h = euler(q * r)`.
/// `p`, `q` are the robot position and orientation; `T`, `r` the sensor
/// lever arm and orientation in the robot frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AbslocModel {
    pub lever_arm: Vector3<f64>,
    pub orientation: Vector4<f64>,
}

impl AbslocModel {
    pub fn from_mounting(mounting: &MountingPose) -> Self {
        Self {
            lever_arm: mounting.translation(),
            orientation: mounting.orientation(),
        }
    }

    /// `R(q) T` and its Jacobian with respect to `q`.
    pub fn lever_arm_world(&self, q: &Vector4<f64>) -> (Vector3<f64>, Matrix3x4<f64>) {
        (
            quaternion::rotate(q, &self.lever_arm),
            quaternion::rotate_by_dq(q, &self.lever_arm),
        )
    }

    /// Predicted sensor orientation and its Jacobian with respect to `q`.
    pub fn predict_orientation(&self, q: &Vector4<f64>) -> (Vector3<f64>, Matrix3x4<f64>) {
        let qr = quaternion::product(q, &self.orientation);
        let qr_q = quaternion::product_by_dq1(&self.orientation);
        let (e, e_qr) = quaternion::to_euler_with_jacobian(&qr);
        (e, e_qr * qr_q)
    }

    /// Fills the measurement from `reading` and the expectation mean and pose
    /// Jacobian `exp_rs` from the robot `pose` (7-vector `[p, q]`).
    ///
    /// Every element of the outputs is overwritten. `expectation.p` is zeroed;
    /// propagating the pose covariance is left to the caller.
    #[allow(clippy::too_many_arguments)]
    pub fn compose(
        &self,
        layout: &ChannelLayout,
        pose: &DVector<f64>,
        origin_sensors: &Vector3<f64>,
        reading: &RawReading,
        encoding: UncertaintyEncoding,
        measurement: &mut Measurement,
        expectation: &mut Expectation,
        exp_rs: &mut DMatrix<f64>,
    ) {
        let p: Vector3<f64> = pose.fixed_rows::<3>(0).into_owned();
        let q: Vector4<f64> = pose.fixed_rows::<4>(3).into_owned();

        measurement.clear();
        expectation.clear();
        exp_rs.fill(0.0);

        if let Some(ch) = layout.position {
            let (tr, tr_q) = self.lever_arm_world(&q);
            exp_rs.fixed_view_mut::<3, 3>(ch.slot, 0).fill_with_identity();
            exp_rs.fixed_view_mut::<3, 4>(ch.slot, 3).copy_from(&tr_q);
            expectation.x.fixed_rows_mut::<3>(ch.slot).copy_from(&(p + tr));

            let z = reading.value3(ch.raw) - origin_sensors;
            measurement.x.fixed_rows_mut::<3>(ch.slot).copy_from(&z);
            fill_diagonal(measurement, ch, reading, encoding);
        }

        if let Some(ch) = layout.orientation {
            let (e, e_q) = self.predict_orientation(&q);
            exp_rs.fixed_view_mut::<3, 4>(ch.slot, 3).copy_from(&e_q);
            expectation.x.fixed_rows_mut::<3>(ch.slot).copy_from(&e);

            measurement
                .x
                .fixed_rows_mut::<3>(ch.slot)
                .copy_from(&reading.value3(ch.raw));
            fill_diagonal(measurement, ch, reading, encoding);
        }
    }
}

fn fill_diagonal(measurement: &mut Measurement, ch: Channel, reading: &RawReading, encoding: UncertaintyEncoding) {
    let u = reading.uncertainty3(ch.raw);
    for i in 0..3 {
        measurement.p[(ch.slot + i, ch.slot + i)] = encoding.to_variance(u[i]);
    }
}
