// rtslam_core/src/estimation/sensors/bootstrap.rs

//! First-fix initialization of the robot pose from an absolute sensor.

use nalgebra::{DMatrix, Matrix3, Vector3};
use tracing::{debug, info};

use crate::config::AverageWeighting;
use crate::error::{EstimationError, Result};
use crate::estimation::FilterContext;
use crate::gaussian::Measurement;
use crate::hardware::{HardwareSensorProprio, RawReading};
use crate::mapping::Map;
use crate::math::{assign_block, project, prod_jpjt, quaternion, to_dynamic};
use crate::models::measurement::{AbslocModel, Channel, ChannelLayout};
use crate::types::RawId;

/// Builds a smoothed version of reading `target` from every buffered reading
/// up to and including it.
///
/// Per axis, a reading takes part when its reported uncertainty is below
/// twice the smallest one in the window; `target` always takes part. The
/// result is `target` with the position replaced by the weighted mean and the
/// position uncertainty replaced by the per-axis minimum. Sources without a
/// position channel get `target` back unchanged.
pub fn windowed_average(
    hardware: &dyn HardwareSensorProprio,
    target: RawId,
    layout: &ChannelLayout,
    weighting: AverageWeighting,
) -> Result<RawReading> {
    let infos = hardware.available_raws();
    if infos.available.is_empty() {
        return Err(EstimationError::EmptyWindow(target));
    }
    let end = infos
        .available
        .iter()
        .position(|info| info.id == target)
        .ok_or(EstimationError::RawNotAvailable(target))?;
    let window = &infos.available[..=end];

    let mut reading = RawReading::new(hardware.data_size());
    hardware.observe_raw(target, &mut reading)?;
    let Some(ch) = layout.position else {
        return Ok(reading);
    };

    let mut scratch = RawReading::new(hardware.data_size());
    let mut min_u = Vector3::repeat(f64::INFINITY);
    for info in window {
        hardware.observe_raw(info.id, &mut scratch)?;
        min_u = min_u.inf(&scratch.uncertainty3(ch.raw));
    }

    let mut weighted_sum = Vector3::<f64>::zeros();
    let mut total_weight = Vector3::<f64>::zeros();
    for info in window {
        hardware.observe_raw(info.id, &mut scratch)?;
        let value = scratch.value3(ch.raw);
        let u = scratch.uncertainty3(ch.raw);
        for axis in 0..3 {
            if info.id == target || u[axis] < 2.0 * min_u[axis] {
                let w = weighting.weight(u[axis]);
                weighted_sum[axis] += w * value[axis];
                total_weight[axis] += w;
            }
        }
    }

    let mut average = Vector3::<f64>::zeros();
    for axis in 0..3 {
        let w = total_weight[axis];
        if !(w.is_finite() && w > 0.0) {
            return Err(EstimationError::DegenerateWindow { axis });
        }
        average[axis] = weighted_sum[axis] / w;
    }

    debug!(
        target,
        window = window.len(),
        average = ?average.as_slice(),
        "averaged first-fix position"
    );
    reading.set_value3(ch.raw, &average);
    reading.set_uncertainty3(ch.raw, &min_u);
    Ok(reading)
}

/// Injects the first fix into the robot pose, orientation first so the
/// position can use the injected attitude to remove the lever arm.
pub(crate) fn inject_first_fix(
    model: &AbslocModel,
    layout: &ChannelLayout,
    measurement: &Measurement,
    absolute: bool,
    context: &mut FilterContext,
) {
    if let Some(ch) = layout.orientation {
        inject_orientation(model, ch, measurement, context);
    }
    if let Some(ch) = layout.position {
        inject_position(model, ch, measurement, absolute, context);
    }
}

fn channel_mean(measurement: &Measurement, ch: Channel) -> Vector3<f64> {
    measurement.x.fixed_rows::<3>(ch.slot).into_owned()
}

fn channel_covariance(measurement: &Measurement, ch: Channel) -> Matrix3<f64> {
    measurement.p.fixed_view::<3, 3>(ch.slot, ch.slot).into_owned()
}

/// Used states that are not in `ia`.
fn other_used_states(map: &Map, ia: &[usize]) -> Vec<usize> {
    map.ia_used_states()
        .into_iter()
        .filter(|i| !ia.contains(i))
        .collect()
}

/// `q = q_sensor * conj(r)`, with `P_qq` propagated from the Euler covariance
/// and every cross-covariance of `q` zeroed.
fn inject_orientation(model: &AbslocModel, ch: Channel, measurement: &Measurement, context: &mut FilterContext) {
    let (q_sensor, q_sensor_e) = quaternion::from_euler_with_jacobian(&channel_mean(measurement, ch));
    let r_conj = quaternion::conjugate(&model.orientation);
    let q = quaternion::product(&q_sensor, &r_conj);
    let q_e = quaternion::product_by_dq1(&r_conj) * q_sensor_e;
    let p_qq = q_e * channel_covariance(measurement, ch) * q_e.transpose();

    let robot = &*context.robot;
    let map = &mut *context.map;
    let ia_q = robot.ia_orientation();
    let ia_k = other_used_states(map, ia_q);

    robot.set_orientation(map, &q);
    let p = map.filter.p_mut();
    assign_block(p, ia_q, ia_q, &to_dynamic(&p_qq));
    assign_block(p, ia_q, &ia_k, &DMatrix::zeros(4, ia_k.len()));
    assign_block(p, &ia_k, ia_q, &DMatrix::zeros(ia_k.len(), 4));

    info!(
        robot = robot.id,
        euler = ?quaternion::to_euler(&q).as_slice(),
        "absolute sensor sets initial orientation"
    );
}

/// Position from the first fix, with the lever arm removed through the current
/// orientation. In absolute mode the fix becomes the position; in relative
/// mode it becomes the sensor origin offset and the robot starts at zero.
fn inject_position(
    model: &AbslocModel,
    ch: Channel,
    measurement: &Measurement,
    absolute: bool,
    context: &mut FilterContext,
) {
    let robot = &mut *context.robot;
    let map = &mut *context.map;

    let q = robot.orientation(map);
    let (tr, tr_q) = model.lever_arm_world(&q);
    let fix = channel_mean(measurement, ch) - tr;

    if absolute {
        robot.set_origin_sensors(Vector3::zeros());
        robot.set_position(map, &fix);
    } else {
        robot.set_origin_sensors(fix);
        robot.set_position(map, &Vector3::zeros());
    }

    let ia_p = robot.ia_position();
    let ia_q = robot.ia_orientation();
    let ia_k = other_used_states(map, ia_p);
    let tr_q = to_dynamic(&tr_q);

    let p_qq = project(map.filter.p(), ia_q, ia_q);
    let p_pp = to_dynamic(&channel_covariance(measurement, ch)) + prod_jpjt(&p_qq, &tr_q);
    let p_pk = -(&tr_q * project(map.filter.p(), ia_q, &ia_k));

    let p = map.filter.p_mut();
    assign_block(p, ia_p, ia_p, &p_pp);
    assign_block(p, ia_p, &ia_k, &p_pk);
    assign_block(p, &ia_k, ia_p, &p_pk.transpose());

    info!(
        robot = robot.id,
        absolute,
        origin = ?robot.origin_sensors().as_slice(),
        position = ?robot.position(map).as_slice(),
        "absolute sensor sets initial position"
    );
}
