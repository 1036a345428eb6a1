// rtslam_core/src/estimation/sensors/absloc.rs

use nalgebra::DMatrix;
use tracing::{debug, warn};

use super::{bootstrap, CycleOutcome, ProprioSensor};
use crate::config::AbslocConfig;
use crate::error::{EstimationError, Result};
use crate::estimation::FilterContext;
use crate::gaussian::{Expectation, Innovation, Measurement};
use crate::hardware::{HardwareSensorProprio, RawReading};
use crate::math::{project, prod_jpjt, wrap_angle};
use crate::models::measurement::{AbslocModel, ChannelLayout};
use crate::robot::Robot;
use crate::types::{IndexArray, RawId};

/// Where an absolute sensor is in its life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FusionPhase {
    /// No reading processed yet; the next one is injected into the pose.
    #[default]
    Uninitialized,
    /// The first fix has been injected.
    Bootstrapped,
    /// At least one EKF correction has been run.
    Fusing,
}

/// The bound driver and every buffer whose shape depends on it.
#[derive(Debug)]
struct HardwareBinding {
    hardware: Box<dyn HardwareSensorProprio>,
    layout: ChannelLayout,
    reading: RawReading,
    measurement: Measurement,
    expectation: Expectation,
    innovation: Innovation,
    /// Expectation Jacobian w.r.t. the robot pose, `inns x 7`.
    exp_rs: DMatrix<f64>,
    /// Innovation Jacobian w.r.t. the robot pose, `-exp_rs`.
    inn_rs: DMatrix<f64>,
}

impl HardwareBinding {
    fn new(hardware: Box<dyn HardwareSensorProprio>, pose_size: usize) -> Self {
        let layout = ChannelLayout::from_hardware(hardware.as_ref());
        let inns = layout.inns;
        Self {
            reading: RawReading::new(hardware.data_size()),
            measurement: Measurement::new(inns),
            expectation: Expectation::new(inns),
            innovation: Innovation::new(inns),
            exp_rs: DMatrix::zeros(inns, pose_size),
            inn_rs: DMatrix::zeros(inns, pose_size),
            hardware,
            layout,
        }
    }

    /// Propagates the pose covariance into the expectation, forms the
    /// innovation and runs the EKF correction on every used state.
    fn correct(&mut self, ia_rs: &[usize], gate: Option<f64>, context: &mut FilterContext) -> Result<CycleOutcome> {
        let p_rs = project(context.map.filter.p(), ia_rs, ia_rs);
        self.expectation.p = prod_jpjt(&p_rs, &self.exp_rs);

        self.innovation.x = &self.measurement.x - &self.expectation.x;
        if let Some(ch) = self.layout.orientation {
            for i in ch.slot..ch.slot + 3 {
                self.innovation.x[i] = wrap_angle(self.innovation.x[i]);
            }
        }
        self.innovation.p = &self.measurement.p + &self.expectation.p;
        self.inn_rs = -&self.exp_rs;

        if let Some(gate) = gate {
            if let Some(d2) = self.innovation.mahalanobis_squared() {
                if d2 > gate {
                    warn!(robot = context.robot.id, d2, gate, "absolute sensor innovation rejected");
                    return Ok(CycleOutcome::Rejected);
                }
            }
        }

        let ia_x = context.map.ia_used_states();
        context
            .map
            .filter
            .correct(&ia_x, &self.innovation, &self.inn_rs, ia_rs)?;

        debug!(
            robot = context.robot.id,
            innovation = ?self.innovation.x.as_slice(),
            "absolute sensor correction"
        );
        Ok(CycleOutcome::Corrected)
    }
}

/// An absolute localization sensor (GPS, motion capture...) mounted on a robot.
///
/// The first processed reading is injected directly into the robot pose; every
/// later one goes through an EKF correction of the joint state. Readings are
/// pulled from the bound [`HardwareSensorProprio`] by id.
#[derive(Debug)]
pub struct SensorAbsloc {
    config: AbslocConfig,
    model: AbslocModel,
    ia_rs: IndexArray,
    binding: Option<HardwareBinding>,
    phase: FusionPhase,
    use_for_init: bool,
}

impl SensorAbsloc {
    pub fn new(robot: &Robot, config: AbslocConfig) -> Self {
        Self {
            model: AbslocModel::from_mounting(&config.mounting),
            ia_rs: robot.ia_pose().to_vec(),
            config,
            binding: None,
            phase: FusionPhase::default(),
            use_for_init: false,
        }
    }

    pub fn phase(&self) -> FusionPhase {
        self.phase
    }

    /// Whether the next processed reading will be averaged over the buffer.
    pub fn is_init_requested(&self) -> bool {
        self.use_for_init
    }

    pub fn hardware(&self) -> Option<&dyn HardwareSensorProprio> {
        self.binding.as_ref().map(|b| b.hardware.as_ref())
    }

    pub fn layout(&self) -> Option<&ChannelLayout> {
        self.binding.as_ref().map(|b| &b.layout)
    }

    /// The measurement of the last processed cycle.
    pub fn measurement(&self) -> Option<&Measurement> {
        self.binding.as_ref().map(|b| &b.measurement)
    }

    /// The expectation of the last processed cycle.
    pub fn expectation(&self) -> Option<&Expectation> {
        self.binding.as_ref().map(|b| &b.expectation)
    }

    /// The innovation of the last correction.
    pub fn innovation(&self) -> Option<&Innovation> {
        self.binding.as_ref().map(|b| &b.innovation)
    }

    fn binding_mut(&mut self) -> Result<&mut HardwareBinding> {
        self.binding.as_mut().ok_or(EstimationError::HardwareNotBound)
    }

    /// Fetches (or averages) the reading, composes it and runs either the
    /// first-fix injection or a correction. The phase only advances on success.
    fn run_cycle(&mut self, id: RawId, context: &mut FilterContext) -> Result<CycleOutcome> {
        if self.use_for_init {
            self.init(id)?;
        } else {
            let binding = self.binding_mut()?;
            binding.hardware.get_raw(id, &mut binding.reading)?;
        }

        let binding = self
            .binding
            .as_mut()
            .ok_or(EstimationError::HardwareNotBound)?;

        let pose = context.robot.pose(context.map);
        self.model.compose(
            &binding.layout,
            &pose,
            context.robot.origin_sensors(),
            &binding.reading,
            self.config.uncertainty,
            &mut binding.measurement,
            &mut binding.expectation,
            &mut binding.exp_rs,
        );

        match self.phase {
            FusionPhase::Uninitialized => {
                bootstrap::inject_first_fix(
                    &self.model,
                    &binding.layout,
                    &binding.measurement,
                    self.config.absolute,
                    context,
                );
                self.phase = FusionPhase::Bootstrapped;
                Ok(CycleOutcome::Bootstrapped)
            }
            FusionPhase::Bootstrapped | FusionPhase::Fusing => {
                let outcome = binding.correct(&self.ia_rs, self.config.gate, context)?;
                if outcome == CycleOutcome::Corrected {
                    self.phase = FusionPhase::Fusing;
                }
                Ok(outcome)
            }
        }
    }
}

impl ProprioSensor for SensorAbsloc {
    fn set_hardware_sensor(&mut self, hardware: Box<dyn HardwareSensorProprio>) {
        self.binding = Some(HardwareBinding::new(hardware, self.ia_rs.len()));
    }

    fn request_init(&mut self) {
        self.use_for_init = true;
    }

    fn init(&mut self, id: RawId) -> Result<()> {
        let averaging = self.config.averaging;
        let binding = self.binding_mut()?;
        binding.reading = bootstrap::windowed_average(binding.hardware.as_ref(), id, &binding.layout, averaging)?;
        Ok(())
    }

    fn process(&mut self, id: RawId, context: &mut FilterContext) -> Result<CycleOutcome> {
        self.binding_mut()?;
        let outcome = self.run_cycle(id, context);

        if self.use_for_init {
            self.use_for_init = false;
            // The averaged reading is consumed even on failure; release it and its elders.
            let binding = self.binding_mut()?;
            let released = binding.hardware.get_raw(id, &mut binding.reading);
            if outcome.is_ok() {
                released?;
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MountingPose;
    use crate::hardware::{BufferedAbslocSource, ChannelSet, ReadingFeeder};
    use crate::mapping::Map;
    use crate::math::quaternion;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Matrix3, Vector3};
    use std::f64::consts::FRAC_PI_2;

    struct Rig {
        map: Map,
        robot: Robot,
        feeder: ReadingFeeder,
        sensor: SensorAbsloc,
    }

    impl Rig {
        fn new(channels: ChannelSet, config: AbslocConfig) -> Self {
            let mut map = Map::new(20);
            let robot = Robot::new(0, &mut map).unwrap();
            let source = BufferedAbslocSource::new(channels, 32);
            let feeder = source.feeder();
            let mut sensor = SensorAbsloc::new(&robot, config);
            sensor.set_hardware_sensor(Box::new(source));
            Self {
                map,
                robot,
                feeder,
                sensor,
            }
        }

        fn push(&self, values: &[f64], uncertainties: &[f64]) -> RawId {
            self.feeder.push(0.0, values, uncertainties).unwrap()
        }

        fn process(&mut self, id: RawId) -> Result<CycleOutcome> {
            let mut context = FilterContext::new(&mut self.map, &mut self.robot);
            self.sensor.process(id, &mut context)
        }
    }

    fn lever_x(absolute: bool) -> AbslocConfig {
        AbslocConfig {
            absolute,
            mounting: MountingPose {
                lever_arm: [1.0, 0.0, 0.0],
                orientation_deg: [0.0, 0.0, 0.0],
            },
            ..AbslocConfig::default()
        }
    }

    #[test]
    fn test_absolute_first_fix_removes_lever_arm() {
        let mut rig = Rig::new(ChannelSet::POSITION, lever_x(true));
        let id = rig.push(&[5.0, 0.0, 0.0], &[0.01; 3]);

        assert_eq!(rig.process(id).unwrap(), CycleOutcome::Bootstrapped);
        assert_eq!(rig.sensor.phase(), FusionPhase::Bootstrapped);
        assert_abs_diff_eq!(rig.robot.position(&rig.map), Vector3::new(4.0, 0.0, 0.0), epsilon = 1e-12);
        assert_eq!(rig.robot.origin_sensors(), &Vector3::zeros());

        let p_pp = rig.robot.position_covariance(&rig.map);
        for i in 0..3 {
            assert!(p_pp[(i, i)] >= 0.01 - 1e-15);
        }
        assert_abs_diff_eq!(p_pp, Matrix3::identity() * 0.01, epsilon = 1e-15);
    }

    #[test]
    fn test_relative_first_fix_moves_into_origin() {
        let mut rig = Rig::new(ChannelSet::POSITION, lever_x(false));
        let id = rig.push(&[5.0, 0.0, 0.0], &[0.01; 3]);
        rig.process(id).unwrap();

        assert_abs_diff_eq!(rig.robot.position(&rig.map), Vector3::zeros(), epsilon = 1e-12);
        assert_abs_diff_eq!(*rig.robot.origin_sensors(), Vector3::new(4.0, 0.0, 0.0), epsilon = 1e-12);

        // The same fix again carries no information about the estimated position.
        let id = rig.push(&[5.0, 0.0, 0.0], &[0.01; 3]);
        assert_eq!(rig.process(id).unwrap(), CycleOutcome::Corrected);
        assert_abs_diff_eq!(rig.robot.position(&rig.map), Vector3::zeros(), epsilon = 1e-12);
        assert_abs_diff_eq!(rig.robot.exported_position(&rig.map), Vector3::new(4.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_orientation_injected_before_position() {
        let mut rig = Rig::new(ChannelSet::FULL, lever_x(true));
        let id = rig.push(&[5.0, 0.0, 0.0, 0.0, 0.0, FRAC_PI_2], &[0.01, 0.01, 0.01, 0.001, 0.001, 0.001]);
        rig.process(id).unwrap();

        let q = rig.robot.orientation(&rig.map);
        assert_abs_diff_eq!(quaternion::to_euler(&q), Vector3::new(0.0, 0.0, FRAC_PI_2), epsilon = 1e-12);
        // Lever arm (1, 0, 0) rotated by 90 deg of yaw points along +y.
        assert_abs_diff_eq!(rig.robot.position(&rig.map), Vector3::new(5.0, -1.0, 0.0), epsilon = 1e-12);

        // The lever-arm term adds orientation uncertainty to the position.
        let p_pp = rig.robot.position_covariance(&rig.map);
        assert!(p_pp[(0, 0)] > 0.01);
    }

    #[test]
    fn test_mounting_orientation_is_removed_from_first_fix() {
        let config = AbslocConfig {
            mounting: MountingPose {
                lever_arm: [0.0; 3],
                orientation_deg: [0.0, 0.0, 30.0],
            },
            ..AbslocConfig::default()
        };
        let mut rig = Rig::new(ChannelSet::ORIENTATION, config);
        let id = rig.push(&[0.0, 0.0, 50f64.to_radians()], &[0.001; 3]);
        rig.process(id).unwrap();

        let e = quaternion::to_euler(&rig.robot.orientation(&rig.map));
        assert_abs_diff_eq!(e[2], 20f64.to_radians(), epsilon = 1e-12);
    }

    #[test]
    fn test_steady_state_correction_blends_estimate_and_fix() {
        let mut rig = Rig::new(ChannelSet::POSITION, lever_x(true));
        let id = rig.push(&[5.0, 0.0, 0.0], &[0.01; 3]);
        rig.process(id).unwrap();

        let id = rig.push(&[5.2, 0.0, 0.0], &[0.01; 3]);
        assert_eq!(rig.process(id).unwrap(), CycleOutcome::Corrected);
        assert_eq!(rig.sensor.phase(), FusionPhase::Fusing);

        // Equal prior and measurement variances: gain of one half.
        assert_abs_diff_eq!(rig.robot.position(&rig.map), Vector3::new(4.1, 0.0, 0.0), epsilon = 1e-12);
        assert_abs_diff_eq!(rig.robot.position_covariance(&rig.map), Matrix3::identity() * 0.005, epsilon = 1e-12);

        let inn = rig.sensor.innovation().unwrap();
        assert_abs_diff_eq!(inn.x[0], 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(inn.p, DMatrix::identity(3, 3) * 0.02, epsilon = 1e-12);
    }

    #[test]
    fn test_innovation_covariance_is_symmetric_psd() {
        let mut rig = Rig::new(ChannelSet::FULL, lever_x(true));
        let id = rig.push(&[5.0, 0.0, 0.0, 0.1, -0.2, 0.7], &[0.04, 0.04, 0.09, 0.01, 0.01, 0.02]);
        rig.process(id).unwrap();
        let id = rig.push(&[5.1, -0.1, 0.05, 0.12, -0.18, 0.75], &[0.04, 0.04, 0.09, 0.01, 0.01, 0.02]);
        rig.process(id).unwrap();

        let s = &rig.sensor.innovation().unwrap().p;
        assert_abs_diff_eq!(s.clone(), s.transpose(), epsilon = 1e-12);
        for ev in s.clone().symmetric_eigenvalues().iter() {
            assert!(*ev >= -1e-12, "negative eigenvalue {ev}");
        }
    }

    #[test]
    fn test_buffer_sizes_follow_bound_channels() {
        for (channels, inns) in [(ChannelSet::POSITION, 3), (ChannelSet::ORIENTATION, 3), (ChannelSet::FULL, 6)] {
            let rig = Rig::new(channels, AbslocConfig::default());
            assert_eq!(rig.sensor.layout().unwrap().inns, inns);
            assert_eq!(rig.sensor.measurement().unwrap().size(), inns);
            assert_eq!(rig.sensor.expectation().unwrap().size(), inns);
            assert_eq!(rig.sensor.innovation().unwrap().size(), inns);
        }
    }

    #[test]
    fn test_orientation_innovation_wraps_across_pi() {
        let mut rig = Rig::new(ChannelSet::ORIENTATION, AbslocConfig::default());
        let yaw = std::f64::consts::PI - 0.05;
        let id = rig.push(&[0.0, 0.0, yaw], &[0.01; 3]);
        rig.process(id).unwrap();

        let id = rig.push(&[0.0, 0.0, -yaw], &[0.01; 3]);
        rig.process(id).unwrap();
        assert_abs_diff_eq!(rig.sensor.innovation().unwrap().x[2], 0.1, epsilon = 1e-9);
    }

    #[test]
    fn test_gate_rejects_outlier_without_touching_state() {
        let config = AbslocConfig {
            gate: Some(9.0),
            ..lever_x(true)
        };
        let mut rig = Rig::new(ChannelSet::POSITION, config);
        let id = rig.push(&[5.0, 0.0, 0.0], &[0.01; 3]);
        rig.process(id).unwrap();
        let before = rig.map.filter.clone();

        // d2 = 1 / 0.02 = 50
        let id = rig.push(&[6.0, 0.0, 0.0], &[0.01; 3]);
        assert_eq!(rig.process(id).unwrap(), CycleOutcome::Rejected);
        assert_eq!(rig.map.filter.x(), before.x());
        assert_eq!(rig.map.filter.p(), before.p());

        let id = rig.push(&[5.1, 0.0, 0.0], &[0.01; 3]);
        assert_eq!(rig.process(id).unwrap(), CycleOutcome::Corrected);
    }

    #[test]
    fn test_requested_init_averages_and_releases_buffer() {
        let mut rig = Rig::new(ChannelSet::POSITION, AbslocConfig {
            absolute: true,
            ..AbslocConfig::default()
        });
        rig.push(&[1.0, 0.0, 0.0], &[0.1; 3]);
        rig.push(&[3.0, 0.0, 0.0], &[0.1; 3]);
        let last = rig.push(&[2.0, 0.0, 0.0], &[0.1; 3]);

        rig.sensor.request_init();
        assert!(rig.sensor.is_init_requested());
        assert_eq!(rig.process(last).unwrap(), CycleOutcome::Bootstrapped);

        assert!(!rig.sensor.is_init_requested());
        assert!(rig.sensor.hardware().unwrap().available_raws().available.is_empty());
        assert_abs_diff_eq!(rig.robot.position(&rig.map), Vector3::new(2.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_failed_requested_init_still_releases_buffer() {
        let mut rig = Rig::new(ChannelSet::POSITION, AbslocConfig::default());
        rig.push(&[1.0, 0.0, 0.0], &[0.0; 3]);
        let last = rig.push(&[2.0, 0.0, 0.0], &[0.0; 3]);

        rig.sensor.request_init();
        assert_eq!(rig.process(last), Err(EstimationError::DegenerateWindow { axis: 0 }));

        assert!(!rig.sensor.is_init_requested());
        assert!(rig.sensor.hardware().unwrap().available_raws().available.is_empty());
        assert_eq!(rig.sensor.phase(), FusionPhase::Uninitialized);
    }

    #[test]
    fn test_gimbal_lock_correction_fails_without_touching_state() {
        let mut rig = Rig::new(ChannelSet::FULL, AbslocConfig::default());
        let id = rig.push(&[0.0, 0.0, 0.0, 0.0, FRAC_PI_2, 0.0], &[0.01; 6]);
        rig.process(id).unwrap();
        // Exact pitch of 90 deg: the Euler Jacobian is singular.
        let q = nalgebra::Vector4::new(std::f64::consts::FRAC_1_SQRT_2, 0.0, std::f64::consts::FRAC_1_SQRT_2, 0.0);
        rig.robot.set_orientation(&mut rig.map, &q);
        let before = rig.map.filter.clone();

        let id = rig.push(&[0.1, 0.0, 0.0, 0.0, FRAC_PI_2, 0.0], &[0.01; 6]);
        assert_eq!(rig.process(id), Err(EstimationError::NonFiniteCorrection));

        assert_eq!(rig.map.filter.x(), before.x());
        assert_eq!(rig.map.filter.p(), before.p());
        assert!(rig.map.filter.x().iter().all(|v| v.is_finite()));
        assert_eq!(rig.sensor.phase(), FusionPhase::Bootstrapped);
    }

    #[test]
    fn test_unbound_sensor_reports_error() {
        let mut map = Map::new(10);
        let mut robot = Robot::new(0, &mut map).unwrap();
        let mut sensor = SensorAbsloc::new(&robot, AbslocConfig::default());
        let mut context = FilterContext::new(&mut map, &mut robot);
        assert_eq!(sensor.process(0, &mut context), Err(EstimationError::HardwareNotBound));
        assert_eq!(sensor.phase(), FusionPhase::Uninitialized);
    }

    #[test]
    fn test_missing_reading_leaves_phase_untouched() {
        let mut rig = Rig::new(ChannelSet::POSITION, AbslocConfig::default());
        assert_eq!(rig.process(7), Err(EstimationError::RawNotAvailable(7)));
        assert_eq!(rig.sensor.phase(), FusionPhase::Uninitialized);
    }
}
