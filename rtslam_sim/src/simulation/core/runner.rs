// rtslam_sim/src/simulation/core/runner.rs

use anyhow::{ensure, Result};
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use std::fmt;
use tracing::{debug, info};

use rtslam_core::estimation::sensors::{CycleOutcome, ProprioSensor, Sensor, SensorAbsloc};
use rtslam_core::estimation::FilterContext;
use rtslam_core::hardware::BufferedAbslocSource;
use rtslam_core::mapping::{LandmarkEuclideanPoint, Map};
use rtslam_core::math::{quaternion, wrap_angle};
use rtslam_core::robot::{Robot, POSE_SIZE};

use crate::simulation::core::config::ScenarioConfig;
use crate::simulation::core::prng::SimulationRng;
use crate::simulation::sensors::absloc::AbslocSimulator;
use crate::simulation::vehicles::unicycle::Unicycle;

/// Summary of one scenario run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationReport {
    pub ticks: usize,
    pub corrected: usize,
    pub rejected: usize,
    pub reinitialized: bool,
    /// RMS distance between the exported and true position over all ticks.
    pub rms_position_error: f64,
    pub final_position_error: f64,
    /// Absolute yaw error at the end, when the sensor reports orientation.
    pub final_yaw_error: Option<f64>,
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ticks:                {}", self.ticks)?;
        writeln!(f, "corrections:          {}", self.corrected)?;
        writeln!(f, "rejections:           {}", self.rejected)?;
        writeln!(f, "re-initialized:       {}", self.reinitialized)?;
        writeln!(f, "rms position error:   {:.4} m", self.rms_position_error)?;
        write!(f, "final position error: {:.4} m", self.final_position_error)?;
        if let Some(yaw) = self.final_yaw_error {
            write!(f, "\nfinal yaw error:      {:.4} deg", yaw.to_degrees())?;
        }
        Ok(())
    }
}

/// Drives the fusion core with simulated readings: ground truth, driver,
/// estimator sensor and joint state all live here.
#[derive(Debug)]
pub struct ScenarioRunner {
    config: ScenarioConfig,
    rng: SimulationRng,
    map: Map,
    robot: Robot,
    sensor: Sensor,
    simulator: AbslocSimulator,
    vehicle: Unicycle,
    time: f64,
}

impl ScenarioRunner {
    pub fn new(config: ScenarioConfig) -> Result<Self> {
        ensure!(config.simulation.rate_hz > 0.0, "simulation.rate_hz must be positive");

        let mut map = Map::new(config.map.max_size);
        let robot = Robot::new(0, &mut map)?;

        let landmark_cov = Matrix3::identity() * config.map.landmark_stddev.powi(2);
        for position in &config.map.landmarks {
            let mut landmark = LandmarkEuclideanPoint::new(&mut map)?;
            landmark.initialize(&mut map, Vector3::from(*position), landmark_cov);
            map.add_landmark(landmark);
        }

        let source = BufferedAbslocSource::new(config.sensor.channels, config.sensor.buffer_capacity);
        let simulator = AbslocSimulator::new(source.feeder(), &config.sensor)?;
        let mut sensor = Sensor::from(SensorAbsloc::new(&robot, config.sensor.absloc.clone()));
        sensor.set_hardware_sensor(Box::new(source));

        info!(
            channels = ?config.sensor.channels,
            absolute = config.sensor.absloc.absolute,
            landmarks = map.landmarks().len(),
            free_states = map.unused_states(),
            "scenario ready"
        );

        Ok(Self {
            rng: SimulationRng::new(config.simulation.seed),
            vehicle: Unicycle::from_config(&config.robot),
            time: 0.0,
            config,
            map,
            robot,
            sensor,
            simulator,
        })
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn robot(&self) -> &Robot {
        &self.robot
    }

    pub fn vehicle(&self) -> &Unicycle {
        &self.vehicle
    }

    /// Bootstraps from the warm-up buffer, then runs every tick.
    pub fn run(&mut self) -> Result<SimulationReport> {
        self.bootstrap()?;

        let dt = 1.0 / self.config.simulation.rate_hz;
        let ticks = (self.config.simulation.duration_seconds * self.config.simulation.rate_hz).round() as usize;
        let mut reinit_at = self.config.sensor.reinit_at_seconds;
        let mut report = SimulationReport {
            ticks,
            ..SimulationReport::default()
        };
        let mut squared_errors = 0.0;

        for _ in 0..ticks {
            self.time += dt;
            self.vehicle.step(dt);
            self.predict(dt);

            if reinit_at.is_some_and(|t| self.time >= t) {
                reinit_at = None;
                report.reinitialized = true;
                info!(time = self.time, "requesting sensor re-initialization");
                self.sensor.request_init();
            }

            match self.step()? {
                CycleOutcome::Corrected => report.corrected += 1,
                CycleOutcome::Rejected => report.rejected += 1,
                CycleOutcome::Bootstrapped => {}
            }

            let error = self.position_error();
            squared_errors += error * error;
            report.final_position_error = error;
            debug!(time = self.time, error, "tick");
        }

        if ticks > 0 {
            report.rms_position_error = (squared_errors / ticks as f64).sqrt();
        }
        if self.config.sensor.channels.orientation {
            report.final_yaw_error = Some(self.yaw_error());
        }

        info!(
            corrected = report.corrected,
            rejected = report.rejected,
            rms = report.rms_position_error,
            "scenario complete"
        );
        Ok(report)
    }

    /// Buffers the warm-up readings at the start pose and initializes the
    /// robot from their windowed average.
    fn bootstrap(&mut self) -> Result<()> {
        let dt = 1.0 / self.config.simulation.rate_hz;
        let count = self.config.sensor.warmup_readings.max(1);
        let mut last = None;
        for k in 0..count {
            let timestamp = -((count - 1 - k) as f64) * dt;
            last = Some(self.simulator.sample(
                timestamp,
                &self.vehicle.position(),
                &self.vehicle.orientation(),
                &mut self.rng,
            )?);
        }
        let Some(last) = last else {
            return Ok(());
        };

        self.sensor.request_init();
        let mut context = FilterContext::new(&mut self.map, &mut self.robot);
        let outcome = self.sensor.process(last, &mut context)?;
        ensure!(outcome == CycleOutcome::Bootstrapped, "first fix was not injected");
        info!(
            readings = count,
            error = self.position_error(),
            "robot bootstrapped from warm-up readings"
        );
        Ok(())
    }

    /// One sensor cycle at the current time.
    fn step(&mut self) -> Result<CycleOutcome> {
        let id = self.simulator.sample(
            self.time,
            &self.vehicle.position(),
            &self.vehicle.orientation(),
            &mut self.rng,
        )?;
        let mut context = FilterContext::new(&mut self.map, &mut self.robot);
        let outcome = self.sensor.process(id, &mut context)?;
        self.robot.normalize_orientation(&mut self.map);
        Ok(outcome)
    }

    /// Random-walk prediction of the robot pose: the mean stays, the pose
    /// covariance grows.
    fn predict(&mut self, dt: f64) {
        let robot = &self.config.robot;
        let mut q = DVector::zeros(POSE_SIZE);
        q.rows_mut(0, 3).fill(robot.position_noise.powi(2) * dt);
        q.rows_mut(3, 4).fill(robot.orientation_noise.powi(2) * dt);

        let ia_x = self.map.ia_used_states();
        self.map.filter.predict(
            &ia_x,
            &DMatrix::identity(POSE_SIZE, POSE_SIZE),
            self.robot.ia_pose(),
            &DMatrix::from_diagonal(&q),
        );
    }

    fn position_error(&self) -> f64 {
        (self.robot.exported_position(&self.map) - self.vehicle.position()).norm()
    }

    fn yaw_error(&self) -> f64 {
        let yaw = quaternion::to_euler(&self.robot.orientation(&self.map))[2];
        wrap_angle(yaw - self.vehicle.yaw()).abs()
    }
}
