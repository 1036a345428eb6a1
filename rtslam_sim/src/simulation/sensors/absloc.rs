// rtslam_sim/src/simulation/sensors/absloc.rs

use anyhow::{ensure, Result};
use nalgebra::{Vector3, Vector4};
use rand_distr::{Distribution, Normal};

use rtslam_core::config::UncertaintyEncoding;
use rtslam_core::hardware::{ChannelSet, ReadingFeeder};
use rtslam_core::math::wrap_angle;
use rtslam_core::models::measurement::AbslocModel;
use rtslam_core::types::RawId;

use crate::simulation::core::config::SensorConfig;
use crate::simulation::core::prng::SimulationRng;

/// Simulated driver of an absolute sensor: observes the ground truth at the
/// mounting point, adds Gaussian noise and pushes the reading into a buffer.
#[derive(Debug)]
pub struct AbslocSimulator {
    feeder: ReadingFeeder,
    channels: ChannelSet,
    model: AbslocModel,
    encoding: UncertaintyEncoding,
    position_stddev: [f64; 3],
    orientation_stddev: [f64; 3],
    // Store the noise distributions for efficiency
    position_noise: [Normal<f64>; 3],
    orientation_noise: [Normal<f64>; 3],
}

impl AbslocSimulator {
    pub fn new(feeder: ReadingFeeder, config: &SensorConfig) -> Result<Self> {
        let position_stddev = config.position_noise_stddev;
        let orientation_stddev = config.orientation_noise_stddev_deg.map(f64::to_radians);
        Ok(Self {
            feeder,
            channels: config.channels,
            model: AbslocModel::from_mounting(&config.absloc.mounting),
            encoding: config.absloc.uncertainty,
            position_noise: normals(position_stddev)?,
            orientation_noise: normals(orientation_stddev)?,
            position_stddev,
            orientation_stddev,
        })
    }

    /// Generates the reading seen from a robot at `position`, `orientation`
    /// and returns the id the driver gave it.
    pub fn sample(
        &self,
        timestamp: f64,
        position: &Vector3<f64>,
        orientation: &Vector4<f64>,
        rng: &mut SimulationRng,
    ) -> Result<RawId> {
        let mut values = Vec::with_capacity(6);
        let mut uncertainties = Vec::with_capacity(6);

        if self.channels.position {
            let (tr, _) = self.model.lever_arm_world(orientation);
            let truth = position + tr;
            for axis in 0..3 {
                values.push(truth[axis] + self.position_noise[axis].sample(&mut rng.0));
                uncertainties.push(self.reported(self.position_stddev[axis]));
            }
        }

        if self.channels.orientation {
            let (truth, _) = self.model.predict_orientation(orientation);
            for axis in 0..3 {
                values.push(wrap_angle(truth[axis] + self.orientation_noise[axis].sample(&mut rng.0)));
                uncertainties.push(self.reported(self.orientation_stddev[axis]));
            }
        }

        Ok(self.feeder.push(timestamp, &values, &uncertainties)?)
    }

    fn reported(&self, stddev: f64) -> f64 {
        match self.encoding {
            UncertaintyEncoding::Variance => stddev * stddev,
            UncertaintyEncoding::StdDev => stddev,
        }
    }
}

fn normals(stddev: [f64; 3]) -> Result<[Normal<f64>; 3]> {
    ensure!(
        stddev.iter().all(|s| *s >= 0.0),
        "noise standard deviations must be non-negative, got {stddev:?}"
    );
    Ok([
        Normal::new(0.0, stddev[0])?,
        Normal::new(0.0, stddev[1])?,
        Normal::new(0.0, stddev[2])?,
    ])
}
