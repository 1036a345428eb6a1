// rtslam_core/src/estimation/sensors/mod.rs

//! Estimator-side sensors: they pull readings from a bound hardware source
//! and fold them into the joint filter.

use crate::error::Result;
use crate::estimation::FilterContext;
use crate::hardware::HardwareSensorProprio;
use crate::types::RawId;

mod absloc;
pub mod bootstrap;

pub use absloc::{FusionPhase, SensorAbsloc};

/// What one processing cycle did to the joint state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The reading was injected directly into the robot pose.
    Bootstrapped,
    /// The reading went through an EKF correction.
    Corrected,
    /// The innovation failed the consistency gate; the state is untouched.
    Rejected,
}

/// A sensor fed by a proprioceptive hardware source.
pub trait ProprioSensor {
    /// Binds the driver readings are pulled from. Buffers are sized here,
    /// from the quantities the driver reports.
    fn set_hardware_sensor(&mut self, hardware: Box<dyn HardwareSensorProprio>);

    /// Asks that the next processed reading be used to (re)initialize.
    fn request_init(&mut self);

    /// Prepares the working reading for an initialization from reading `id`.
    fn init(&mut self, id: RawId) -> Result<()>;

    /// Runs one cycle on reading `id`.
    fn process(&mut self, id: RawId, context: &mut FilterContext) -> Result<CycleOutcome>;
}

/// The sensor kinds a host can schedule.
#[derive(Debug)]
#[non_exhaustive]
pub enum Sensor {
    Absloc(SensorAbsloc),
}

impl From<SensorAbsloc> for Sensor {
    fn from(sensor: SensorAbsloc) -> Self {
        Sensor::Absloc(sensor)
    }
}

impl ProprioSensor for Sensor {
    fn set_hardware_sensor(&mut self, hardware: Box<dyn HardwareSensorProprio>) {
        match self {
            Sensor::Absloc(s) => s.set_hardware_sensor(hardware),
        }
    }

    fn request_init(&mut self) {
        match self {
            Sensor::Absloc(s) => s.request_init(),
        }
    }

    fn init(&mut self, id: RawId) -> Result<()> {
        match self {
            Sensor::Absloc(s) => s.init(id),
        }
    }

    fn process(&mut self, id: RawId, context: &mut FilterContext) -> Result<CycleOutcome> {
        match self {
            Sensor::Absloc(s) => s.process(id, context),
        }
    }
}
