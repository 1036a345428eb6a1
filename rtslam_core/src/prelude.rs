// rtslam_core/src/prelude.rs

// --- Core Abstractions (The main contracts of the library) ---
pub use crate::estimation::sensors::{CycleOutcome, ProprioSensor};
pub use crate::hardware::HardwareSensorProprio;
pub use crate::mapping::Landmark;

// --- Core Data Structures (The "nouns" of the library) ---
pub use crate::error::{EstimationError, Result};
pub use crate::estimation::FilterContext;
pub use crate::gaussian::{Expectation, Gaussian, Innovation, Measurement};
pub use crate::hardware::{Quantity, RawInfo, RawInfos, RawReading};
pub use crate::mapping::{LandmarkEuclideanPoint, Map};
pub use crate::robot::Robot;
pub use crate::types::{IndexArray, RawId};

// --- Estimation ---
pub use crate::estimation::filters::ExtendedKalmanFilter;
pub use crate::estimation::sensors::{FusionPhase, Sensor, SensorAbsloc};

// --- Configuration and concrete implementations ---
pub use crate::config::{AbslocConfig, AverageWeighting, MountingPose, UncertaintyEncoding};
pub use crate::hardware::{BufferedAbslocSource, ChannelSet, ReadingFeeder};
pub use crate::models::measurement::{AbslocModel, ChannelLayout};
