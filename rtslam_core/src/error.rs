// rtslam_core/src/error.rs

use thiserror::Error;

use crate::types::RawId;

/// Errors raised while reading hardware buffers or updating the joint estimate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimationError {
    #[error("raw reading {0} is not available from the hardware source")]
    RawNotAvailable(RawId),

    #[error("raw reading carries {got} channels, the source reports {expected}")]
    ReadingSize { expected: usize, got: usize },

    #[error("sensor has no hardware source bound")]
    HardwareNotBound,

    #[error("no reading available up to and including reading {0}")]
    EmptyWindow(RawId),

    #[error("averaging window has zero accumulated weight on axis {axis}")]
    DegenerateWindow { axis: usize },

    #[error("innovation covariance is singular")]
    SingularInnovation,

    #[error("correction inputs or gain are not finite")]
    NonFiniteCorrection,

    #[error("map cannot reserve {requested} states, only {available} are free")]
    MapFull { requested: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, EstimationError>;
