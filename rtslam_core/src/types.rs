// rtslam_core/src/types.rs

use nalgebra::{DMatrix, DVector};

// --- Core Type Aliases ---
pub type State = DVector<f64>;
pub type Covariance = DMatrix<f64>;

/// A set of indices into the joint state vector. Not necessarily contiguous.
pub type IndexArray = Vec<usize>;

/// Identifier of a raw hardware reading, monotonically increasing per source.
pub type RawId = u64;

