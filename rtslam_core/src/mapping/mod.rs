// rtslam_core/src/mapping/mod.rs

use tracing::debug;

use crate::error::{EstimationError, Result};
use crate::estimation::filters::ExtendedKalmanFilter;
use crate::types::IndexArray;

// --- Landmark bookkeeping ---

/// Geometric nature of a landmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum LandmarkGeometry {
    Point,
}

/// Parametrization used to store a landmark in the joint state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum LandmarkType {
    EuclideanPoint,
}

/// The contract every landmark exposes to the map's bookkeeping.
pub trait Landmark {
    fn id(&self) -> u64;
    /// Number of joint-state slots the parametrization occupies.
    fn size(&self) -> usize;
    fn geometry(&self) -> LandmarkGeometry;
    fn landmark_type(&self) -> LandmarkType;
    fn is_converged(&self) -> bool;
    /// Joint-state indices, or `None` for landmarks living outside the filter.
    fn state_indices(&self) -> Option<&[usize]>;
}

/// The map: owner of the joint filter, of the free/used state bookkeeping and
/// of the landmarks.
#[derive(Debug, Clone)]
pub struct Map {
    pub filter: ExtendedKalmanFilter,
    used_states: Vec<bool>,
    landmarks: Vec<LandmarkEuclideanPoint>,
    next_landmark_id: u64,
}

impl Map {
    /// Creates a map able to hold `max_size` joint-state scalars.
    pub fn new(max_size: usize) -> Self {
        Self {
            filter: ExtendedKalmanFilter::new(max_size),
            used_states: vec![false; max_size],
            landmarks: Vec::new(),
            next_landmark_id: 0,
        }
    }

    /// Capacity of the joint state.
    pub fn max_size(&self) -> usize {
        self.used_states.len()
    }

    /// Number of free joint-state slots.
    pub fn unused_states(&self) -> usize {
        self.used_states.iter().filter(|used| !**used).count()
    }

    /// Indices of every joint-state slot currently in use, in increasing order.
    pub fn ia_used_states(&self) -> IndexArray {
        self.used_states
            .iter()
            .enumerate()
            .filter_map(|(i, used)| used.then_some(i))
            .collect()
    }

    /// Reserves `n` slots, first fit. The returned indices are increasing but
    /// only contiguous when the map is not fragmented.
    pub fn reserve_states(&mut self, n: usize) -> Result<IndexArray> {
        let available = self.unused_states();
        if n > available {
            return Err(EstimationError::MapFull {
                requested: n,
                available,
            });
        }

        let ia: IndexArray = self
            .used_states
            .iter()
            .enumerate()
            .filter_map(|(i, used)| (!used).then_some(i))
            .take(n)
            .collect();
        for &i in &ia {
            self.used_states[i] = true;
        }
        Ok(ia)
    }

    /// Frees slots and zeroes their mean, rows and columns.
    pub fn release_states(&mut self, ia: &[usize]) {
        let size = self.max_size();
        for &i in ia {
            self.used_states[i] = false;
            self.filter.x_mut()[i] = 0.0;
            let p = self.filter.p_mut();
            for k in 0..size {
                p[(i, k)] = 0.0;
                p[(k, i)] = 0.0;
            }
        }
    }

    /// Hands out the next landmark identifier.
    pub fn next_landmark_id(&mut self) -> u64 {
        let id = self.next_landmark_id;
        self.next_landmark_id += 1;
        id
    }

    pub fn add_landmark(&mut self, landmark: LandmarkEuclideanPoint) {
        debug!(id = landmark.id(), "Landmark added to map");
        self.landmarks.push(landmark);
    }

    pub fn landmarks(&self) -> &[LandmarkEuclideanPoint] {
        &self.landmarks
    }

    /// Prunes a landmark, releasing its joint-state slots. Returns it if found.
    pub fn remove_landmark(&mut self, id: u64) -> Option<LandmarkEuclideanPoint> {
        let pos = self.landmarks.iter().position(|l| l.id() == id)?;
        let landmark = self.landmarks.remove(pos);
        if let Some(ia) = landmark.state_indices() {
            let ia = ia.to_vec();
            self.release_states(&ia);
        }
        debug!(id, "Landmark pruned from map");
        Some(landmark)
    }
}

mod landmark;

pub use landmark::LandmarkEuclideanPoint;
