// rtslam_core/src/mapping/landmark.rs

use nalgebra::{Matrix3, Vector3};

use crate::error::Result;
use crate::mapping::{Landmark, LandmarkGeometry, LandmarkType, Map};
use crate::math::{assign_block, assign_vec, project_vec, to_dynamic};
use crate::types::IndexArray;

/// Where a landmark keeps its parameters.
#[derive(Debug, Clone, PartialEq)]
enum PointState {
    /// Stored in the joint filter at these indices.
    Filtered(IndexArray),
    /// Ground-truth landmark used by simulators, outside any filter.
    Simulated(Vector3<f64>),
}

/// A 3D point landmark stored by its Euclidean coordinates `[x, y, z]`.
///
/// This parametrization is linear in the observation models that use it, so
/// it is flagged as converged from the start.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkEuclideanPoint {
    id: u64,
    converged: bool,
    state: PointState,
}

impl LandmarkEuclideanPoint {
    pub const SIZE: usize = 3;

    /// Creates a filtered landmark, reserving its slots in the map.
    ///
    /// The landmark is not added to the map's landmark list; see
    /// [`Map::add_landmark`].
    pub fn new(map: &mut Map) -> Result<Self> {
        let ia = map.reserve_states(Self::SIZE)?;
        Ok(Self {
            id: map.next_landmark_id(),
            converged: true,
            state: PointState::Filtered(ia),
        })
    }

    /// Creates a simulation landmark holding its own ground-truth position.
    pub fn for_simulation(id: u64, position: Vector3<f64>) -> Self {
        Self {
            id,
            converged: true,
            state: PointState::Simulated(position),
        }
    }

    /// Re-parametrizes a previous landmark into a Euclidean point.
    ///
    /// `icomp` are the joint-state slots already reallocated for the new
    /// parametrization; the identity of `previous` is kept.
    pub fn from_previous(previous: &dyn Landmark, icomp: IndexArray) -> Self {
        assert_eq!(
            icomp.len(),
            Self::SIZE,
            "LandmarkEuclideanPoint::from_previous: expected {} state slots",
            Self::SIZE
        );
        Self {
            id: previous.id(),
            converged: true,
            state: PointState::Filtered(icomp),
        }
    }

    /// Writes the position and its covariance into the filter. No-op for
    /// simulation landmarks apart from moving them.
    pub fn initialize(&mut self, map: &mut Map, position: Vector3<f64>, covariance: Matrix3<f64>) {
        match &mut self.state {
            PointState::Filtered(ia) => {
                assign_vec(
                    map.filter.x_mut(),
                    ia,
                    &nalgebra::DVector::from_column_slice(position.as_slice()),
                );
                assign_block(map.filter.p_mut(), ia, ia, &to_dynamic(&covariance));
            }
            PointState::Simulated(p) => *p = position,
        }
    }

    /// Current position: the filter estimate, or the ground truth when simulated.
    pub fn position(&self, map: &Map) -> Vector3<f64> {
        match &self.state {
            PointState::Filtered(ia) => {
                let v = project_vec(map.filter.x(), ia);
                Vector3::new(v[0], v[1], v[2])
            }
            PointState::Simulated(p) => *p,
        }
    }
}

impl Landmark for LandmarkEuclideanPoint {
    fn id(&self) -> u64 {
        self.id
    }

    fn size(&self) -> usize {
        Self::SIZE
    }

    fn geometry(&self) -> LandmarkGeometry {
        LandmarkGeometry::Point
    }

    fn landmark_type(&self) -> LandmarkType {
        LandmarkType::EuclideanPoint
    }

    fn is_converged(&self) -> bool {
        self.converged
    }

    fn state_indices(&self) -> Option<&[usize]> {
        match &self.state {
            PointState::Filtered(ia) => Some(ia),
            PointState::Simulated(_) => None,
        }
    }
}
