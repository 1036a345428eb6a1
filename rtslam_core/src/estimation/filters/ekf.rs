// rtslam_core/src/estimation/filters/ekf.rs

use nalgebra::DMatrix;
use tracing::trace;

use crate::error::{EstimationError, Result};
use crate::gaussian::Innovation;
use crate::math::{assign_block, project};
use crate::types::{Covariance, IndexArray, State};

/// The joint Extended Kalman Filter.
///
/// It owns the full state vector and covariance shared by the robot, its
/// sensors and every landmark of the map. Callers address sub-states through
/// index arrays; nothing in here knows what the indices mean.
#[derive(Debug, Clone)]
pub struct ExtendedKalmanFilter {
    /// The joint state vector `x`.
    x: State,
    /// The joint covariance matrix `P`.
    p: Covariance,
}

impl ExtendedKalmanFilter {
    /// Creates a filter with a zero state and zero covariance of the given size.
    pub fn new(size: usize) -> Self {
        Self {
            x: State::zeros(size),
            p: Covariance::zeros(size, size),
        }
    }

    /// Returns the dimension of the joint state.
    pub fn size(&self) -> usize {
        self.x.len()
    }

    pub fn x(&self) -> &State {
        &self.x
    }

    pub fn x_mut(&mut self) -> &mut State {
        &mut self.x
    }

    pub fn p(&self) -> &Covariance {
        &self.p
    }

    pub fn p_mut(&mut self) -> &mut Covariance {
        &mut self.p
    }

    /// Propagates the covariance of the sub-state `ia_v` through a linear(ized)
    /// motion model with Jacobian `f_v` and process noise `q`.
    ///
    /// The mean of `ia_v` is expected to have been moved by the caller already.
    /// Cross-covariances between `ia_v` and the rest of `ia_x` are propagated
    /// too: `P_vv = F P_vv F^T + Q`, `P_vm = F P_vm`.
    pub fn predict(&mut self, ia_x: &[usize], f_v: &DMatrix<f64>, ia_v: &[usize], q: &DMatrix<f64>) {
        assert_eq!(f_v.shape(), (ia_v.len(), ia_v.len()), "predict: F has wrong shape");
        assert_eq!(q.shape(), (ia_v.len(), ia_v.len()), "predict: Q has wrong shape");

        let ia_m: IndexArray = ia_x.iter().copied().filter(|i| !ia_v.contains(i)).collect();

        let p_vv = project(&self.p, ia_v, ia_v);
        let p_vv_new = f_v * p_vv * f_v.transpose() + q;
        let p_vv_new = (&p_vv_new + p_vv_new.transpose()) * 0.5;
        assign_block(&mut self.p, ia_v, ia_v, &p_vv_new);

        if !ia_m.is_empty() {
            let p_vm_new = f_v * project(&self.p, ia_v, &ia_m);
            assign_block(&mut self.p, ia_v, &ia_m, &p_vm_new);
            assign_block(&mut self.p, &ia_m, ia_v, &p_vm_new.transpose());
        }
    }

    /// Applies a Kalman correction to the states `ia_x`.
    ///
    /// `innovation` carries `z - h(x)` and its covariance `S`, and `inn_rs` is
    /// the Jacobian of the innovation with respect to the states `ia_rs` (the
    /// negated measurement Jacobian). With `PJt = P[ia_x, ia_rs] * inn_rs^T`:
    ///
    /// * `K = -PJt * S^-1`
    /// * `x[ia_x] += K * z`
    /// * `P[ia_x, ia_x] += K * PJt^T`
    ///
    /// Fails with [`EstimationError::SingularInnovation`] when `S` cannot be
    /// inverted, and with [`EstimationError::NonFiniteCorrection`] when the
    /// innovation, its Jacobian or the gain hold NaN or infinite values (a
    /// Jacobian evaluated at a singularity). The state is untouched on error.
    pub fn correct(
        &mut self,
        ia_x: &[usize],
        innovation: &Innovation,
        inn_rs: &DMatrix<f64>,
        ia_rs: &[usize],
    ) -> Result<()> {
        assert_eq!(inn_rs.nrows(), innovation.size(), "correct: Jacobian rows must match the innovation");
        assert_eq!(inn_rs.ncols(), ia_rs.len(), "correct: Jacobian columns must match ia_rs");

        let finite = |m: &DMatrix<f64>| m.iter().all(|v| v.is_finite());
        if !(innovation.x.iter().all(|v| v.is_finite()) && finite(&innovation.p) && finite(inn_rs)) {
            return Err(EstimationError::NonFiniteCorrection);
        }

        let s_inv = innovation
            .p
            .clone()
            .try_inverse()
            .ok_or(EstimationError::SingularInnovation)?;

        let pjt = project(&self.p, ia_x, ia_rs) * inn_rs.transpose();
        let k_gain = -(&pjt * s_inv);
        if !finite(&k_gain) {
            return Err(EstimationError::NonFiniteCorrection);
        }

        let dx = &k_gain * &innovation.x;
        for (r, &i) in ia_x.iter().enumerate() {
            self.x[i] += dx[r];
        }

        let dp = &k_gain * pjt.transpose();
        for (r, &i) in ia_x.iter().enumerate() {
            for (c, &j) in ia_x.iter().enumerate() {
                self.p[(i, j)] += 0.5 * (dp[(r, c)] + dp[(c, r)]);
            }
        }

        trace!(states = ia_x.len(), innovation = innovation.size(), "EKF correction applied");
        Ok(())
    }
}
