// rtslam_core/src/math/mod.rs

//! Small linear-algebra helpers shared by the estimator and the sensor models.
//!
//! The joint state is addressed through index arrays rather than contiguous
//! ranges, so most helpers here gather or scatter a sub-block of a dynamic
//! matrix given its row and column indices.

pub mod quaternion;

use nalgebra::{storage::Storage, DMatrix, DVector, Dim, Matrix};
use std::f64::consts::PI;

/// Computes `J * P * J^T`, symmetrised to remove round-off asymmetry.
pub fn prod_jpjt(p: &DMatrix<f64>, j: &DMatrix<f64>) -> DMatrix<f64> {
    let jpjt = j * p * j.transpose();
    (&jpjt + jpjt.transpose()) * 0.5
}

/// Gathers `m[rows, cols]` into a new dense matrix.
pub fn project(m: &DMatrix<f64>, rows: &[usize], cols: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(rows.len(), cols.len(), |r, c| m[(rows[r], cols[c])])
}

/// Gathers `v[idx]` into a new dense vector.
pub fn project_vec(v: &DVector<f64>, idx: &[usize]) -> DVector<f64> {
    DVector::from_fn(idx.len(), |r, _| v[idx[r]])
}

/// Scatters `block` into `m[rows, cols]`.
pub fn assign_block(m: &mut DMatrix<f64>, rows: &[usize], cols: &[usize], block: &DMatrix<f64>) {
    assert_eq!(block.nrows(), rows.len(), "assign_block: row count mismatch");
    assert_eq!(block.ncols(), cols.len(), "assign_block: column count mismatch");
    for (r, &i) in rows.iter().enumerate() {
        for (c, &j) in cols.iter().enumerate() {
            m[(i, j)] = block[(r, c)];
        }
    }
}

/// Scatters `values` into `v[idx]`.
pub fn assign_vec(v: &mut DVector<f64>, idx: &[usize], values: &DVector<f64>) {
    assert_eq!(values.len(), idx.len(), "assign_vec: size mismatch");
    for (r, &i) in idx.iter().enumerate() {
        v[i] = values[r];
    }
}

/// Copies any nalgebra matrix (typically a fixed-size Jacobian) into a `DMatrix`.
pub fn to_dynamic<R, C, S>(m: &Matrix<f64, R, C, S>) -> DMatrix<f64>
where
    R: Dim,
    C: Dim,
    S: Storage<f64, R, C>,
{
    DMatrix::from_fn(m.nrows(), m.ncols(), |r, c| m[(r, c)])
}

/// Wraps an angle to `[-PI, PI)`.
pub fn wrap_angle(angle: f64) -> f64 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}
