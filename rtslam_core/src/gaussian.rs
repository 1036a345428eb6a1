// rtslam_core/src/gaussian.rs

use nalgebra::{DMatrix, DVector};

/// A Gaussian estimate: mean `x` and covariance `P`.
#[derive(Debug, Clone, PartialEq)]
pub struct Gaussian {
    pub x: DVector<f64>,
    pub p: DMatrix<f64>,
}

/// What the hardware reported this cycle.
pub type Measurement = Gaussian;
/// What the model predicts the hardware should report, with propagated uncertainty.
pub type Expectation = Gaussian;
/// `Measurement - Expectation`, covariance is the sum of both.
pub type Innovation = Gaussian;

impl Gaussian {
    /// A zero mean, zero covariance Gaussian of the given size.
    pub fn new(size: usize) -> Self {
        Self {
            x: DVector::zeros(size),
            p: DMatrix::zeros(size, size),
        }
    }

    pub fn size(&self) -> usize {
        self.x.len()
    }

    /// Resets mean and covariance to zero, keeping the size.
    pub fn clear(&mut self) {
        self.x.fill(0.0);
        self.p.fill(0.0);
    }

    /// `x^T P^-1 x`, or `None` when `P` is not positive definite.
    pub fn mahalanobis_squared(&self) -> Option<f64> {
        let chol = self.p.clone().cholesky()?;
        let solved = chol.solve(&self.x);
        let d2 = self.x.dot(&solved);
        d2.is_finite().then_some(d2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_mahalanobis_of_diagonal_covariance() {
        let mut g = Gaussian::new(2);
        g.x = DVector::from_vec(vec![2.0, -1.0]);
        g.p = DMatrix::from_diagonal(&DVector::from_vec(vec![4.0, 0.25]));
        // 2^2 / 4 + 1 / 0.25
        assert_abs_diff_eq!(g.mahalanobis_squared().unwrap(), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mahalanobis_rejects_indefinite_covariance() {
        let mut g = Gaussian::new(2);
        g.x = DVector::from_vec(vec![1.0, 1.0]);
        g.p = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, -1.0]));
        assert!(g.mahalanobis_squared().is_none());
    }
}
