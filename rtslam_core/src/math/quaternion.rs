// rtslam_core/src/math/quaternion.rs

//! Quaternion algebra with analytic Jacobians.
//!
//! Quaternions are stored as `Vector4<f64>` in `[w, x, y, z]` order (scalar
//! first), which is also the order used for the orientation block of the
//! robot pose inside the joint state. Euler angles are `[roll, pitch, yaw]`
//! with `R = Rz(yaw) * Ry(pitch) * Rx(roll)`.
//!
//! All functions are pure. The `*_by_dq*` and `*_with_jacobian` variants
//! return the derivative of the output with respect to the named input,
//! evaluated at the given linearization point.

use nalgebra::{
    Matrix3, Matrix3x4, Matrix4, Matrix4x3, Quaternion, UnitQuaternion, Vector3, Vector4,
};

/// The identity rotation `[1, 0, 0, 0]`.
pub fn identity() -> Vector4<f64> {
    Vector4::new(1.0, 0.0, 0.0, 0.0)
}

/// Conjugate `[w, -x, -y, -z]`; the inverse rotation for a unit quaternion.
pub fn conjugate(q: &Vector4<f64>) -> Vector4<f64> {
    Vector4::new(q[0], -q[1], -q[2], -q[3])
}

/// Converts to nalgebra's unit quaternion (normalizing on the way).
pub fn to_unit_quaternion(q: &Vector4<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::from_quaternion(Quaternion::new(q[0], q[1], q[2], q[3]))
}

/// Converts from nalgebra's unit quaternion.
pub fn from_unit_quaternion(q: &UnitQuaternion<f64>) -> Vector4<f64> {
    Vector4::new(q.w, q.i, q.j, q.k)
}

/// Rotation matrix of `q`. `q` is not normalized first.
pub fn to_rotation_matrix(q: &Vector4<f64>) -> Matrix3<f64> {
    let (a, b, c, d) = (q[0], q[1], q[2], q[3]);
    Matrix3::new(
        a * a + b * b - c * c - d * d,
        2.0 * (b * c - a * d),
        2.0 * (b * d + a * c),
        2.0 * (b * c + a * d),
        a * a - b * b + c * c - d * d,
        2.0 * (c * d - a * b),
        2.0 * (b * d - a * c),
        2.0 * (c * d + a * b),
        a * a - b * b - c * c + d * d,
    )
}

/// Rotates `v` by `q`: `R(q) * v`.
pub fn rotate(q: &Vector4<f64>, v: &Vector3<f64>) -> Vector3<f64> {
    to_rotation_matrix(q) * v
}

/// Jacobian of `rotate(q, v)` with respect to `q` (3x4).
pub fn rotate_by_dq(q: &Vector4<f64>, v: &Vector3<f64>) -> Matrix3x4<f64> {
    let (a, b, c, d) = (q[0], q[1], q[2], q[3]);

    // Each column is dR/dq_k * v.
    let dr_da = Matrix3::new(a, -d, c, d, a, -b, -c, b, a) * 2.0;
    let dr_db = Matrix3::new(b, c, d, c, -b, -a, d, a, -b) * 2.0;
    let dr_dc = Matrix3::new(-c, b, a, b, c, d, -a, d, -c) * 2.0;
    let dr_dd = Matrix3::new(-d, -a, b, a, -d, c, b, c, d) * 2.0;

    Matrix3x4::from_columns(&[dr_da * v, dr_db * v, dr_dc * v, dr_dd * v])
}

/// Hamilton product `q1 * q2`.
pub fn product(q1: &Vector4<f64>, q2: &Vector4<f64>) -> Vector4<f64> {
    let (a1, b1, c1, d1) = (q1[0], q1[1], q1[2], q1[3]);
    let (a2, b2, c2, d2) = (q2[0], q2[1], q2[2], q2[3]);
    Vector4::new(
        a1 * a2 - b1 * b2 - c1 * c2 - d1 * d2,
        a1 * b2 + b1 * a2 + c1 * d2 - d1 * c2,
        a1 * c2 - b1 * d2 + c1 * a2 + d1 * b2,
        a1 * d2 + b1 * c2 - c1 * b2 + d1 * a2,
    )
}

/// Jacobian of `product(q1, q2)` with respect to `q1`. Only depends on `q2`.
pub fn product_by_dq1(q2: &Vector4<f64>) -> Matrix4<f64> {
    let (a, b, c, d) = (q2[0], q2[1], q2[2], q2[3]);
    Matrix4::new(
        a, -b, -c, -d, //
        b, a, d, -c, //
        c, -d, a, b, //
        d, c, -b, a,
    )
}

/// Jacobian of `product(q1, q2)` with respect to `q2`. Only depends on `q1`.
pub fn product_by_dq2(q1: &Vector4<f64>) -> Matrix4<f64> {
    let (a, b, c, d) = (q1[0], q1[1], q1[2], q1[3]);
    Matrix4::new(
        a, -b, -c, -d, //
        b, a, -d, c, //
        c, d, a, -b, //
        d, -c, b, a,
    )
}

/// Returns `q / |q|`.
pub fn normalize(q: &Vector4<f64>) -> Vector4<f64> {
    q / q.norm()
}

/// Jacobian of `normalize(q)` with respect to `q`.
pub fn normalize_by_dq(q: &Vector4<f64>) -> Matrix4<f64> {
    let n2 = q.norm_squared();
    let n = n2.sqrt();
    (Matrix4::identity() * n2 - q * q.transpose()) / (n2 * n)
}

/// Euler angles `[roll, pitch, yaw]` of `q`.
pub fn to_euler(q: &Vector4<f64>) -> Vector3<f64> {
    to_euler_with_jacobian(q).0
}

/// Euler angles of `q` and their Jacobian with respect to `q` (3x4).
pub fn to_euler_with_jacobian(q: &Vector4<f64>) -> (Vector3<f64>, Matrix3x4<f64>) {
    let (a, b, c, d) = (q[0], q[1], q[2], q[3]);

    let y1 = 2.0 * (c * d + a * b);
    let x1 = a * a - b * b - c * c + d * d;
    let s = (2.0 * (a * c - b * d)).clamp(-1.0, 1.0);
    let y3 = 2.0 * (b * c + a * d);
    let x3 = a * a + b * b - c * c - d * d;

    let euler = Vector3::new(y1.atan2(x1), s.asin(), y3.atan2(x3));

    let dy1 = Vector4::new(b, a, d, c) * 2.0;
    let dx1 = Vector4::new(a, -b, -c, d) * 2.0;
    let ds = Vector4::new(c, -d, a, -b) * 2.0;
    let dy3 = Vector4::new(d, c, b, a) * 2.0;
    let dx3 = Vector4::new(a, b, -c, -d) * 2.0;

    let droll = (dy1 * x1 - dx1 * y1) / (x1 * x1 + y1 * y1);
    // Gimbal lock at |pitch| = 90 deg; the Jacobian blows up there.
    let dpitch = ds / (1.0 - s * s).sqrt();
    let dyaw = (dy3 * x3 - dx3 * y3) / (x3 * x3 + y3 * y3);

    let jac = Matrix3x4::from_rows(&[droll.transpose(), dpitch.transpose(), dyaw.transpose()]);
    (euler, jac)
}

/// Quaternion of Euler angles `[roll, pitch, yaw]`.
pub fn from_euler(e: &Vector3<f64>) -> Vector4<f64> {
    from_euler_with_jacobian(e).0
}

/// Quaternion of Euler angles `e` and its Jacobian with respect to `e` (4x3).
pub fn from_euler_with_jacobian(e: &Vector3<f64>) -> (Vector4<f64>, Matrix4x3<f64>) {
    let (sr, cr) = (e[0] * 0.5).sin_cos();
    let (sp, cp) = (e[1] * 0.5).sin_cos();
    let (sy, cy) = (e[2] * 0.5).sin_cos();

    let q = Vector4::new(
        cr * cp * cy + sr * sp * sy,
        sr * cp * cy - cr * sp * sy,
        cr * sp * cy + sr * cp * sy,
        cr * cp * sy - sr * sp * cy,
    );

    let d_roll = Vector4::new(
        -sr * cp * cy + cr * sp * sy,
        cr * cp * cy + sr * sp * sy,
        -sr * sp * cy + cr * cp * sy,
        -sr * cp * sy - cr * sp * cy,
    );
    let d_pitch = Vector4::new(
        -cr * sp * cy + sr * cp * sy,
        -sr * sp * cy - cr * cp * sy,
        cr * cp * cy - sr * sp * sy,
        -cr * sp * sy - sr * cp * cy,
    );
    let d_yaw = Vector4::new(
        -cr * cp * sy + sr * sp * cy,
        -sr * cp * sy - cr * sp * cy,
        -cr * sp * sy + sr * cp * cy,
        cr * cp * cy + sr * sp * sy,
    );

    // The half angles contribute the factor 0.5.
    let jac = Matrix4x3::from_columns(&[d_roll, d_pitch, d_yaw]) * 0.5;
    (q, jac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::{DMatrix, DVector};
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-7;

    /// Central finite-difference Jacobian of `f` at `x`.
    fn numeric_jacobian(f: impl Fn(&DVector<f64>) -> DVector<f64>, x: &DVector<f64>) -> DMatrix<f64> {
        let h = 1e-6;
        let rows = f(x).len();
        let mut jac = DMatrix::zeros(rows, x.len());
        for k in 0..x.len() {
            let mut plus = x.clone();
            let mut minus = x.clone();
            plus[k] += h;
            minus[k] -= h;
            let col = (f(&plus) - f(&minus)) / (2.0 * h);
            jac.set_column(k, &col);
        }
        jac
    }

    fn test_quaternion() -> Vector4<f64> {
        from_euler(&Vector3::new(0.3, -0.4, 1.2))
    }

    fn v4(x: &DVector<f64>) -> Vector4<f64> {
        Vector4::new(x[0], x[1], x[2], x[3])
    }

    #[test]
    fn test_rotate_matches_nalgebra() {
        let q = test_quaternion();
        let v = Vector3::new(1.0, -2.0, 0.5);
        let expected = to_unit_quaternion(&q) * v;
        assert_abs_diff_eq!(rotate(&q, &v), expected, epsilon = EPS);
    }

    #[test]
    fn test_product_matches_nalgebra() {
        let q1 = test_quaternion();
        let q2 = from_euler(&Vector3::new(-0.1, 0.2, -2.5));
        let expected = to_unit_quaternion(&q1) * to_unit_quaternion(&q2);
        assert_abs_diff_eq!(product(&q1, &q2), from_unit_quaternion(&expected), epsilon = EPS);
    }

    #[test]
    fn test_euler_matches_nalgebra_convention() {
        let e = Vector3::new(0.3, -0.4, 1.2);
        let expected = UnitQuaternion::from_euler_angles(e[0], e[1], e[2]);
        assert_abs_diff_eq!(from_euler(&e), from_unit_quaternion(&expected), epsilon = EPS);
        assert_abs_diff_eq!(to_euler(&from_euler(&e)), e, epsilon = EPS);
    }

    #[test]
    fn test_rotate_by_dq_matches_finite_difference() {
        let q = test_quaternion();
        let v = Vector3::new(1.0, -2.0, 0.5);
        let numeric = numeric_jacobian(
            |x| DVector::from_column_slice(rotate(&v4(x), &v).as_slice()),
            &DVector::from_column_slice(q.as_slice()),
        );
        let analytic = crate::math::to_dynamic(&rotate_by_dq(&q, &v));
        assert_abs_diff_eq!(analytic, numeric, epsilon = 1e-6);
    }

    #[test]
    fn test_product_jacobians_match_finite_difference() {
        let q1 = test_quaternion();
        let q2 = from_euler(&Vector3::new(-0.1, 0.2, -2.5));

        let numeric_1 = numeric_jacobian(
            |x| DVector::from_column_slice(product(&v4(x), &q2).as_slice()),
            &DVector::from_column_slice(q1.as_slice()),
        );
        let numeric_2 = numeric_jacobian(
            |x| DVector::from_column_slice(product(&q1, &v4(x)).as_slice()),
            &DVector::from_column_slice(q2.as_slice()),
        );

        assert_abs_diff_eq!(crate::math::to_dynamic(&product_by_dq1(&q2)), numeric_1, epsilon = 1e-6);
        assert_abs_diff_eq!(crate::math::to_dynamic(&product_by_dq2(&q1)), numeric_2, epsilon = 1e-6);
    }

    #[test]
    fn test_euler_jacobians_match_finite_difference() {
        let q = test_quaternion();
        let numeric_q2e = numeric_jacobian(
            |x| DVector::from_column_slice(to_euler(&v4(x)).as_slice()),
            &DVector::from_column_slice(q.as_slice()),
        );
        let (_, analytic_q2e) = to_euler_with_jacobian(&q);
        assert_abs_diff_eq!(crate::math::to_dynamic(&analytic_q2e), numeric_q2e, epsilon = 1e-5);

        let e = Vector3::new(0.3, -0.4, 1.2);
        let numeric_e2q = numeric_jacobian(
            |x| DVector::from_column_slice(from_euler(&Vector3::new(x[0], x[1], x[2])).as_slice()),
            &DVector::from_column_slice(e.as_slice()),
        );
        let (_, analytic_e2q) = from_euler_with_jacobian(&e);
        assert_abs_diff_eq!(crate::math::to_dynamic(&analytic_e2q), numeric_e2q, epsilon = 1e-6);
    }

    #[test]
    fn test_normalize_by_dq_matches_finite_difference() {
        let q = Vector4::new(0.9, 0.2, -0.3, 0.4);
        let numeric = numeric_jacobian(
            |x| DVector::from_column_slice(normalize(&v4(x)).as_slice()),
            &DVector::from_column_slice(q.as_slice()),
        );
        assert_abs_diff_eq!(crate::math::to_dynamic(&normalize_by_dq(&q)), numeric, epsilon = 1e-6);
    }

    #[test]
    fn test_yaw_quarter_turn_rotates_x_onto_y() {
        let q = from_euler(&Vector3::new(0.0, 0.0, FRAC_PI_2));
        assert_abs_diff_eq!(rotate(&q, &Vector3::x()), Vector3::y(), epsilon = EPS);
        assert_abs_diff_eq!(product(&q, &conjugate(&q)), identity(), epsilon = EPS);
    }
}
