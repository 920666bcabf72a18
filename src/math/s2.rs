// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Functions on the unit sphere S2, seen as a manifold.
//!
//! Bearings live on S2, flows live in its tangent planes,
//! and the direction of the linear velocity is optimized on it.
//! An element of the tangent plane at `x` is any vector orthogonal to `x`.

use crate::misc::type_aliases::{Float, Mat3, Vec3};

/// Threshold under which a vector is considered too small to be normalized.
pub const EPSILON_NORM: Float = 1e-12;

/// Threshold for using Taylor series in the exponential map.
const EPSILON_TAYLOR_SERIES: Float = 1e-4;
const _1_6: Float = 1.0 / 6.0;

/// Orthogonal projector onto the plane orthogonal to `x`:
/// `P(x) = I - x x^T / |x|^2`.
///
/// `x` does not need to be normalized, but must not be zero.
pub fn projector(x: &Vec3) -> Mat3 {
    Mat3::identity() - x * x.transpose() / x.norm_squared()
}

/// Project `v` onto the tangent plane at `x`.
/// Same as `projector(x) * v` without building the matrix.
pub fn project(x: &Vec3, v: &Vec3) -> Vec3 {
    v - x * (x.dot(v) / x.norm_squared())
}

/// Normalize a vector, or return `None` if it is too small (or not finite).
pub fn try_normalize(v: &Vec3) -> Option<Vec3> {
    let norm = v.norm();
    if norm > EPSILON_NORM && norm.is_finite() {
        Some(v / norm)
    } else {
        None
    }
}

/// Exponential map of the sphere at the unit vector `x`.
///
/// Moves along the great circle leaving `x` in the direction of `v`,
/// for an arc length of `|v|`.
/// The component of `v` along `x` is discarded first,
/// so the result always stays on the sphere.
#[allow(clippy::useless_let_if_seq)]
pub fn exp(x: &Vec3, v: &Vec3) -> Vec3 {
    let tangent = project(x, v);
    let theta = tangent.norm();
    let cos_factor;
    let sin_factor;
    if theta < EPSILON_TAYLOR_SERIES {
        cos_factor = 1.0 - 0.5 * theta * theta;
        sin_factor = 1.0 - _1_6 * theta * theta;
    } else {
        cos_factor = theta.cos();
        sin_factor = theta.sin() / theta;
    }
    // Renormalize to avoid drifting away from the sphere over many iterations.
    let y = cos_factor * x + sin_factor * tangent;
    y / y.norm()
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;

    const EPSILON: Float = 1e-10;

    #[test]
    fn exp_of_zero_is_identity() {
        let x = Vec3::new(0.0, 0.6, 0.8);
        approx::assert_relative_eq!(exp(&x, &Vec3::zeros()), x, epsilon = EPSILON);
    }

    #[test]
    fn exp_quarter_turn() {
        let x = Vec3::z();
        let v = Vec3::new(std::f64::consts::FRAC_PI_2, 0.0, 0.0);
        approx::assert_relative_eq!(exp(&x, &v), Vec3::x(), epsilon = EPSILON);
    }

    #[test]
    fn exp_ignores_normal_component() {
        let x = Vec3::new(0.0, 0.0, 1.0);
        let v = Vec3::new(0.1, -0.2, 5.0);
        let w = Vec3::new(0.1, -0.2, 0.0);
        approx::assert_relative_eq!(exp(&x, &v), exp(&x, &w), epsilon = EPSILON);
    }

    #[test]
    fn try_normalize_rejects_zero() {
        assert_eq!(None, try_normalize(&Vec3::zeros()));
        assert_eq!(None, try_normalize(&Vec3::new(Float::NAN, 0.0, 1.0)));
    }

    // PROPERTY TESTS ################################################

    #[quickcheck_macros::quickcheck]
    fn projector_is_idempotent(x: Float, y: Float, z: Float) -> bool {
        let v = Vec3::new(x, y, z);
        if v.norm() < 1e-3 {
            return true;
        }
        let p = projector(&v);
        approx::relative_eq!(p * p, p, epsilon = 1e-9)
    }

    #[quickcheck_macros::quickcheck]
    fn project_is_orthogonal(x: Float, y: Float, z: Float, a: Float, b: Float, c: Float) -> bool {
        let v = Vec3::new(x, y, z);
        if v.norm() < 1e-3 {
            return true;
        }
        let w = Vec3::new(a, b, c);
        let projected = project(&v, &w);
        approx::relative_eq!(projected, projector(&v) * w, epsilon = 1e-9, max_relative = 1e-9)
            && projected.dot(&v).abs() <= 1e-9 * (1.0 + w.norm() * v.norm())
    }

    #[quickcheck_macros::quickcheck]
    fn exp_stays_on_sphere(x: Float, y: Float, z: Float, a: Float, b: Float, c: Float) -> bool {
        match try_normalize(&Vec3::new(x, y, z)) {
            None => true,
            Some(unit) => (exp(&unit, &Vec3::new(a, b, c)).norm() - 1.0).abs() < 1e-12,
        }
    }
}
