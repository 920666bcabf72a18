// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Optical flow on the unit sphere.
//!
//! A sphere flow is a pair `(η, φ)` where `η` is a unit bearing
//! and `φ` its time derivative, tangent to the sphere at `η`.
//! The normalized plane variant `(p, v)` is the same motion expressed
//! with the projective point `p = (η_x/η_z, η_y/η_z)` and its velocity.

use crate::core::landmark::Landmark;
use crate::math::s2;
use crate::misc::type_aliases::{Float, Point2, Vec2, Vec3};

/// Bearing and bearing velocity of a landmark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereFlow {
    /// Unit bearing `η`.
    pub bearing: Vec3,
    /// Bearing velocity `φ`.
    pub flow: Vec3,
}

/// Point and velocity in the normalized image plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneFlow {
    /// Normalized image coordinates.
    pub point: Point2,
    /// Velocity of the normalized image coordinates.
    pub flow: Vec2,
}

/// Sphere flow of a landmark over a time step `dt`.
///
/// Landmarks observed in less than two frames carry no flow and give `None`.
pub fn from_landmark(landmark: &Landmark, dt: Float) -> Option<SphereFlow> {
    if landmark.lifetime() < 2 {
        None
    } else {
        Some(SphereFlow {
            bearing: landmark.bearing(),
            flow: landmark.optical_flow_sphere() / dt,
        })
    }
}

/// Sphere flows of all landmarks having a flow observation.
pub fn from_landmarks(landmarks: &[Landmark], dt: Float) -> Vec<SphereFlow> {
    landmarks
        .iter()
        .filter_map(|lm| from_landmark(lm, dt))
        .collect()
}

/// Lift a normalized plane flow onto the sphere.
pub fn lift(plane_flow: &PlaneFlow) -> SphereFlow {
    let ray = Vec3::new(plane_flow.point.x, plane_flow.point.y, 1.0);
    let ray_norm = ray.norm();
    let bearing = ray / ray_norm;
    let ray_velocity = Vec3::new(plane_flow.flow.x, plane_flow.flow.y, 0.0);
    SphereFlow {
        bearing,
        flow: s2::project(&bearing, &ray_velocity) / ray_norm,
    }
}

/// Express a sphere flow in the normalized image plane.
///
/// Returns `None` for bearings parallel to the image plane.
/// Inverse of `lift` for bearings in front of the camera.
pub fn to_normalized_plane(sphere_flow: &SphereFlow) -> Option<PlaneFlow> {
    let eta = &sphere_flow.bearing;
    let phi = &sphere_flow.flow;
    let eta_z = eta.z;
    if eta_z.abs() < s2::EPSILON_NORM {
        return None;
    }
    let point = Point2::new(eta.x / eta_z, eta.y / eta_z);
    let flow = Vec2::new(
        (phi.x - point.x * phi.z) / eta_z,
        (phi.y - point.y * phi.z) / eta_z,
    );
    Some(PlaneFlow { point, flow })
}

// TESTS #############################################################
