// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tracked scene points and their stereo pairs.
//!
//! A `Landmark` holds one observation per camera view
//! (raw pixel coordinates and their normalized counterparts, always in pairs),
//! plus what is derived from tracking it over time:
//! its bearing on the unit sphere, its optical flow and its lifetime.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::math::s2;
use crate::misc::type_aliases::{Point2, Point3, Vec2, Vec3};

/// Unique identity of a landmark.
/// Assigned once at creation and never reused by the tracker that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LandmarkId(pub u64);

impl fmt::Display for LandmarkId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A tracked scene point.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmark {
    id: LandmarkId,
    coordinates: Vec<Point2>,
    coordinates_norm: Vec<Point2>,
    position: Point3,
    bearing: Vec3,
    optical_flow_raw: Vec2,
    optical_flow_norm: Vec2,
    optical_flow_sphere: Vec3,
    lifetime: usize,
}

impl Landmark {
    /// New landmark observed once, in its primary view.
    pub fn new(id: LandmarkId, raw: Point2, normalized: Point2) -> Self {
        let mut landmark = Self::unobserved(id);
        landmark.set_primary(raw, normalized);
        landmark.lifetime = 1;
        landmark
    }

    /// Landmark with an identity but no observation yet.
    /// This is the state of the right landmark of a fresh stereo pair.
    pub fn unobserved(id: LandmarkId) -> Self {
        Self {
            id,
            coordinates: Vec::new(),
            coordinates_norm: Vec::new(),
            position: Point3::origin(),
            bearing: Vec3::zeros(),
            optical_flow_raw: Vec2::zeros(),
            optical_flow_norm: Vec2::zeros(),
            optical_flow_sphere: Vec3::zeros(),
            lifetime: 0,
        }
    }

    /// Identity of the landmark.
    pub fn id(&self) -> LandmarkId {
        self.id
    }

    /// Raw pixel coordinates, indexed by view.
    pub fn coordinates(&self) -> &[Point2] {
        &self.coordinates
    }

    /// Normalized coordinates, indexed by view.
    pub fn coordinates_norm(&self) -> &[Point2] {
        &self.coordinates_norm
    }

    /// Raw pixel coordinates in the primary view (view 0).
    pub fn primary(&self) -> Option<Point2> {
        self.coordinates.first().copied()
    }

    /// Normalized coordinates in the primary view (view 0).
    pub fn primary_norm(&self) -> Option<Point2> {
        self.coordinates_norm.first().copied()
    }

    /// Number of views in which the landmark is observed.
    pub fn view_count(&self) -> usize {
        self.coordinates.len()
    }

    /// 3D position estimate, the origin until solved.
    pub fn position(&self) -> Point3 {
        self.position
    }

    /// Unit bearing through the primary normalized coordinates.
    pub fn bearing(&self) -> Vec3 {
        self.bearing
    }

    /// Pixel displacement since the previous frame.
    pub fn optical_flow_raw(&self) -> Vec2 {
        self.optical_flow_raw
    }

    /// Normalized plane displacement since the previous frame.
    pub fn optical_flow_norm(&self) -> Vec2 {
        self.optical_flow_norm
    }

    /// Bearing displacement since the previous frame.
    pub fn optical_flow_sphere(&self) -> Vec3 {
        self.optical_flow_sphere
    }

    /// Number of frames in which the landmark has been observed.
    pub fn lifetime(&self) -> usize {
        self.lifetime
    }

    /// Set (or replace) the primary observation, without touching flow or lifetime.
    pub fn set_primary(&mut self, raw: Point2, normalized: Point2) {
        if self.coordinates.is_empty() {
            self.coordinates.push(raw);
            self.coordinates_norm.push(normalized);
        } else {
            self.coordinates[0] = raw;
            self.coordinates_norm[0] = normalized;
        }
        self.bearing = bearing_of(normalized);
    }

    /// Move the primary observation to where a tracker found it in a new frame.
    ///
    /// Flows are the displacements from the previous primary observation,
    /// and the lifetime grows by one frame.
    pub fn advance(&mut self, raw: Point2, normalized: Point2) {
        match (self.primary(), self.primary_norm()) {
            (Some(old_raw), Some(old_norm)) => {
                let new_bearing = bearing_of(normalized);
                self.optical_flow_raw = raw - old_raw;
                self.optical_flow_norm = normalized - old_norm;
                self.optical_flow_sphere = new_bearing - self.bearing;
                self.coordinates[0] = raw;
                self.coordinates_norm[0] = normalized;
                self.bearing = new_bearing;
            }
            _ => self.set_primary(raw, normalized),
        }
        self.lifetime += 1;
    }

    pub(crate) fn set_position(&mut self, position: Point3) {
        self.position = position;
    }
}

/// Unit bearing through a point of the normalized image plane.
pub fn bearing_of(normalized: Point2) -> Vec3 {
    // (x, y, 1) is never zero, so this never fails.
    let ray = Vec3::new(normalized.x, normalized.y, 1.0);
    s2::try_normalize(&ray).unwrap_or_else(Vec3::z)
}

/// Left and right observations of the same scene point in a rectified stereo pair.
///
/// Both landmarks share the same identity.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoLandmark {
    left: Landmark,
    right: Landmark,
}

impl StereoLandmark {
    /// Pair a left landmark with a not yet observed right landmark.
    pub fn new(left: Landmark) -> Self {
        let right = Landmark::unobserved(left.id());
        Self { left, right }
    }

    /// Identity of the left landmark.
    pub fn left_id(&self) -> LandmarkId {
        self.left.id()
    }

    /// Identity of the right landmark.
    pub fn right_id(&self) -> LandmarkId {
        self.right.id()
    }

    /// Left landmark.
    pub fn left(&self) -> &Landmark {
        &self.left
    }

    /// Right landmark.
    pub fn right(&self) -> &Landmark {
        &self.right
    }

    /// True once the right landmark has been observed.
    pub fn is_matched(&self) -> bool {
        self.right.view_count() > 0
    }

    pub(crate) fn left_mut(&mut self) -> &mut Landmark {
        &mut self.left
    }

    pub(crate) fn right_mut(&mut self) -> &mut Landmark {
        &mut self.right
    }

    pub(crate) fn replace_left(&mut self, left: Landmark) {
        self.left = left;
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;

    fn landmark() -> Landmark {
        Landmark::new(LandmarkId(7), Point2::new(320.0, 240.0), Point2::new(0.0, 0.0))
    }

    #[test]
    fn new_landmark_looks_forward() {
        let lm = landmark();
        assert_eq!(1, lm.lifetime());
        assert_eq!(Vec3::z(), lm.bearing());
        assert_eq!(Vec3::zeros(), lm.optical_flow_sphere());
        assert_eq!(Point3::origin(), lm.position());
    }

    #[test]
    fn advance_computes_flows() {
        let mut lm = landmark();
        lm.advance(Point2::new(330.0, 235.0), Point2::new(0.1, -0.05));
        assert_eq!(2, lm.lifetime());
        assert_eq!(Vec2::new(10.0, -5.0), lm.optical_flow_raw());
        approx::assert_relative_eq!(lm.optical_flow_norm(), Vec2::new(0.1, -0.05));
        let expected_bearing = Vec3::new(0.1, -0.05, 1.0).normalize();
        approx::assert_relative_eq!(lm.bearing(), expected_bearing, epsilon = 1e-12);
        approx::assert_relative_eq!(
            lm.optical_flow_sphere(),
            expected_bearing - Vec3::z(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn set_primary_replaces_the_view() {
        let mut lm = landmark();
        lm.set_primary(Point2::new(300.0, 240.0), Point2::new(-0.05, 0.0));
        assert_eq!(1, lm.view_count());
        assert_eq!(lm.coordinates().len(), lm.coordinates_norm().len());
        approx::assert_relative_eq!(lm.bearing(), Vec3::new(-0.05, 0.0, 1.0).normalize(), epsilon = 1e-12);
        assert_eq!(Vec2::zeros(), lm.optical_flow_raw());
    }

    #[test]
    fn fresh_stereo_landmark_is_unmatched() {
        let stereo = StereoLandmark::new(landmark());
        assert_eq!(stereo.left_id(), stereo.right_id());
        assert!(!stereo.is_matched());
        assert_eq!(0, stereo.right().lifetime());
    }

    #[test]
    fn set_primary_keeps_lifetime() {
        let mut stereo = StereoLandmark::new(landmark());
        stereo
            .right_mut()
            .set_primary(Point2::new(310.0, 240.0), Point2::new(-0.02, 0.0));
        assert!(stereo.is_matched());
        assert_eq!(0, stereo.right().lifetime());
        assert_eq!(Some(Point2::new(310.0, 240.0)), stereo.right().primary());
    }
}
