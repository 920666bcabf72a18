// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Camera intrinsic parameters and pixel normalization.
//!
//! Images are supposed already undistorted (and rectified for stereo pairs),
//! so a pinhole model is enough to go from pixel coordinates
//! to the calibrated "normalized" image plane at z = 1.

use serde::{Deserialize, Serialize};

use crate::misc::type_aliases::{Float, Point2};

/// Intrinsic parameters of a pinhole camera.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Intrinsics {
    /// Principal point (in pixels).
    pub principal_point: (Float, Float),
    /// Focal lengths along the x and y axes (in pixels).
    pub focal: (Float, Float),
    /// Skew coefficient, 0 for most cameras.
    pub skew: Float,
}

impl Intrinsics {
    /// True if both focal lengths are finite and non-zero.
    /// A camera without usable focal lengths cannot normalize anything.
    pub fn is_valid(&self) -> bool {
        let (fx, fy) = self.focal;
        let (cx, cy) = self.principal_point;
        fx.is_finite()
            && fy.is_finite()
            && fx != 0.0
            && fy != 0.0
            && cx.is_finite()
            && cy.is_finite()
            && self.skew.is_finite()
    }

    /// Map raw pixel coordinates into the normalized image plane.
    pub fn normalize(&self, pixel: Point2) -> Point2 {
        let (cx, cy) = self.principal_point;
        let (fx, fy) = self.focal;
        let y = (pixel.y - cy) / fy;
        let x = (pixel.x - cx - self.skew * y) / fx;
        Point2::new(x, y)
    }
}

// TESTS #############################################################
