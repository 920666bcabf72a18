// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Lie algebra helpers for 3D rotations.
//!
//! Only the pieces needed for angular velocities live here:
//! an angular velocity is an element of so3, and `ω × η` is `hat(ω) * η`.

use crate::misc::type_aliases::{Mat3, Vec3};

/// Hat operator.
/// Goes from so3 parameterization to so3 element (skew-symmetric matrix).
#[rustfmt::skip]
pub fn hat(w: Vec3) -> Mat3 {
    Mat3::new(
         0.0,  -w.z,   w.y,
         w.z,   0.0,  -w.x,
        -w.y,   w.x,   0.0,
    )
}

// TESTS #############################################################
