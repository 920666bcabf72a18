// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! # egoflow
//!
//! Sparse visual odometry front end:
//! landmark tracking in monocular and rectified stereo image streams,
//! sub-pixel stereo correspondences, and camera egomotion
//! (linear and angular velocity) from optical flow on the unit sphere.
//!
//! Feature detection and frame to frame point tracking are provided by the caller,
//! through the `core::track::Detector` and `core::track::PointTracker` traits.

pub mod core;
pub mod math;
pub mod misc;
