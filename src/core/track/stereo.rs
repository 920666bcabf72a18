// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Stereo landmark tracking.
//!
//! Landmarks are tracked in the left images only.
//! Each left landmark is paired with a right landmark of the same identity,
//! found at every frame by horizontal matching in the rectified right image.
//! A pair lives as long as its left landmark is tracked and its stereo match converges.

use std::collections::{HashMap, HashSet};

use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::core::{
    camera::Intrinsics,
    landmark::{Landmark, LandmarkId, StereoLandmark},
    stereo,
    track::{Admission, ConfigError, Detector, PointTracker},
};
use crate::misc::type_aliases::{Float, Point2, Point3};

/// Stereo tracker, only constructed by initialization from a `Config`.
pub struct StereoTracker<D, T> {
    config: Config,
    detector: D,
    tracker: T,
    admission: Admission,
    previous_left: Option<DMatrix<u8>>,
    stereo_landmarks: Vec<StereoLandmark>,
}

/// Configuration of the stereo tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Intrinsics of the left camera.
    pub left_camera: Intrinsics,
    /// Intrinsics of the right camera.
    pub right_camera: Intrinsics,
    /// Stereo matching parameters.
    #[serde(default)]
    pub stereo: stereo::Config,
    /// Maximum number of tracked landmarks.
    #[serde(default = "default_max_features")]
    pub max_features: usize,
    /// Minimum distance (in pixels) between landmarks.
    #[serde(default = "default_feature_distance")]
    pub feature_distance: Float,
    /// Distance between the two camera centers.
    #[serde(default = "default_stereo_baseline")]
    pub stereo_baseline: Float,
    /// Normalized disparity under which no position is computed.
    #[serde(default = "default_min_disparity")]
    pub min_disparity: Float,
}

fn default_max_features() -> usize {
    500
}

fn default_feature_distance() -> Float {
    20.0
}

fn default_stereo_baseline() -> Float {
    0.1
}

fn default_min_disparity() -> Float {
    1e-6
}

impl Config {
    /// Configuration with default parameters for the given cameras.
    pub fn new(left_camera: Intrinsics, right_camera: Intrinsics) -> Self {
        Self {
            left_camera,
            right_camera,
            stereo: stereo::Config::default(),
            max_features: default_max_features(),
            feature_distance: default_feature_distance(),
            stereo_baseline: default_stereo_baseline(),
            min_disparity: default_min_disparity(),
        }
    }

    /// Validate the configuration and create a tracker without any landmark.
    pub fn init<D, T>(self, detector: D, tracker: T) -> Result<StereoTracker<D, T>, ConfigError>
    where
        D: Detector,
        T: PointTracker,
    {
        if !self.left_camera.is_valid() || !self.right_camera.is_valid() {
            return Err(ConfigError::Intrinsics);
        }
        if self.max_features == 0 {
            return Err(ConfigError::MaxFeatures);
        }
        self.stereo.validate()?;
        Ok(StereoTracker {
            admission: Admission::new(self.max_features, self.feature_distance),
            config: self,
            detector,
            tracker,
            previous_left: None,
            stereo_landmarks: Vec::new(),
        })
    }
} // impl Config

impl<D: Detector, T: PointTracker> StereoTracker<D, T> {
    /// Process a new pair of rectified gray images.
    ///
    /// Tracks the existing pairs in the left image, admits new ones,
    /// and matches every pair in the right image.
    /// Pairs whose left landmark is lost or whose stereo match fails are dropped.
    pub fn process_stereo_frame(&mut self, left: &DMatrix<u8>, right: &DMatrix<u8>) {
        self.track_landmarks(left);
        self.previous_left = Some(left.clone());

        let landmarks_left = self.landmarks();
        let new_landmarks = self.admission.admit(
            &mut self.detector,
            left,
            &self.config.left_camera,
            &landmarks_left,
        );
        self.stereo_landmarks
            .extend(new_landmarks.into_iter().map(StereoLandmark::new));

        self.match_stereo(left, right);

        let landmarks_left = self.landmarks();
        let landmarks_right: Vec<_> = self
            .stereo_landmarks
            .iter()
            .filter(|s| s.is_matched())
            .map(|s| s.right().clone())
            .collect();
        self.remove_lost_stereo_landmarks(&landmarks_left, &landmarks_right);
    }

    /// Restrict new detections to the pixels set in `mask`, for images of the same shape.
    pub fn set_mask(&mut self, mask: Option<DMatrix<bool>>) {
        self.admission.set_mask(mask);
    }

    /// Snapshot of the left landmarks, in stereo landmark order.
    pub fn landmarks(&self) -> Vec<Landmark> {
        self.stereo_landmarks.iter().map(|s| s.left().clone()).collect()
    }

    /// Current stereo pairs.
    pub fn stereo_landmarks(&self) -> &[StereoLandmark] {
        &self.stereo_landmarks
    }

    /// Left image coordinates of the stereo pairs.
    pub fn points_left(&self) -> Vec<Point2> {
        self.stereo_landmarks
            .iter()
            .filter_map(|s| s.left().primary())
            .collect()
    }

    /// Drop the pairs whose left identity is not in `landmarks_left`
    /// or whose right identity is not in `landmarks_right`.
    pub fn remove_lost_stereo_landmarks(&mut self, landmarks_left: &[Landmark], landmarks_right: &[Landmark]) {
        let ids_left: HashSet<LandmarkId> = landmarks_left.iter().map(Landmark::id).collect();
        let ids_right: HashSet<LandmarkId> = landmarks_right.iter().map(Landmark::id).collect();
        self.stereo_landmarks
            .retain(|s| ids_left.contains(&s.left_id()) && ids_right.contains(&s.right_id()));
    }

    /// Track left landmarks and keep the pairs whose left identity survived.
    /// Without a previous image there is nothing to track.
    fn track_landmarks(&mut self, left: &DMatrix<u8>) {
        let previous = match self.previous_left.as_ref() {
            Some(img) => img,
            None => return,
        };
        let mut landmarks_left = self.landmarks();
        self.tracker.track(
            previous,
            left,
            &self.config.left_camera,
            &mut landmarks_left,
        );
        let nb_before = self.stereo_landmarks.len();
        let mut tracked: HashMap<LandmarkId, Landmark> =
            landmarks_left.into_iter().map(|lm| (lm.id(), lm)).collect();
        let stereo_landmarks = std::mem::take(&mut self.stereo_landmarks);
        self.stereo_landmarks = stereo_landmarks
            .into_iter()
            .filter_map(|mut s| {
                tracked.remove(&s.left_id()).map(|lm| {
                    s.replace_left(lm);
                    s
                })
            })
            .collect();
        debug!(
            "Tracked {} / {} stereo landmarks",
            self.stereo_landmarks.len(),
            nb_before
        );
    }

    /// Match every pair in the right image, triangulating the converged ones
    /// and dropping the others.
    fn match_stereo(&mut self, left: &DMatrix<u8>, right: &DMatrix<u8>) {
        // Keeps points and pairs aligned.
        self.stereo_landmarks.retain(|s| s.left().primary().is_some());
        let points_left = self.points_left();
        let matches = stereo::match_points(&self.config.stereo, left, right, &points_left);
        let nb_before = self.stereo_landmarks.len();
        let config = &self.config;
        let stereo_landmarks = std::mem::take(&mut self.stereo_landmarks);
        self.stereo_landmarks = stereo_landmarks
            .into_iter()
            .zip(matches)
            .filter_map(|(mut s, point_right)| {
                let point_right = point_right?;
                let norm_right = config.right_camera.normalize(point_right);
                s.right_mut().set_primary(point_right, norm_right);
                let position = s
                    .left()
                    .primary_norm()
                    .and_then(|norm_left| triangulate(config, norm_left, norm_right))
                    .unwrap_or_else(Point3::origin);
                s.left_mut().set_position(position);
                Some(s)
            })
            .collect();
        debug!(
            "Stereo matched {} / {} landmarks",
            self.stereo_landmarks.len(),
            nb_before
        );
    }
}

/// 3D position of a rectified stereo correspondence, in the left camera frame.
/// `None` if the disparity is too small to give a reliable depth.
fn triangulate(config: &Config, norm_left: Point2, norm_right: Point2) -> Option<Point3> {
    let disparity = norm_right.x - norm_left.x;
    if disparity < config.min_disparity {
        None
    } else {
        let z = config.stereo_baseline / disparity;
        Some(Point3::new(z * norm_left.x, z * norm_left.y, z))
    }
}

// TESTS #############################################################
