// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Monocular landmark tracking, the input of egomotion estimation.

use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::core::{
    camera::Intrinsics,
    landmark::Landmark,
    track::{Admission, ConfigError, Detector, PointTracker},
};
use crate::misc::type_aliases::Float;

/// Monocular tracker, only constructed by initialization from a `Config`.
pub struct MonoTracker<D, T> {
    config: Config,
    detector: D,
    tracker: T,
    admission: Admission,
    previous: Option<DMatrix<u8>>,
    landmarks: Vec<Landmark>,
}

/// Configuration of the monocular tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Camera intrinsic parameters.
    pub camera: Intrinsics,
    /// Maximum number of tracked landmarks.
    pub max_features: usize,
    /// Minimum distance (in pixels) between landmarks.
    pub feature_distance: Float,
}

impl Config {
    /// Validate the configuration and create a tracker without any landmark.
    pub fn init<D, T>(self, detector: D, tracker: T) -> Result<MonoTracker<D, T>, ConfigError>
    where
        D: Detector,
        T: PointTracker,
    {
        if !self.camera.is_valid() {
            return Err(ConfigError::Intrinsics);
        }
        if self.max_features == 0 {
            return Err(ConfigError::MaxFeatures);
        }
        Ok(MonoTracker {
            admission: Admission::new(self.max_features, self.feature_distance),
            config: self,
            detector,
            tracker,
            previous: None,
            landmarks: Vec::new(),
        })
    }
}

impl<D: Detector, T: PointTracker> MonoTracker<D, T> {
    /// Track the landmarks into a new gray image, then top them up with new detections.
    pub fn process_image(&mut self, image: &DMatrix<u8>) {
        if let Some(previous) = self.previous.as_ref() {
            let nb_before = self.landmarks.len();
            self.tracker
                .track(previous, image, &self.config.camera, &mut self.landmarks);
            debug!("Tracked {} / {} landmarks", self.landmarks.len(), nb_before);
        }
        self.previous = Some(image.clone());
        let new_landmarks =
            self.admission
                .admit(&mut self.detector, image, &self.config.camera, &self.landmarks);
        self.landmarks.extend(new_landmarks);
    }

    /// Restrict new detections to the pixels set in `mask`, for images of the same shape.
    pub fn set_mask(&mut self, mask: Option<DMatrix<bool>>) {
        self.admission.set_mask(mask);
    }

    /// Currently tracked landmarks.
    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }
}

// TESTS #############################################################
