// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Landmark tracking across frames.
//!
//! Detection of new points and frame to frame tracking of existing points
//! are provided by the caller through the `Detector` and `PointTracker` traits.
//! This module owns what is common to the monocular and stereo trackers:
//! identity assignment, occupancy masks and the feature budget.

pub mod mono;
pub mod stereo;

use log::debug;
use nalgebra::DMatrix;
use thiserror::Error;

use crate::core::camera::Intrinsics;
use crate::core::landmark::{Landmark, LandmarkId};
use crate::misc::type_aliases::{Float, Point2};

/// Fatal configuration problems, detected once at tracker initialization.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Stereo window sides must be odd and at least 3 pixels.
    #[error("invalid stereo window {width}x{height}, sides must be odd and >= 3")]
    WindowSize {
        /// Requested window width.
        width: usize,
        /// Requested window height.
        height: usize,
    },
    /// Missing calibration.
    #[error("camera intrinsics are missing or degenerate")]
    Intrinsics,
    /// A tracker needs to be allowed at least one feature.
    #[error("the feature budget must be at least 1")]
    MaxFeatures,
    /// Configuration file content is not valid.
    #[error("invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),
    /// Configuration file could not be read.
    #[error("cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),
}

/// Proposes new points to track in an image.
pub trait Detector {
    /// Detect points in `image`.
    ///
    /// `mask` has the shape of the image.
    /// Pixels set to `false` are occupied and should not receive new points.
    fn detect(&mut self, image: &DMatrix<u8>, mask: &DMatrix<bool>) -> Vec<Point2>;
}

/// Moves existing landmarks from one frame to the next.
pub trait PointTracker {
    /// Track `landmarks` from `previous` to `current`.
    ///
    /// Implementors update each found landmark with `Landmark::advance`
    /// (normalizing with `camera`) and remove lost ones,
    /// preserving the relative order of the survivors.
    fn track(
        &mut self,
        previous: &DMatrix<u8>,
        current: &DMatrix<u8>,
        camera: &Intrinsics,
        landmarks: &mut Vec<Landmark>,
    );
}

/// Admission of newly detected points as landmarks.
///
/// Owns the identity counter, so identities are never reused
/// for the lifetime of a tracker.
#[derive(Debug, Clone)]
pub(crate) struct Admission {
    max_features: usize,
    feature_distance: Float,
    mask: Option<DMatrix<bool>>,
    next_id: u64,
}

impl Admission {
    pub(crate) fn new(max_features: usize, feature_distance: Float) -> Self {
        Self {
            max_features,
            feature_distance,
            mask: None,
            next_id: 0,
        }
    }

    /// Static mask combined with the occupancy of existing landmarks.
    pub(crate) fn set_mask(&mut self, mask: Option<DMatrix<bool>>) {
        self.mask = mask;
    }

    /// Detect and create new landmarks, within the feature budget.
    pub(crate) fn admit<D: Detector>(
        &mut self,
        detector: &mut D,
        image: &DMatrix<u8>,
        camera: &Intrinsics,
        existing: &[Landmark],
    ) -> Vec<Landmark> {
        let budget = self.max_features.saturating_sub(existing.len());
        if budget == 0 {
            return Vec::new();
        }
        let base = self.mask.as_ref().filter(|m| m.shape() == image.shape());
        let mask = occupancy_mask(
            image.shape(),
            base,
            existing.iter().filter_map(Landmark::primary),
            self.feature_distance,
        );
        let proposed = detector.detect(image, &mask);
        let nb_proposed = proposed.len();
        let mut accepted = remove_duplicates(proposed, &mask, self.feature_distance);
        accepted.truncate(budget);
        debug!(
            "Admitting {} new landmarks out of {} detections",
            accepted.len(),
            nb_proposed
        );
        accepted
            .into_iter()
            .map(|raw| Landmark::new(self.next_id(), raw, camera.normalize(raw)))
            .collect()
    }

    fn next_id(&mut self) -> LandmarkId {
        let id = LandmarkId(self.next_id);
        self.next_id += 1;
        id
    }
}

/// Mask of the pixels free to receive new points.
///
/// Starts from `base` (or everything free) and marks as occupied
/// every pixel closer than `radius` to one of the `points`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn occupancy_mask<I>(
    shape: (usize, usize),
    base: Option<&DMatrix<bool>>,
    points: I,
    radius: Float,
) -> DMatrix<bool>
where
    I: IntoIterator<Item = Point2>,
{
    let (nb_rows, nb_cols) = shape;
    let mut mask = match base {
        Some(m) => m.clone(),
        None => DMatrix::repeat(nb_rows, nb_cols, true),
    };
    if nb_rows == 0 || nb_cols == 0 {
        return mask;
    }
    let radius = radius.max(0.0);
    let squared_radius = radius * radius;
    let clamp = |v: Float, size: usize| v.max(0.0).min((size - 1) as Float) as usize;
    for p in points.into_iter().filter(|p| p.x.is_finite() && p.y.is_finite()) {
        let (row_min, row_max) = (clamp(p.y - radius, nb_rows), clamp(p.y + radius, nb_rows));
        let (col_min, col_max) = (clamp(p.x - radius, nb_cols), clamp(p.x + radius, nb_cols));
        for col in col_min..=col_max {
            for row in row_min..=row_max {
                let dx = col as Float - p.x;
                let dy = row as Float - p.y;
                if dx * dx + dy * dy <= squared_radius {
                    mask[(row, col)] = false;
                }
            }
        }
    }
    mask
}

/// Keep proposed points lying on free pixels of the mask
/// and at least `min_distance` away from previously kept points.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn remove_duplicates(proposed: Vec<Point2>, mask: &DMatrix<bool>, min_distance: Float) -> Vec<Point2> {
    let (nb_rows, nb_cols) = mask.shape();
    let is_free = |p: &Point2| {
        let (x, y) = (p.x.round(), p.y.round());
        x >= 0.0
            && y >= 0.0
            && x < nb_cols as Float
            && y < nb_rows as Float
            && mask[(y as usize, x as usize)]
    };
    let squared_distance = min_distance * min_distance;
    let mut kept: Vec<Point2> = Vec::with_capacity(proposed.len());
    for p in proposed.into_iter().filter(is_free) {
        if kept.iter().all(|q| (p - q).norm_squared() >= squared_distance) {
            kept.push(p);
        }
    }
    kept
}

// TESTS #############################################################
