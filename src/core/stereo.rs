// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Sub-pixel horizontal correspondences between rectified stereo images.
//!
//! For each left point, a single horizontal offset is searched such that
//! the right patch at `(x + offset, y)` matches the left patch at `(x, y)`.
//! The search is a Gauss-Newton iteration on the offset,
//! run coarse to fine on mean pyramids of both images.
//! The offset found at one level is doubled to initialize the next finer level.

use log::{debug, trace};
use nalgebra::{DMatrix, DVector, Scalar};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::{gradient, multires, track::ConfigError};
use crate::misc::type_aliases::{Float, Point2};

/// Squared gradient norm of a patch below which it is considered textureless.
const TEXTURELESS_ENERGY: Float = 1e-12;

/// Configuration of the stereo correspondence search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Width of the matched patches, odd.
    pub window_width: usize,
    /// Height of the matched patches, odd.
    pub window_height: usize,
    /// Coarsest pyramid level, there are `max_level + 1` levels.
    pub max_level: usize,
    /// Offset correction (in pixels of the current level) under which a point has converged.
    pub step_threshold: Float,
    /// Maximum number of Gauss-Newton iterations per point and per level.
    /// When reached, the current offset is kept as the converged one.
    pub max_iterations: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_width: 21,
            window_height: 21,
            max_level: 3,
            step_threshold: 1e-3,
            max_iterations: 100,
        }
    }
}

impl Config {
    /// Check that the patch window has odd sides of at least 3 pixels.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_side = |side: usize| side >= 3 && side % 2 == 1;
        if valid_side(self.window_width) && valid_side(self.window_height) {
            Ok(())
        } else {
            Err(ConfigError::WindowSize {
                width: self.window_width,
                height: self.window_height,
            })
        }
    }
}

/// One level of the stereo pyramids, padded by half a window on each side.
struct Level {
    left: DMatrix<u8>,
    right: DMatrix<u8>,
    gradient_x: DMatrix<Float>,
    /// Size of a pixel of this level in full resolution pixels.
    scale: Float,
}

/// Find the right image correspondence of each left image point.
///
/// Returns one entry per input point, in the same order.
/// `None` marks points whose patch left the image bounds at some level.
/// Reaching the iteration budget at a level keeps the current offset.
/// Converged points have a non-negative offset: `right.x >= left.x` and `right.y == left.y`.
pub fn match_points(
    config: &Config,
    left: &DMatrix<u8>,
    right: &DMatrix<u8>,
    points: &[Point2],
) -> Vec<Option<Point2>> {
    if points.is_empty() {
        return Vec::new();
    }
    let levels = build_levels(config, left, right);
    let matches: Vec<_> = points
        .par_iter()
        .map(|point| refine_point(config, &levels, point))
        .collect();
    debug!(
        "Stereo matching: {} / {} points converged",
        matches.iter().filter(|m| m.is_some()).count(),
        points.len()
    );
    matches
}

/// Build the padded pyramids, finest level first.
fn build_levels(config: &Config, left: &DMatrix<u8>, right: &DMatrix<u8>) -> Vec<Level> {
    let nb_levels = config.max_level + 1;
    let pad_cols = config.window_width / 2;
    let pad_rows = config.window_height / 2;
    let left_pyramid = multires::mean_pyramid(nb_levels, left.clone());
    let right_pyramid = multires::mean_pyramid(nb_levels, right.clone());
    let mut scale = 1.0;
    left_pyramid
        .iter()
        .zip(right_pyramid.iter())
        .map(|(l, r)| {
            let left = multires::pad_replicate(l, pad_rows, pad_cols);
            let level = Level {
                gradient_x: gradient::sobel_x(&left),
                right: multires::pad_replicate(r, pad_rows, pad_cols),
                left,
                scale,
            };
            scale *= 2.0;
            level
        })
        .collect()
}

/// Coarse to fine offset search for one point.
fn refine_point(config: &Config, levels: &[Level], point: &Point2) -> Option<Point2> {
    let mut offset = 0.0;
    for (lvl, level) in levels.iter().enumerate().rev() {
        let x = point.x / level.scale;
        let y = point.y / level.scale;
        // With a padding of half a window, the patch centered on (x, y)
        // has its top left corner at (x, y) in padded coordinates.
        offset = match refine_offset(config, level, x, y, offset) {
            Some(converged) => converged,
            None => {
                trace!("Stereo point ({}, {}) lost at level {}", point.x, point.y, lvl);
                return None;
            }
        };
        if lvl > 0 {
            offset *= 2.0;
        }
    }
    Some(Point2::new(point.x + offset.max(0.0), point.y))
}

/// Gauss-Newton iterations on the horizontal offset at one level.
fn refine_offset(config: &Config, level: &Level, x: Float, y: Float, offset: Float) -> Option<Float> {
    let (w, h) = (config.window_width, config.window_height);
    if !in_bounds(level.left.shape(), w, h, x, y) {
        return None;
    }
    let left_patch = sample_patch(&level.left, x, y, w, h);
    let gradient_patch = sample_patch(&level.gradient_x, x, y, w, h);
    let energy = gradient_patch.norm_squared();
    let jacobian_pinv = if energy > TEXTURELESS_ENERGY {
        gradient_patch / energy
    } else {
        DVector::zeros(w * h)
    };

    let mut offset = offset;
    for _ in 0..config.max_iterations {
        if !in_bounds(level.right.shape(), w, h, x + offset, y) {
            return None;
        }
        let right_patch = sample_patch(&level.right, x + offset, y, w, h);
        let step = -jacobian_pinv.dot(&(right_patch - &left_patch));
        offset += step;
        if step.abs() < config.step_threshold {
            return Some(offset);
        }
    }
    trace!("Stereo iteration budget reached at ({}, {})", x, y);
    Some(offset)
}

/// A `w x h` patch with top left corner at `(x, y)` can be bilinearly sampled.
/// NaN coordinates are out of bounds.
#[allow(clippy::cast_precision_loss)]
fn in_bounds(shape: (usize, usize), w: usize, h: usize, x: Float, y: Float) -> bool {
    let (nb_rows, nb_cols) = shape;
    let max_x = nb_cols as Float - w as Float - 1.0;
    let max_y = nb_rows as Float - h as Float - 1.0;
    x >= 0.0 && x < max_x && y >= 0.0 && y < max_y
}

/// Bilinear samples of a `w x h` patch, in column major order.
/// The patch must be in bounds.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn sample_patch<T>(image: &DMatrix<T>, x: Float, y: Float, w: usize, h: usize) -> DVector<Float>
where
    T: Scalar + Copy + Into<Float>,
{
    let u = x.floor();
    let v = y.floor();
    let a = x - u;
    let b = y - v;
    let (u, v) = (u as usize, v as usize);
    DVector::from_iterator(
        w * h,
        (0..w).flat_map(|j| (0..h).map(move |i| (v + i, u + j))).map(|(row, col)| {
            let vu_00: Float = image[(row, col)].into();
            let vu_10: Float = image[(row + 1, col)].into();
            let vu_01: Float = image[(row, col + 1)].into();
            let vu_11: Float = image[(row + 1, col + 1)].into();
            (1.0 - b) * (1.0 - a) * vu_00
                + b * (1.0 - a) * vu_10
                + (1.0 - b) * a * vu_01
                + b * a * vu_11
        }),
    )
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;

    const WIDTH: usize = 160;
    const HEIGHT: usize = 120;

    fn texture(x: Float, y: Float) -> Float {
        128.0 + 50.0 * (x / 9.0 + y / 13.0).sin() + 30.0 * (x / 7.0 - y / 17.0).cos()
    }

    /// Image whose content is the texture shifted right by `shift` pixels.
    fn shifted_image(shift: Float) -> DMatrix<u8> {
        DMatrix::from_fn(HEIGHT, WIDTH, |i, j| {
            texture(j as Float - shift, i as Float).round() as u8
        })
    }

    fn config() -> Config {
        Config {
            window_width: 15,
            window_height: 15,
            max_level: 2,
            ..Config::default()
        }
    }

    #[test]
    fn recovers_subpixel_shift() {
        let left = shifted_image(0.0);
        let right = shifted_image(2.6);
        let point = Point2::new(80.0, 60.0);
        let matches = match_points(&config(), &left, &right, &[point]);
        let matched = matches[0].expect("point should converge");
        approx::assert_abs_diff_eq!(matched.x - point.x, 2.6, epsilon = 0.05);
        assert_eq!(point.y, matched.y);
    }

    #[test]
    fn identical_images_give_zero_offset() {
        let img = shifted_image(0.0);
        let points = [Point2::new(40.0, 30.0), Point2::new(100.0, 70.0)];
        for (point, matched) in points.iter().zip(match_points(&config(), &img, &img, &points)) {
            let matched = matched.expect("point should converge");
            approx::assert_abs_diff_eq!(matched.x, point.x, epsilon = 1e-3);
        }
    }

    #[test]
    fn negative_offsets_are_clamped() {
        let left = shifted_image(0.0);
        let right = shifted_image(-2.6);
        let point = Point2::new(80.0, 60.0);
        let matched = match_points(&config(), &left, &right, &[point])[0];
        assert_eq!(Some(point), matched);
    }

    #[test]
    fn points_near_the_border_are_dropped() {
        let img = shifted_image(0.0);
        let points = [Point2::new(159.0, 60.0), Point2::new(80.0, 60.0)];
        let matches = match_points(&config(), &img, &img, &points);
        assert_eq!(2, matches.len());
        assert_eq!(None, matches[0]);
        assert!(matches[1].is_some());
    }

    #[test]
    fn iteration_budget_keeps_the_point() {
        // A null threshold is never reached, every level stops on the budget.
        let config = Config {
            step_threshold: 0.0,
            max_iterations: 1,
            ..config()
        };
        let left = shifted_image(0.0);
        let point = Point2::new(80.0, 60.0);
        let same = match_points(&config, &left, &left, &[point]);
        assert_eq!(vec![Some(point)], same);

        let right = shifted_image(2.6);
        let matched = match_points(&config, &left, &right, &[point])[0].expect("budget reached");
        assert_eq!(point.y, matched.y);
        assert!(matched.x >= point.x);
    }

    #[test]
    fn no_points_no_matches() {
        let img = shifted_image(0.0);
        assert!(match_points(&config(), &img, &img, &[]).is_empty());
    }

    #[test]
    fn textureless_patches_keep_their_offset() {
        let flat = DMatrix::repeat(HEIGHT, WIDTH, 100_u8);
        let point = Point2::new(80.0, 60.0);
        assert_eq!(vec![Some(point)], match_points(&config(), &flat, &flat, &[point]));
    }

    #[test]
    fn window_must_be_odd() {
        assert!(Config::default().validate().is_ok());
        let even = Config {
            window_width: 20,
            ..Config::default()
        };
        match even.validate() {
            Err(ConfigError::WindowSize { width, height }) => assert_eq!((20, 21), (width, height)),
            other => panic!("unexpected validation result: {:?}", other),
        }
    }

    #[test]
    fn patch_sampling_interpolates() {
        let img = DMatrix::from_fn(4, 4, |i, j| (10 * j + i) as u8);
        let patch = sample_patch(&img, 1.5, 0.25, 2, 2);
        approx::assert_relative_eq!(patch[0], 15.25, epsilon = 1e-12);
        approx::assert_relative_eq!(patch[1], 16.25, epsilon = 1e-12);
        approx::assert_relative_eq!(patch[2], 25.25, epsilon = 1e-12);
        assert!(!in_bounds(img.shape(), 2, 2, 1.5, 0.25));
        assert!(in_bounds(img.shape(), 2, 2, 0.5, 0.25));
    }
}
