// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helper function to compute gradients

use nalgebra::DMatrix;

use crate::misc::type_aliases::Float;

/// Horizontal gradient with the 3x3 Sobel kernel:
///
/// ```text
///   -1  0  1
///   -2  0  2
///   -1  0  1
/// ```
///
/// The response is divided by 8 to be in intensity units per pixel.
/// Borders are handled by replicating the edge pixels.
pub fn sobel_x(img: &DMatrix<u8>) -> DMatrix<Float> {
    let (nb_rows, nb_cols) = img.shape();
    if nb_rows == 0 || nb_cols == 0 {
        return DMatrix::zeros(nb_rows, nb_cols);
    }
    let at = |i: usize, j: usize| Float::from(img[(i, j)]);
    DMatrix::from_fn(nb_rows, nb_cols, |i, j| {
        let up = i.saturating_sub(1);
        let down = (i + 1).min(nb_rows - 1);
        let left = j.saturating_sub(1);
        let right = (j + 1).min(nb_cols - 1);
        let dx_up = at(up, right) - at(up, left);
        let dx_mid = at(i, right) - at(i, left);
        let dx_down = at(down, right) - at(down, left);
        (dx_up + 2.0 * dx_mid + dx_down) / 8.0
    })
}

// TESTS #############################################################
