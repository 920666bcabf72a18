// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Interoperability conversions between the image and matrix types.

use std::path::Path;

use image::{DynamicImage, GrayImage, Luma};
use nalgebra::DMatrix;

/// Convert an `u8` matrix into a `GrayImage`.
/// Inverse operation of `matrix_from_image`.
///
/// Performs a transposition to accomodate for the
/// column major matrix into the row major image.
#[allow(clippy::cast_possible_truncation)]
pub fn image_from_matrix(mat: &DMatrix<u8>) -> GrayImage {
    let (nb_rows, nb_cols) = mat.shape();
    let mut img_buf = GrayImage::new(nb_cols as u32, nb_rows as u32);
    for (x, y, pixel) in img_buf.enumerate_pixels_mut() {
        *pixel = Luma([mat[(y as usize, x as usize)]]);
    }
    img_buf
}

/// Convert a `GrayImage` into an `u8` matrix.
/// Inverse operation of `image_from_matrix`.
pub fn matrix_from_image(img: GrayImage) -> DMatrix<u8> {
    let (width, height) = img.dimensions();
    DMatrix::from_row_slice(height as usize, width as usize, &img.into_raw())
}

/// Gray matrix of any decoded image, color images are converted to luma.
pub fn gray_matrix(img: &DynamicImage) -> DMatrix<u8> {
    matrix_from_image(img.to_luma8())
}

/// Read an image file (any format supported by the `image` crate) as a gray matrix.
pub fn read_gray<P: AsRef<Path>>(path: P) -> Result<DMatrix<u8>, image::ImageError> {
    Ok(gray_matrix(&image::open(path)?))
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn rows_are_image_lines() {
        let mut img = GrayImage::new(3, 2);
        img.put_pixel(2, 0, Luma([42]));
        let mat = matrix_from_image(img.clone());
        assert_eq!((2, 3), mat.shape());
        assert_eq!(42, mat[(0, 2)]);
        assert_eq!(img, image_from_matrix(&mat));
    }

    #[test]
    fn color_images_become_gray() {
        let mut img = RgbImage::new(4, 2);
        img.put_pixel(1, 1, Rgb([200, 200, 200]));
        let mat = gray_matrix(&DynamicImage::ImageRgb8(img));
        assert_eq!((2, 4), mat.shape());
        assert_eq!(200, mat[(1, 1)]);
        assert_eq!(0, mat[(0, 0)]);
    }
}
