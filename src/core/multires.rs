// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Multi-resolution image pyramids and border padding.

use nalgebra::{DMatrix, Scalar};

/// Recursively generate a pyramid of matrices where each level
/// is half the previous resolution, computed with the mean of each 2x2 block.
///
/// Level 0 is the given matrix. There are at most `nb_levels` levels,
/// less if the matrix becomes too small to be halved.
pub fn mean_pyramid(nb_levels: usize, mat: DMatrix<u8>) -> Vec<DMatrix<u8>> {
    limited_sequence(nb_levels, mat, |m| {
        halve(m, |a, b, c, d| {
            let a = u16::from(a);
            let b = u16::from(b);
            let c = u16::from(c);
            let d = u16::from(d);
            ((a + b + c + d) / 4) as u8
        })
    })
}

/// Recursively apply a function transforming the matrix
/// until it's not possible anymore or the max number of levels is reached.
/// Using `nb_levels = 0` has the same effect than `nb_levels = 1` since there is
/// always at least one matrix (the initial one).
pub fn limited_sequence<F, T>(nb_levels: usize, mat: DMatrix<T>, f: F) -> Vec<DMatrix<T>>
where
    F: Fn(&DMatrix<T>) -> Option<DMatrix<T>>,
    T: Scalar,
{
    let mut level = 1;
    let f_limited = |x: &DMatrix<T>| {
        if level < nb_levels {
            level += 1;
            f(x)
        } else {
            None
        }
    };
    sequence(mat, f_limited)
}

/// Recursively apply a function transforming the matrix
/// until it's not possible anymore.
pub fn sequence<F, T>(mat: DMatrix<T>, mut f: F) -> Vec<DMatrix<T>>
where
    F: FnMut(&DMatrix<T>) -> Option<DMatrix<T>>,
    T: Scalar,
{
    let mut pyr = Vec::new();
    let mut current = mat;
    while let Some(next) = f(&current) {
        pyr.push(current);
        current = next;
    }
    pyr.push(current);
    pyr
}

/// Halve the resolution of a matrix by applying a function to each 2x2 block.
/// If one size of the matrix is < 2 then this function returns None.
/// If one size is odd, its last line/column is dropped.
pub fn halve<F, T, U>(mat: &DMatrix<T>, f: F) -> Option<DMatrix<U>>
where
    F: Fn(T, T, T, T) -> U,
    T: Scalar + Copy,
    U: Scalar,
{
    let (r, c) = mat.shape();
    let half_r = r / 2;
    let half_c = c / 2;
    if half_r == 0 || half_c == 0 {
        None
    } else {
        let half_mat = DMatrix::<U>::from_fn(half_r, half_c, |i, j| {
            let a = mat[(2 * i, 2 * j)];
            let b = mat[(2 * i + 1, 2 * j)];
            let c = mat[(2 * i, 2 * j + 1)];
            let d = mat[(2 * i + 1, 2 * j + 1)];
            f(a, b, c, d)
        });
        Some(half_mat)
    }
}

/// Pad a matrix with `pad_rows` rows above and below
/// and `pad_cols` columns left and right, replicating the border values.
///
/// Pixel `(i, j)` of the input is at `(i + pad_rows, j + pad_cols)` in the output.
/// An empty matrix stays empty.
pub fn pad_replicate<T>(mat: &DMatrix<T>, pad_rows: usize, pad_cols: usize) -> DMatrix<T>
where
    T: Scalar + Copy,
{
    let (nrows, ncols) = mat.shape();
    if nrows == 0 || ncols == 0 {
        return mat.clone();
    }
    let clamp = |x: usize, pad: usize, size: usize| x.saturating_sub(pad).min(size - 1);
    DMatrix::from_fn(nrows + 2 * pad_rows, ncols + 2 * pad_cols, |i, j| {
        mat[(clamp(i, pad_rows, nrows), clamp(j, pad_cols, ncols))]
    })
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn pyramid_levels_halve() {
        let mat = DMatrix::<u8>::repeat(48, 64, 9);
        let pyr = mean_pyramid(4, mat);
        let shapes: Vec<_> = pyr.iter().map(|m| m.shape()).collect();
        assert_eq!(vec![(48, 64), (24, 32), (12, 16), (6, 8)], shapes);
        assert!(pyr.iter().all(|m| m.iter().all(|&x| x == 9)));
    }

    #[test]
    fn pyramid_stops_on_small_images() {
        let mat = DMatrix::<u8>::repeat(5, 3, 0);
        let pyr = mean_pyramid(6, mat);
        assert_eq!(2, pyr.len());
        assert_eq!((2, 1), pyr[1].shape());
    }

    #[test]
    fn zero_levels_keeps_original() {
        let mat = DMatrix::<u8>::repeat(8, 8, 1);
        assert_eq!(1, mean_pyramid(0, mat).len());
    }

    #[test]
    fn mean_of_block() {
        let mat = DMatrix::from_row_slice(2, 2, &[0_u8, 4, 8, 12]);
        let half = halve(&mat, |a: u8, b, c, d| (a + b + c + d) / 4);
        assert_eq!(Some(DMatrix::from_element(1, 1, 6_u8)), half);
    }

    #[test]
    fn padding_replicates_borders() {
        let mat = DMatrix::from_row_slice(2, 3, &[1_u8, 2, 3, 4, 5, 6]);
        let padded = pad_replicate(&mat, 1, 2);
        #[rustfmt::skip]
        let expected = DMatrix::from_row_slice(4, 7, &[
            1, 1, 1, 2, 3, 3, 3,
            1, 1, 1, 2, 3, 3, 3,
            4, 4, 4, 5, 6, 6, 6,
            4, 4, 4, 5, 6, 6, 6,
        ]);
        assert_eq!(expected, padded);
    }

    #[quickcheck_macros::quickcheck]
    fn padding_keeps_interior(values: Vec<u8>, pad: u8) -> bool {
        let pad = (pad % 8) as usize;
        let nrows = 3;
        let ncols = values.len() / nrows;
        if ncols == 0 {
            return true;
        }
        let mat = DMatrix::from_column_slice(nrows, ncols, &values[..nrows * ncols]);
        let padded = pad_replicate(&mat, pad, pad);
        padded.view((pad, pad), (nrows, ncols)) == mat
    }
}
