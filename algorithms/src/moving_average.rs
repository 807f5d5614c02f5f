// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! In-place moving-average kernels.
//!
//! The accumulator update is `avg += (new - avg) / count` per element, fused
//! into a single pass so no intermediate array is allocated per train. The
//! caller owns the `count` bookkeeping (see the moving-average types in the
//! data model).

use crate::Pixel;
use ndarray::{Array2, Array3, ArrayView2, ArrayView3};

/// Fold a new image into a 2-D running average.
///
/// `count` is the number of samples including the new one; must be >= 1 and
/// the shapes must match (checked by the caller).
pub fn moving_average_image(avg: &mut Array2<Pixel>, new: &ArrayView2<'_, Pixel>, count: u32) {
    debug_assert!(count >= 1);
    debug_assert_eq!(avg.dim(), new.dim());
    let inv = 1.0 / count as Pixel;
    ndarray::Zip::from(avg).and(new).par_for_each(|a, &n| {
        *a += (n - *a) * inv;
    });
}

/// Fold a new pulse stack into a 3-D running average.
pub fn moving_average_image_stack(
    avg: &mut Array3<Pixel>,
    new: &ArrayView3<'_, Pixel>,
    count: u32,
) {
    debug_assert!(count >= 1);
    debug_assert_eq!(avg.dim(), new.dim());
    let inv = 1.0 / count as Pixel;
    ndarray::Zip::from(avg).and(new).par_for_each(|a, &n| {
        *a += (n - *a) * inv;
    });
}
