// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! NaN-aware reductions over pulse stacks.

use crate::Pixel;
use ndarray::{Array2, ArrayView2, ArrayView3, Axis, Zip};

/// Per-pixel mean over the pulse axis of a 3-D stack, ignoring NaN entries.
///
/// A pixel that is NaN in every selected pulse stays NaN in the output.
#[must_use]
pub fn nanmean_stack(stack: &ArrayView3<'_, Pixel>) -> Array2<Pixel> {
    let indices: Vec<usize> = (0..stack.len_of(Axis(0))).collect();
    nanmean_stack_sliced(stack, &indices)
}

/// Like [`nanmean_stack`] but restricted to the given pulse indices.
///
/// Indices outside `[0, n_pulses)` are ignored. An empty selection yields an
/// all-NaN image.
#[must_use]
pub fn nanmean_stack_sliced(stack: &ArrayView3<'_, Pixel>, indices: &[usize]) -> Array2<Pixel> {
    let n_pulses = stack.len_of(Axis(0));
    let shape = (stack.len_of(Axis(1)), stack.len_of(Axis(2)));

    let mut sum = Array2::<f64>::zeros(shape);
    let mut count = Array2::<u32>::zeros(shape);

    for &i in indices.iter().filter(|&&i| i < n_pulses) {
        let plane = stack.index_axis(Axis(0), i);
        Zip::from(&mut sum)
            .and(&mut count)
            .and(&plane)
            .par_for_each(|s, c, &v| {
                if !v.is_nan() {
                    *s += f64::from(v);
                    *c += 1;
                }
            });
    }

    let mut mean = Array2::<Pixel>::zeros(shape);
    Zip::from(&mut mean)
        .and(&sum)
        .and(&count)
        .par_for_each(|m, &s, &c| {
            *m = if c == 0 {
                Pixel::NAN
            } else {
                (s / f64::from(c)) as Pixel
            };
        });
    mean
}

/// NaN-aware mean of a single image, used for scalar figures of merit.
#[must_use]
pub fn nanmean_image(image: &ArrayView2<'_, Pixel>) -> f64 {
    let (sum, count) = image.iter().fold((0.0_f64, 0_u64), |(s, c), &v| {
        if v.is_nan() {
            (s, c)
        } else {
            (s + f64::from(v), c + 1)
        }
    });
    if count == 0 { f64::NAN } else { sum / count as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn stack_mean_ignores_nan() {
        let stack = array![
            [[1.0_f32, 2.0], [3.0, Pixel::NAN]],
            [[3.0, Pixel::NAN], [5.0, Pixel::NAN]],
        ];
        let mean = nanmean_stack(&stack.view());
        assert_eq!(mean[[0, 0]], 2.0);
        assert_eq!(mean[[0, 1]], 2.0);
        assert_eq!(mean[[1, 0]], 4.0);
        assert!(mean[[1, 1]].is_nan());
    }

    #[test]
    fn sliced_mean_uses_only_selected_pulses() {
        let stack = array![[[0.0_f32]], [[10.0]], [[20.0]]];
        let mean = nanmean_stack_sliced(&stack.view(), &[0, 2]);
        assert_eq!(mean[[0, 0]], 10.0);
        // out-of-range indices are skipped rather than an error
        let mean = nanmean_stack_sliced(&stack.view(), &[2, 7]);
        assert_eq!(mean[[0, 0]], 20.0);
    }

    #[test]
    fn image_mean_of_all_nan_is_nan() {
        let img = array![[Pixel::NAN, Pixel::NAN]];
        assert!(nanmean_image(&img.view()).is_nan());
    }
}
