// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! 1-D curve helpers: range slicing, trapezoidal integration and AUC
//! normalization.

use crate::{AlgorithmError, AlgorithmResult};
use ndarray::{Array1, ArrayView1};

/// Restrict `(y, x)` to the samples whose `x` lies in `[x_min, x_max]`.
///
/// `x` is assumed sorted ascending. Unset bounds are passed as infinities.
#[must_use]
pub fn slice_curve(
    y: &ArrayView1<'_, f64>,
    x: &ArrayView1<'_, f64>,
    x_min: f64,
    x_max: f64,
) -> (Array1<f64>, Array1<f64>) {
    let lo = x.iter().position(|&v| v >= x_min).unwrap_or(x.len());
    let hi = x.iter().rposition(|&v| v <= x_max).map_or(lo, |i| i + 1);
    let hi = hi.max(lo);
    (
        y.slice(ndarray::s![lo..hi]).to_owned(),
        x.slice(ndarray::s![lo..hi]).to_owned(),
    )
}

/// Trapezoidal integral of `y` over `x`.
#[must_use]
pub fn trapz(y: &ArrayView1<'_, f64>, x: &ArrayView1<'_, f64>) -> f64 {
    debug_assert_eq!(y.len(), x.len());
    if y.len() < 2 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 1..y.len() {
        acc += 0.5 * (y[i] + y[i - 1]) * (x[i] - x[i - 1]);
    }
    acc
}

/// Normalize `y` by its integral over `[x_min, x_max]`.
///
/// An all-zero curve is returned unchanged; a zero integral over a non-zero
/// curve is an error since the caller cannot divide by it.
pub fn normalize_auc(
    y: &ArrayView1<'_, f64>,
    x: &ArrayView1<'_, f64>,
    x_min: f64,
    x_max: f64,
) -> AlgorithmResult<Array1<f64>> {
    if y.iter().all(|&v| v == 0.0) {
        return Ok(y.to_owned());
    }

    let (ys, xs) = slice_curve(y, x, x_min, x_max);
    let integral = trapz(&ys.view(), &xs.view());
    if integral == 0.0 {
        return Err(AlgorithmError::ZeroIntegral);
    }
    Ok(y.mapv(|v| v / integral))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn slice_keeps_inclusive_window() {
        let x = array![0.0, 1.0, 2.0, 3.0, 4.0];
        let y = array![10.0, 11.0, 12.0, 13.0, 14.0];
        let (ys, xs) = slice_curve(&y.view(), &x.view(), 1.0, 3.0);
        assert_eq!(xs, array![1.0, 2.0, 3.0]);
        assert_eq!(ys, array![11.0, 12.0, 13.0]);
    }

    #[test]
    fn trapz_of_a_line() {
        let x = array![0.0, 1.0, 2.0];
        let y = array![0.0, 1.0, 2.0];
        assert_relative_eq!(trapz(&y.view(), &x.view()), 2.0);
    }

    #[test]
    fn normalize_auc_divides_by_the_window_integral() {
        let x = array![0.0, 1.0, 2.0];
        let y = array![2.0, 2.0, 2.0];
        let normalized = normalize_auc(&y.view(), &x.view(), 0.0, 2.0).unwrap();
        assert_relative_eq!(normalized[0], 0.5);
    }

    #[test]
    fn all_zero_curve_passes_through() {
        let x = array![0.0, 1.0];
        let y = array![0.0, 0.0];
        assert_eq!(
            normalize_auc(&y.view(), &x.view(), 0.0, 1.0).unwrap(),
            array![0.0, 0.0]
        );
    }

    #[test]
    fn zero_integral_is_an_error() {
        let x = array![0.0, 1.0, 2.0];
        let y = array![-1.0, 0.0, 1.0];
        assert_eq!(
            normalize_auc(&y.view(), &x.view(), 0.0, 2.0),
            Err(AlgorithmError::ZeroIntegral)
        );
    }
}
