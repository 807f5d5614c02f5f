// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Fixed-range 1-D histogramming and bin assignment.

use crate::{AlgorithmError, AlgorithmResult};
use ndarray::Array1;

/// Evenly spaced bin edges over `[lo, hi]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BinEdges {
    lo: f64,
    width: f64,
    n_bins: usize,
}

impl BinEdges {
    pub fn new(lo: f64, hi: f64, n_bins: usize) -> AlgorithmResult<Self> {
        if !(hi > lo) || n_bins == 0 {
            return Err(AlgorithmError::InvalidRange(lo, hi));
        }
        Ok(Self {
            lo,
            width: (hi - lo) / n_bins as f64,
            n_bins,
        })
    }

    #[must_use]
    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// Bin index for a value, or `None` when the value is NaN or outside the
    /// range. The upper edge is inclusive into the last bin.
    #[must_use]
    pub fn index(&self, v: f64) -> Option<usize> {
        if v.is_nan() {
            return None;
        }
        let hi = self.lo + self.width * self.n_bins as f64;
        if v < self.lo || v > hi {
            return None;
        }
        let idx = ((v - self.lo) / self.width) as usize;
        Some(idx.min(self.n_bins - 1))
    }

    /// Bin centers, in order.
    #[must_use]
    pub fn centers(&self) -> Array1<f64> {
        Array1::from_iter((0..self.n_bins).map(|i| self.lo + self.width * (i as f64 + 0.5)))
    }
}

/// Histogram of `values` over `n_bins` bins spanning `[lo, hi]`.
///
/// NaN and out-of-range samples are dropped. Returns `(centers, counts)`.
pub fn histogram1d(
    values: impl IntoIterator<Item = f64>,
    lo: f64,
    hi: f64,
    n_bins: usize,
) -> AlgorithmResult<(Array1<f64>, Array1<u64>)> {
    let edges = BinEdges::new(lo, hi, n_bins)?;
    let mut counts = Array1::<u64>::zeros(n_bins);
    for v in values {
        if let Some(i) = edges.index(v) {
            counts[i] += 1;
        }
    }
    Ok((edges.centers(), counts))
}
