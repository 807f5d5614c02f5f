// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Bounded history stores.
//!
//! Correlation plots and ROI time series keep a rolling window of
//! `(x, y)` samples across trains. Both stores are interior-mutable and
//! mutex-guarded: the processor thread pushes, visualization readers take
//! point-in-time copies. Readers never observe mismatched `x`/`y` lengths.

use crate::{ModelError, ModelResult};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Identity of a history: where its x values come from and how finely they
/// are binned. Retained across clears.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryInfo {
    pub device_id: String,
    pub property: String,
    pub resolution: f64,
}

/// Rolling store of raw `(x, y)` pairs.
#[derive(Debug)]
pub struct PairData {
    inner: Mutex<PairInner>,
    info: HistoryInfo,
    max_len: usize,
}

#[derive(Debug, Default)]
struct PairInner {
    x: VecDeque<f64>,
    y: VecDeque<f64>,
}

impl PairData {
    /// Scatter plots get expensive past this many points.
    pub const MAX_LENGTH: usize = 3000;

    #[must_use]
    pub fn new(info: HistoryInfo) -> Self {
        Self::with_max_len(Self::MAX_LENGTH, info)
    }

    #[must_use]
    pub fn with_max_len(max_len: usize, info: HistoryInfo) -> Self {
        Self {
            inner: Mutex::new(PairInner::default()),
            info,
            max_len,
        }
    }

    #[must_use]
    pub fn info(&self) -> &HistoryInfo {
        &self.info
    }

    pub fn push(&self, x: f64, y: f64) {
        let mut inner = self.inner.lock();
        inner.x.push_back(x);
        inner.y.push_back(y);
        if inner.x.len() > self.max_len {
            inner.x.pop_front();
            inner.y.pop_front();
        }
    }

    /// Point-in-time copy of the stored pairs.
    #[must_use]
    pub fn snapshot(&self) -> (Vec<f64>, Vec<f64>, HistoryInfo) {
        let inner = self.inner.lock();
        (
            inner.x.iter().copied().collect(),
            inner.y.iter().copied().collect(),
            self.info.clone(),
        )
    }

    /// Drop the samples; the info record survives.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.x.clear();
        inner.y.clear();
    }
}

/// Per-bin statistics exposed by [`AccumulatedPairData`].
///
/// `min`/`max` do not carry literal extrema: they transport
/// `avg ∓ ½·stddev` so downstream error-bar plots get the dispersion
/// directly. `max - min` therefore equals the standard deviation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataStat {
    pub count: Vec<u64>,
    pub avg: Vec<f64>,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

#[derive(Debug, Clone)]
struct AccBin {
    x: f64,
    count: u64,
    avg: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl AccBin {
    fn open(x: f64, y: f64) -> Self {
        Self {
            x,
            count: 1,
            avg: y,
            m2: 0.0,
            min: y,
            max: y,
        }
    }

    fn fold(&mut self, x: f64, y: f64) {
        self.count += 1;
        let avg_prev = self.avg;
        self.avg += (y - self.avg) / self.count as f64;
        self.m2 += (y - avg_prev) * (y - self.avg);
        let half_std = 0.5 * (self.m2 / self.count as f64).sqrt();
        self.min = self.avg - half_std;
        self.max = self.avg + half_std;
        // the bin center drifts toward the mean of the folded x values
        self.x += (x - self.x) / self.count as f64;
    }
}

/// Rolling store of `(x, DataStat)` bins.
///
/// Samples whose `x` falls within `resolution` of the current bin center are
/// folded into a running mean (Welford update); a sample outside the window
/// finalizes the bin and opens a new one. A finalizing bin that collected
/// fewer than [`Self::MIN_COUNT`] samples is discarded, and an unfinished
/// trailing bin below that count is hidden from reads.
#[derive(Debug)]
pub struct AccumulatedPairData {
    inner: Mutex<VecDeque<AccBin>>,
    info: HistoryInfo,
    resolution: f64,
    max_len: usize,
}

impl AccumulatedPairData {
    pub const MAX_LENGTH: usize = 600;
    pub const MIN_COUNT: u64 = 2;
    const EPSILON: f64 = 1e-9;

    pub fn new(info: HistoryInfo) -> ModelResult<Self> {
        Self::with_max_len(Self::MAX_LENGTH, info)
    }

    pub fn with_max_len(max_len: usize, info: HistoryInfo) -> ModelResult<Self> {
        if info.resolution <= 0.0 {
            return Err(ModelError::NonPositiveResolution(info.resolution));
        }
        Ok(Self {
            inner: Mutex::new(VecDeque::new()),
            resolution: info.resolution,
            info,
            max_len,
        })
    }

    #[must_use]
    pub fn info(&self) -> &HistoryInfo {
        &self.info
    }

    pub fn push(&self, x: f64, y: f64) {
        let mut bins = self.inner.lock();
        match bins.back_mut() {
            Some(bin) if (x - bin.x).abs() - self.resolution < Self::EPSILON => {
                bin.fold(x, y);
            }
            Some(bin) => {
                if bin.count < Self::MIN_COUNT {
                    bins.pop_back();
                }
                bins.push_back(AccBin::open(x, y));
            }
            None => bins.push_back(AccBin::open(x, y)),
        }
        if bins.len() > self.max_len {
            bins.pop_front();
        }
    }

    /// Point-in-time copy; an under-populated trailing bin is omitted.
    #[must_use]
    pub fn snapshot(&self) -> (Vec<f64>, DataStat, HistoryInfo) {
        let bins = self.inner.lock();
        let visible = match bins.back() {
            Some(last) if last.count < Self::MIN_COUNT => bins.len() - 1,
            _ => bins.len(),
        };

        let mut x = Vec::with_capacity(visible);
        let mut stat = DataStat::default();
        for bin in bins.iter().take(visible) {
            x.push(bin.x);
            stat.count.push(bin.count);
            stat.avg.push(bin.avg);
            stat.min.push(bin.min);
            stat.max.push(bin.max);
        }
        (x, stat, self.info.clone())
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn info(resolution: f64) -> HistoryInfo {
        HistoryInfo {
            device_id: "motor".to_string(),
            property: "position".to_string(),
            resolution,
        }
    }

    #[test]
    fn pair_data_overflow_drops_oldest() {
        let hist = PairData::with_max_len(3, HistoryInfo::default());
        for i in 0..5 {
            hist.push(f64::from(i), f64::from(10 * i));
        }
        let (x, y, _) = hist.snapshot();
        assert_eq!(x, vec![2.0, 3.0, 4.0]);
        assert_eq!(y, vec![20.0, 30.0, 40.0]);
    }

    #[test]
    fn pair_data_clear_keeps_info() {
        let hist = PairData::new(info(0.0));
        hist.push(1.0, 2.0);
        hist.clear();
        let (x, y, kept) = hist.snapshot();
        assert!(x.is_empty() && y.is_empty());
        assert_eq!(kept.device_id, "motor");
    }

    #[test]
    fn accumulated_bins_fold_within_resolution() {
        let hist = AccumulatedPairData::new(info(0.1)).unwrap();
        hist.push(2.00, 0.4);
        // a single-sample bin is hidden from reads
        let (x, _, _) = hist.snapshot();
        assert!(x.is_empty());

        hist.push(2.02, 0.5);
        let (x, stat, _) = hist.snapshot();
        assert_relative_eq!(x[0], 2.01);
        assert_eq!(stat.count, vec![2]);
        assert_relative_eq!(stat.avg[0], 0.45);

        hist.push(2.11, 0.6);
        let (x, stat, _) = hist.snapshot();
        assert_relative_eq!(x[0], 2.01 + (2.11 - 2.01) / 3.0);
        assert_eq!(stat.count, vec![3]);
        assert_relative_eq!(stat.avg[0], 0.5);
    }

    #[test]
    fn dispersion_is_carried_in_the_min_max_slots() {
        let hist = AccumulatedPairData::new(info(0.5)).unwrap();
        for y in [1.0, 2.0, 3.0, 4.0] {
            hist.push(10.0, y);
        }
        let (_, stat, _) = hist.snapshot();
        // population stddev of [1, 2, 3, 4]
        let stddev = (5.0_f64 / 4.0).sqrt();
        assert_relative_eq!(stat.max[0] - stat.min[0], stddev, epsilon = 1e-12);
        assert_relative_eq!(
            (stat.max[0] + stat.min[0]) / 2.0,
            stat.avg[0],
            epsilon = 1e-12
        );
    }

    #[test]
    fn under_populated_bin_is_discarded_on_finalize() {
        let hist = AccumulatedPairData::new(info(0.1)).unwrap();
        hist.push(1.0, 5.0);
        // jumps far away before the first bin reaches MIN_COUNT
        hist.push(2.0, 6.0);
        hist.push(2.05, 7.0);
        let (x, stat, _) = hist.snapshot();
        assert_eq!(x.len(), 1);
        assert_eq!(stat.count, vec![2]);
        assert_relative_eq!(stat.avg[0], 6.5);
    }

    #[test]
    fn non_positive_resolution_is_rejected() {
        assert!(AccumulatedPairData::new(info(0.0)).is_err());
        assert!(AccumulatedPairData::new(info(-1.0)).is_err());
    }

    #[test]
    fn accumulated_overflow_is_bounded() {
        let hist = AccumulatedPairData::with_max_len(4, info(1.0)).unwrap();
        for i in 0..20 {
            // resolution 1.0 groups two consecutive integers per bin
            hist.push(f64::from(i), f64::from(i));
        }
        let (x, stat, _) = hist.snapshot();
        assert_eq!(x.len(), 4);
        assert_eq!(x.len(), stat.avg.len());
        assert_eq!(stat.count, vec![2, 2, 2, 2]);
        // the oldest bins were evicted: the newest kept bin is 18/19
        assert_relative_eq!(*x.last().unwrap(), 18.5);
    }
}
