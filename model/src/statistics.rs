// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Histogram statistics published per train.

use ndarray::Array1;

/// FOM histograms: per-train over pulse FOMs, per-POI across trains.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatisticsData {
    /// Pulse-resolved FOMs of the current train.
    pub fom_hist: Option<Array1<f64>>,
    /// Histogram bin centers for the FOM distribution.
    pub fom_bin_center: Option<Array1<f64>>,
    /// Histogram counts for the FOM distribution.
    pub fom_count: Option<Array1<u64>>,

    /// Across-train histograms for the two pulses of interest.
    pub poi_fom_bin_center: [Option<Array1<f64>>; 2],
    pub poi_fom_count: [Option<Array1<u64>>; 2],
}
