// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Binning aggregates published per train.

use ndarray::{Array1, Array2};

/// One 1-D binning axis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bin1dData {
    /// Bin centers.
    pub centers: Option<Array1<f64>>,
    /// Axis label (`device_id`/`property` of the slow source).
    pub label: String,

    /// Average FOM per bin.
    pub fom_hist: Option<Array1<f64>>,
    /// Sample count per bin.
    pub count_hist: Option<Array1<u64>>,
    /// Average VFOM per bin, one row per bin.
    pub vfom_heat: Option<Array2<f64>>,

    pub has_vfom: bool,
    /// x coordinate of the VFOM rows.
    pub x: Option<Array1<f64>>,
    pub x_label: String,
    pub vfom_label: String,

    /// Set when this train landed in a bin, so consumers redraw lazily.
    pub updated: bool,
}

/// The 2-D aggregate over both axes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bin2dData {
    pub center_x: Option<Array1<f64>>,
    pub center_y: Option<Array1<f64>>,
    pub x_label: String,
    pub y_label: String,

    /// Average FOM per (y, x) cell.
    pub fom_heat: Option<Array2<f64>>,
    pub count_heat: Option<Array2<u64>>,

    pub updated: bool,
}

/// Binning results for one train.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BinData {
    pub bin1: Bin1dData,
    pub bin2: Bin1dData,
    /// bin1 supplies x, bin2 supplies y.
    pub bin12: Bin2dData,
}
