// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Train-resolved data items.

use ndarray::Array1;

/// One derived quantity: a scalar FOM with an optional vector FOM.
///
/// Per-train FOM history is never kept on the item itself; the bounded
/// history stores do that, because keeping it here would grow without bound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataItem {
    /// x coordinate of the VFOM.
    pub x: Option<Array1<f64>>,
    /// Vector figure of merit.
    pub vfom: Option<Array1<f64>>,
    /// Scalar figure of merit.
    pub fom: Option<f64>,
    pub x_label: String,
    pub vfom_label: String,
    /// When false, `x` and `vfom` stay empty.
    pub has_vfom: bool,
}

impl DataItem {
    /// A scalar-only item.
    #[must_use]
    pub fn scalar() -> Self {
        Self {
            has_vfom: false,
            ..Self::default()
        }
    }

    /// An item carrying a vector FOM with labeled axes.
    #[must_use]
    pub fn vector(x_label: impl Into<String>, vfom_label: impl Into<String>) -> Self {
        Self {
            x_label: x_label.into(),
            vfom_label: vfom_label.into(),
            has_vfom: true,
            ..Self::default()
        }
    }
}

/// Azimuthal-integration result for one train.
#[must_use]
pub fn azimuthal_item() -> DataItem {
    DataItem::vector("Momentum transfer (1/A)", "Scattering signal (arb.u.)")
}

/// Train-level beam-intensity readings.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct XgmItem {
    /// FEL intensity.
    pub intensity: Option<f64>,
    /// Beam x position.
    pub x: Option<f64>,
    /// Beam y position.
    pub y: Option<f64>,
}

/// XGM readings plus their pump/probe split.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct XgmData {
    pub item: XgmItem,
    pub on: XgmItem,
    pub off: XgmItem,
}

/// Per-pulse slices filled only for pulse-resolved analyses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PulseData {
    /// Per-pulse azimuthal-integration FOMs.
    pub ai_fom: Option<Array1<f64>>,
    /// Per-pulse ROI1 FOMs.
    pub roi_fom: Option<Array1<f64>>,
    /// Per-pulse XGM intensity.
    pub xgm_intensity: Option<Array1<f64>>,
}
