// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Per-train ROI results.

use crate::{DataItem, PairData};
use std::sync::Arc;

/// Normalization auxiliaries derived from ROI3 and ROI4.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RoiAux {
    pub norm3: Option<f64>,
    pub norm4: Option<f64>,
    pub norm3_sub_norm4: Option<f64>,
    pub norm3_add_norm4: Option<f64>,
}

/// ROI analysis results for one train.
///
/// `rects` holds the geometry after intersection with the image extent,
/// `None` when the ROI is deactivated or fully outside; the operator's
/// configured geometry is not stored here, it lives in the config snapshot.
#[derive(Debug, Clone, Default)]
pub struct RoiData {
    /// Corrected `[x, y, w, h]` per ROI rank.
    pub rects: [Option<[i64; 4]>; 4],

    /// Auxiliary normalizers for the current train.
    pub aux: RoiAux,
    /// Auxiliaries computed on the pump image.
    pub on: RoiAux,
    /// Auxiliaries computed on the probe image.
    pub off: RoiAux,

    pub roi1: DataItem,
    pub roi2: DataItem,
    pub roi1_sub_roi2: DataItem,
    pub roi1_add_roi2: DataItem,

    /// Projections along x (rows summed out).
    pub proj1: DataItem,
    pub proj2: DataItem,
    /// Projections along y (columns summed out).
    pub proj1_y: DataItem,
    pub proj2_y: DataItem,
    pub proj1_sub_proj2: DataItem,
    pub proj1_add_proj2: DataItem,

    /// Handles onto the process-long `(tid, fom)` series, rank 1..=4.
    pub fom_hist: Vec<Arc<PairData>>,
}

impl RoiData {
    #[must_use]
    pub fn new() -> Self {
        Self {
            roi1: DataItem::scalar(),
            roi2: DataItem::scalar(),
            roi1_sub_roi2: DataItem::scalar(),
            roi1_add_roi2: DataItem::scalar(),
            proj1: DataItem::vector("pixel", "ROI1 projection"),
            proj2: DataItem::vector("pixel", "ROI2 projection"),
            proj1_y: DataItem::vector("pixel", "ROI1 projection (y)"),
            proj2_y: DataItem::vector("pixel", "ROI2 projection (y)"),
            proj1_sub_proj2: DataItem::vector("pixel", "ROI1 - ROI2 projection"),
            proj1_add_proj2: DataItem::vector("pixel", "ROI1 + ROI2 projection"),
            ..Self::default()
        }
    }

    /// Scalar used by the ROI normalizer (the ROI3 auxiliary).
    #[must_use]
    pub fn norm(&self) -> Option<f64> {
        self.aux.norm3
    }
}
