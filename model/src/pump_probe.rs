// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Per-train pump/probe state.

use crate::PairData;
use algorithms::Pixel;
use config::{AnalysisType, PumpProbeMode};
use ndarray::{Array1, Array2};
use std::sync::Arc;

/// Pump/probe analysis state for one train.
///
/// The VFOM pair is computed by whichever analysis subsystem the operator
/// selected (ROI, projection or azimuthal integration); the final FOM is a
/// reduction over the normalized on-off difference.
#[derive(Debug, Clone, Default)]
pub struct PumpProbeData {
    pub analysis_type: AnalysisType,
    pub mode: PumpProbeMode,
    pub on_indices: Vec<usize>,
    pub off_indices: Vec<usize>,
    pub abs_difference: bool,

    /// Moving-average pump image for the current train.
    pub image_on: Option<Array2<Pixel>>,
    /// Moving-average probe image for the current train.
    pub image_off: Option<Array2<Pixel>>,

    /// Common x coordinate of the VFOM pair.
    pub x: Option<Array1<f64>>,
    /// Normalized on-VFOM.
    pub vfom_on: Option<Array1<f64>>,
    /// Normalized off-VFOM.
    pub vfom_off: Option<Array1<f64>>,
    pub fom: Option<f64>,

    /// ROI normalizers evaluated on the on/off images.
    pub roi_norm_on: Option<f64>,
    pub roi_norm_off: Option<f64>,

    /// Handle onto the process-long `(tid, fom)` series.
    pub fom_hist: Option<Arc<PairData>>,
}

impl PumpProbeData {
    /// Whether this train is "on" under the train-parity pairing modes.
    #[must_use]
    pub fn train_is_on(mode: PumpProbeMode, tid: i64) -> bool {
        match mode {
            PumpProbeMode::EvenTrainOn => tid % 2 == 0,
            PumpProbeMode::OddTrainOn => tid % 2 != 0,
            // other modes split within the train or use a reference
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn train_parity_modes_alternate() {
        assert!(PumpProbeData::train_is_on(PumpProbeMode::EvenTrainOn, 10));
        assert!(!PumpProbeData::train_is_on(PumpProbeMode::EvenTrainOn, 11));
        assert!(PumpProbeData::train_is_on(PumpProbeMode::OddTrainOn, 11));
        assert!(!PumpProbeData::train_is_on(PumpProbeMode::OddTrainOn, 10));
    }
}
