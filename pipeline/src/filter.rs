// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Pulse-index filtering.
//!
//! Masks out pulses whose per-pulse FOM falls outside the configured
//! acceptance range. Runs after the pulse-resolved analyses so their FOM
//! arrays exist; downstream reductions (statistics, histograms) consult the
//! mask.

use crate::{Flow, ProcessResult, Processor, ProcessorError};
use config::{AnalysisType, ConfigSnapshot, PulseFilterConfig};
use correlator::Correlated;
use ndarray::Array1;
use tracing::debug;

#[derive(Default)]
pub struct PulseFilterProcessor {
    cfg: PulseFilterConfig,
}

impl PulseFilterProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn pulse_foms<'a>(
        bundle: &'a Correlated,
        analysis_type: AnalysisType,
    ) -> Option<&'a Array1<f64>> {
        let pulse = &bundle.processed.pulse;
        match analysis_type {
            AnalysisType::RoiFom => pulse.roi_fom.as_ref(),
            AnalysisType::AzimuthalInteg => pulse.ai_fom.as_ref(),
            _ => pulse.xgm_intensity.as_ref(),
        }
    }
}

impl Processor for PulseFilterProcessor {
    fn name(&self) -> &'static str {
        "pulse_filter"
    }

    fn update(&mut self, cfg: &ConfigSnapshot) -> Result<(), ProcessorError> {
        self.cfg = cfg.pulse_filter.clone();
        Ok(())
    }

    fn process(&mut self, bundle: &mut Correlated) -> ProcessResult {
        if self.cfg.analysis_type == AnalysisType::Undefined {
            return Ok(Flow::Continue);
        }
        let Some(foms) = Self::pulse_foms(bundle, self.cfg.analysis_type) else {
            return Ok(Flow::Continue);
        };

        let (lo, hi) = self.cfg.fom_range;
        let rejected: Vec<usize> = foms
            .iter()
            .enumerate()
            .filter_map(|(i, &fom)| (!(lo..=hi).contains(&fom)).then_some(i))
            .collect();
        if !rejected.is_empty() {
            debug!(
                tid = bundle.tid(),
                n = rejected.len(),
                "pulses rejected by the FOM filter"
            );
            bundle.processed.pidx.mask_all(rejected);
        }
        Ok(Flow::Continue)
    }
}
