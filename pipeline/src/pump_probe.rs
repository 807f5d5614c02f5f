// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Pump/probe pairing.
//!
//! Splits each train into pump ("on") and probe ("off") images according to
//! the configured mode and maintains their moving averages. The analysis
//! subsystems (ROI, projection, azimuthal integration) later derive the
//! VFOM pair from these images.

use crate::{Flow, ProcessResult, Processor, ProcessorError};
use algorithms::{Pixel, nanmean_stack_sliced};
use config::{ConfigSnapshot, PumpProbeConfig, PumpProbeMode};
use correlator::Correlated;
use model::{MovingAverageImage, PumpProbeData};
use ndarray::{Array2, Axis};
use tracing::trace;

pub struct PumpProbeProcessor {
    cfg: PumpProbeConfig,
    on_ma: MovingAverageImage,
    off_ma: MovingAverageImage,
    /// Off image recorded ahead of time for `PreDefinedOff`.
    reference: Option<Array2<Pixel>>,
    /// Parity modes remember the last off train mean until the next on
    /// train pairs with it.
    last_off: Option<Array2<Pixel>>,
}

impl Default for PumpProbeProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl PumpProbeProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cfg: PumpProbeConfig::default(),
            on_ma: MovingAverageImage::new(1),
            off_ma: MovingAverageImage::new(1),
            reference: None,
            last_off: None,
        }
    }

    pub fn set_reference(&mut self, reference: Option<Array2<Pixel>>) {
        self.reference = reference;
    }
}

impl Processor for PumpProbeProcessor {
    fn name(&self) -> &'static str {
        "pump_probe"
    }

    fn update(&mut self, cfg: &ConfigSnapshot) -> Result<(), ProcessorError> {
        let next = cfg.pump_probe.clone();
        if next.ma_window != self.cfg.ma_window {
            self.on_ma
                .set_window(next.ma_window)
                .and_then(|()| self.off_ma.set_window(next.ma_window))
                .map_err(|e| ProcessorError::Processing(e.to_string()))?;
        }
        if next.mode != self.cfg.mode {
            self.on_ma.clear();
            self.off_ma.clear();
            self.last_off = None;
        }
        self.cfg = next;
        Ok(())
    }

    fn process(&mut self, bundle: &mut Correlated) -> ProcessResult {
        let tid = bundle.tid();

        let pp = PumpProbeData {
            analysis_type: self.cfg.analysis_type,
            mode: self.cfg.mode,
            on_indices: self.cfg.on_indices.clone(),
            off_indices: self.cfg.off_indices.clone(),
            abs_difference: self.cfg.abs_difference,
            ..PumpProbeData::default()
        };
        bundle.processed.pp = pp;

        if self.cfg.mode == PumpProbeMode::Undefined {
            return Ok(Flow::Continue);
        }

        let Some(mean) = bundle.processed.image.mean.clone() else {
            trace!(tid, "no conditioned image; pump/probe skipped");
            return Ok(Flow::Continue);
        };

        let (on, off) = match self.cfg.mode {
            PumpProbeMode::PreDefinedOff => {
                let Some(reference) = self.reference.clone() else {
                    return Err(ProcessorError::Processing(format!(
                        "[{tid}] no reference image recorded for off"
                    )));
                };
                (Some(mean), Some(reference))
            }
            PumpProbeMode::SameTrain => {
                let on = pulse_subset_mean(bundle, &self.cfg.on_indices, tid)?;
                let off = pulse_subset_mean(bundle, &self.cfg.off_indices, tid)?;
                (Some(on), Some(off))
            }
            PumpProbeMode::EvenTrainOn | PumpProbeMode::OddTrainOn => {
                if PumpProbeData::train_is_on(self.cfg.mode, tid) {
                    (Some(mean), self.last_off.clone())
                } else {
                    self.last_off = Some(mean);
                    (None, None)
                }
            }
            PumpProbeMode::Undefined => unreachable!("handled above"),
        };

        let (Some(on), Some(off)) = (on, off) else {
            // an off train, or an on train still waiting for its partner
            return Ok(Flow::Continue);
        };

        self.on_ma.push(&on.view());
        self.off_ma.push(&off.view());
        bundle.processed.pp.image_on = self.on_ma.get().cloned();
        bundle.processed.pp.image_off = self.off_ma.get().cloned();
        Ok(Flow::Continue)
    }
}

/// NaN-aware mean over the pulses of the original stack selected by
/// positions into the sliced train.
fn pulse_subset_mean(
    bundle: &Correlated,
    indices: &[usize],
    tid: i64,
) -> Result<Array2<Pixel>, ProcessorError> {
    let image = &bundle.processed.image;
    let key = bundle
        .catalog
        .main_detector()
        .ok_or_else(|| ProcessorError::Processing("no main detector".to_string()))?;
    let stack = match bundle.raw.get(key) {
        Some(correlator::SourceValue::Single(sources::Payload::ImageStack(stack))) => stack,
        _ => {
            return Err(ProcessorError::Processing(format!(
                "[{tid}] same-train pairing needs a pulse-resolved detector"
            )));
        }
    };

    let selected: Vec<usize> = indices
        .iter()
        .filter_map(|&i| image.sliced_indices.get(i).copied())
        .collect();
    if selected.is_empty() {
        return Err(ProcessorError::Processing(format!(
            "[{tid}] pump/probe pulse subset is empty"
        )));
    }
    if selected.iter().any(|&i| i >= stack.len_of(Axis(0))) {
        return Err(ProcessorError::Processing(format!(
            "[{tid}] pump/probe pulse index beyond the stack"
        )));
    }
    Ok(nanmean_stack_sliced(&stack.view(), &selected))
}
