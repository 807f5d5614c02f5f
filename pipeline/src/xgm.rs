// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! XGM readings.
//!
//! Resolves the configured beam-intensity device and fills the train-level
//! reading, the per-pulse array when the device is pulse-resolved, and the
//! on/off split the pump/probe subsystem normalizes against.

use crate::{Fetched, Flow, ProcessResult, Processor, ProcessorError, fetch_property};
use config::{ConfigSnapshot, PumpProbeMode};
use correlator::Correlated;
use model::PumpProbeData;
use sources::Payload;
use tracing::trace;

#[derive(Default)]
pub struct XgmProcessor {
    device: String,
    property: String,
    mode: PumpProbeMode,
    on_indices: Vec<usize>,
    off_indices: Vec<usize>,
    /// Smoothed train intensity under the global moving-average window.
    ma: model::MovingAverageScalar,
}

impl XgmProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn mean_over(intensity: &ndarray::Array1<f64>, indices: &[usize]) -> Option<f64> {
        let selected: Vec<f64> = indices
            .iter()
            .filter_map(|&i| intensity.get(i).copied())
            .collect();
        if selected.is_empty() {
            None
        } else {
            Some(selected.iter().sum::<f64>() / selected.len() as f64)
        }
    }
}

impl Processor for XgmProcessor {
    fn name(&self) -> &'static str {
        "xgm"
    }

    fn update(&mut self, cfg: &ConfigSnapshot) -> Result<(), ProcessorError> {
        self.device.clone_from(&cfg.global.xgm_device);
        self.property.clone_from(&cfg.global.xgm_property);
        self.mode = cfg.pump_probe.mode;
        self.on_indices.clone_from(&cfg.pump_probe.on_indices);
        self.off_indices.clone_from(&cfg.pump_probe.off_indices);
        if cfg.image.ma_window != self.ma.window() {
            self.ma
                .set_window(cfg.image.ma_window)
                .map_err(|e| ProcessorError::Processing(e.to_string()))?;
        }
        Ok(())
    }

    fn process(&mut self, bundle: &mut Correlated) -> ProcessResult {
        let tid = bundle.tid();

        enum Reading {
            PerPulse(ndarray::Array1<f64>),
            Train(f64),
        }

        // resolve first so the bundle borrow ends before mutation
        let reading = {
            let (value, reason) = fetch_property(bundle, &self.device, &self.property);
            match value {
                None => {
                    if !reason.is_empty() {
                        trace!("{reason}");
                    }
                    return Ok(Flow::Continue);
                }
                Some(Fetched::Value(Payload::Vector(intensity))) => {
                    Reading::PerPulse(intensity.clone())
                }
                Some(Fetched::Value(Payload::Scalar(v))) => Reading::Train(*v),
                Some(other) => {
                    return Err(ProcessorError::Processing(format!(
                        "[{tid}] XGM payload has unexpected shape: {other:?}"
                    )));
                }
            }
        };

        let processed = &mut bundle.processed;
        match reading {
            Reading::PerPulse(intensity) => {
                self.ma.push(intensity.sum() / intensity.len().max(1) as f64);
                processed.xgm.item.intensity = self.ma.get();

                match self.mode {
                    PumpProbeMode::SameTrain => {
                        processed.xgm.on.intensity = Self::mean_over(&intensity, &self.on_indices);
                        processed.xgm.off.intensity =
                            Self::mean_over(&intensity, &self.off_indices);
                    }
                    PumpProbeMode::EvenTrainOn | PumpProbeMode::OddTrainOn => {
                        let side = if PumpProbeData::train_is_on(self.mode, tid) {
                            &mut processed.xgm.on
                        } else {
                            &mut processed.xgm.off
                        };
                        side.intensity = processed.xgm.item.intensity;
                    }
                    _ => {}
                }
                processed.pulse.xgm_intensity = Some(intensity);
            }
            Reading::Train(scalar) => {
                self.ma.push(scalar);
                processed.xgm.item.intensity = self.ma.get();
            }
        }
        Ok(Flow::Continue)
    }
}
