// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Correlation slots.
//!
//! Each of the four slots pairs a slow value (device/property lookup, or
//! the train id via `"Any"`) with the current train FOM of the configured
//! analysis. A slot's history is process-long; reconfiguring its device,
//! property or resolution swaps the backing store and discards the samples,
//! with a positive resolution selecting the binned variant.

use crate::{Flow, ProcessResult, Processor, ProcessorError, fetch_property, train_fom};
use config::{AnalysisType, ConfigSnapshot, CorrelationSlot};
use correlator::Correlated;
use model::{CorrelationHistory, CorrelationSlotData, HistoryInfo};
use std::sync::Arc;
use tracing::{debug, trace};

struct SlotState {
    cfg: CorrelationSlot,
    hist: Option<Arc<CorrelationHistory>>,
}

pub struct CorrelationProcessor {
    analysis_type: AnalysisType,
    slots: [SlotState; 4],
}

impl Default for CorrelationProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            analysis_type: AnalysisType::Undefined,
            slots: std::array::from_fn(|_| SlotState {
                cfg: CorrelationSlot::default(),
                hist: None,
            }),
        }
    }
}

impl Processor for CorrelationProcessor {
    fn name(&self) -> &'static str {
        "correlation"
    }

    fn update(&mut self, cfg: &ConfigSnapshot) -> Result<(), ProcessorError> {
        self.analysis_type = cfg.correlation.analysis_type;

        for (rank, slot) in self.slots.iter_mut().enumerate() {
            let next = cfg.correlation.slots[rank].clone();
            let changed = next != slot.cfg;

            if next.device_id.is_empty() || next.property.is_empty() {
                if slot.hist.take().is_some() {
                    debug!(rank, "correlation slot deactivated");
                }
            } else if changed || slot.hist.is_none() {
                // any parameter change rebuilds the backing store
                let hist = CorrelationHistory::for_info(HistoryInfo {
                    device_id: next.device_id.clone(),
                    property: next.property.clone(),
                    resolution: next.resolution,
                })
                .map_err(|e| ProcessorError::Processing(e.to_string()))?;
                slot.hist = Some(Arc::new(hist));
                debug!(rank, device = %next.device_id, "correlation slot rebuilt");
            }
            slot.cfg = next;
        }

        if cfg.correlation.reset {
            for slot in &self.slots {
                if let Some(hist) = &slot.hist {
                    hist.clear();
                }
            }
        }
        Ok(())
    }

    fn process(&mut self, bundle: &mut Correlated) -> ProcessResult {
        let y = train_fom(&bundle.processed, self.analysis_type);

        for (rank, slot) in self.slots.iter().enumerate() {
            let Some(hist) = &slot.hist else {
                continue;
            };

            let (value, reason) =
                fetch_property(bundle, &slot.cfg.device_id, &slot.cfg.property);
            let x = value.and_then(|v| v.as_scalar());
            if x.is_none() && !reason.is_empty() {
                trace!("{reason}");
            }

            if let (Some(x), Some(y)) = (x, y) {
                hist.push(x, y);
            }

            bundle.processed.corr.slots[rank] = CorrelationSlotData {
                x,
                y,
                device_id: slot.cfg.device_id.clone(),
                property: slot.cfg.property.clone(),
                resolution: slot.cfg.resolution,
                hist: Some(Arc::clone(hist)),
            };
        }
        Ok(Flow::Continue)
    }
}
