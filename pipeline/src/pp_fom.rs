// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Final pump/probe figure of merit.
//!
//! Normalizes the VFOM pair produced by the selected analysis subsystem,
//! takes the on-off difference and reduces it to a scalar. Runs after the
//! ROI and azimuthal stages so whichever of them the operator selected has
//! already filled the pair.

use crate::{Flow, ProcessResult, Processor, ProcessorError, normalize_vfom_pp};
use algorithms::{slice_curve, trapz};
use config::{AnalysisType, ConfigSnapshot, Normalizer, PumpProbeConfig};
use correlator::Correlated;
use model::{HistoryInfo, PairData};
use ndarray::Array1;
use std::sync::Arc;
use tracing::debug;

fn windowed_auc(y: &Array1<f64>, x: &Array1<f64>, range: (f64, f64)) -> f64 {
    let (ys, xs) = slice_curve(&y.view(), &x.view(), range.0, range.1);
    trapz(&ys.view(), &xs.view())
}

pub struct PumpProbeFomProcessor {
    cfg: PumpProbeConfig,
    normalizer: Normalizer,
    auc_range: (f64, f64),
    fom_range: (f64, f64),
    hist: Arc<PairData>,
}

impl Default for PumpProbeFomProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl PumpProbeFomProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cfg: PumpProbeConfig::default(),
            normalizer: Normalizer::Undefined,
            auc_range: (f64::NEG_INFINITY, f64::INFINITY),
            fom_range: (f64::NEG_INFINITY, f64::INFINITY),
            hist: Arc::new(PairData::new(HistoryInfo {
                device_id: "pump-probe".to_string(),
                property: "fom".to_string(),
                resolution: 0.0,
            })),
        }
    }
}

impl Processor for PumpProbeFomProcessor {
    fn name(&self) -> &'static str {
        "pump_probe_fom"
    }

    fn update(&mut self, cfg: &ConfigSnapshot) -> Result<(), ProcessorError> {
        self.cfg = cfg.pump_probe.clone();
        match self.cfg.analysis_type {
            AnalysisType::AzimuthalInteg => {
                self.normalizer = cfg.azimuthal.normalizer;
                self.auc_range = cfg.azimuthal.auc_range;
                self.fom_range = cfg.azimuthal.fom_range;
            }
            _ => {
                // projection curves are normalized by their own area
                self.normalizer = Normalizer::Auc;
                self.auc_range = (f64::NEG_INFINITY, f64::INFINITY);
                self.fom_range = (f64::NEG_INFINITY, f64::INFINITY);
            }
        }
        Ok(())
    }

    fn process(&mut self, bundle: &mut Correlated) -> ProcessResult {
        let tid = bundle.tid();

        if self.cfg.reset {
            debug!(tid, "pump/probe history reset");
            self.hist.clear();
        }

        // the curve pair is present for projection and integration analyses;
        // the plain ROI analysis has already reduced its difference image
        let pair = {
            let pp = &bundle.processed.pp;
            match (&pp.x, &pp.vfom_on, &pp.vfom_off) {
                (Some(x), Some(on), Some(off)) => Some((x.clone(), on.clone(), off.clone())),
                _ => None,
            }
        };

        if let Some((x, on, off)) = pair {
            let (norm_on, norm_off) = normalize_vfom_pp(
                &bundle.processed,
                &on,
                &off,
                self.normalizer,
                &x,
                self.auc_range,
            )?;
            let diff = &norm_on - &norm_off;
            let fom = if self.cfg.abs_difference {
                windowed_auc(&diff.mapv(f64::abs), &x, self.fom_range)
            } else {
                windowed_auc(&diff, &x, self.fom_range)
            };

            let pp = &mut bundle.processed.pp;
            pp.vfom_on = Some(norm_on);
            pp.vfom_off = Some(norm_off);
            pp.fom = Some(fom);
        }

        if let Some(fom) = bundle.processed.pp.fom {
            self.hist.push(tid as f64, fom);
        }
        bundle.processed.pp.fom_hist = Some(Arc::clone(&self.hist));
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{MemoryStore, SharedState, ns};
    use model::ProcessedData;
    use ndarray::array;
    use sources::SourceCatalog;
    use std::collections::HashMap;

    fn bundle(tid: i64) -> Correlated {
        Correlated {
            catalog: SourceCatalog::new(),
            meta: HashMap::new(),
            raw: HashMap::new(),
            processed: ProcessedData::new(tid),
        }
    }

    fn snapshot(abs_difference: &str) -> ConfigSnapshot {
        let store = MemoryStore::new();
        store.hset(ns::PUMP_PROBE, "analysis_type", "ROI proj");
        store.hset(ns::PUMP_PROBE, "abs_difference", abs_difference);
        let mut snapshot = ConfigSnapshot::default();
        snapshot.refresh(&store).unwrap();
        snapshot
    }

    #[test]
    fn difference_fom_lands_in_the_history() {
        let mut proc = PumpProbeFomProcessor::new();
        proc.update(&snapshot("False")).unwrap();
        // identity normalization keeps the arithmetic obvious
        proc.normalizer = Normalizer::Undefined;

        let mut b = bundle(5);
        b.processed.pp.x = Some(array![0.0, 1.0, 2.0]);
        b.processed.pp.vfom_on = Some(array![3.0, 3.0, 3.0]);
        b.processed.pp.vfom_off = Some(array![1.0, 1.0, 1.0]);
        proc.process(&mut b).unwrap();

        // trapezoid over a constant difference of 2 across [0, 2]
        assert_eq!(b.processed.pp.fom, Some(4.0));
        let (x, y, _) = b.processed.pp.fom_hist.as_ref().unwrap().snapshot();
        assert_eq!((x, y), (vec![5.0], vec![4.0]));
    }

    #[test]
    fn abs_difference_rectifies_before_reducing() {
        let mut proc = PumpProbeFomProcessor::new();
        proc.update(&snapshot("True")).unwrap();
        proc.normalizer = Normalizer::Undefined;

        let mut b = bundle(6);
        b.processed.pp.x = Some(array![0.0, 1.0]);
        b.processed.pp.vfom_on = Some(array![1.0, -1.0]);
        b.processed.pp.vfom_off = Some(array![0.0, 0.0]);
        proc.process(&mut b).unwrap();
        assert_eq!(b.processed.pp.fom, Some(1.0));
    }

    #[test]
    fn missing_pair_keeps_the_history_untouched() {
        let mut proc = PumpProbeFomProcessor::new();
        proc.update(&snapshot("True")).unwrap();
        let mut b = bundle(7);
        proc.process(&mut b).unwrap();
        assert_eq!(b.processed.pp.fom, None);
        let (x, _, _) = b.processed.pp.fom_hist.as_ref().unwrap().snapshot();
        assert!(x.is_empty());
    }

    #[test]
    fn reset_flag_clears_history_before_the_push() {
        let mut proc = PumpProbeFomProcessor::new();
        proc.update(&snapshot("False")).unwrap();
        proc.normalizer = Normalizer::Undefined;

        let mut b = bundle(1);
        b.processed.pp.x = Some(array![0.0, 1.0]);
        b.processed.pp.vfom_on = Some(array![2.0, 2.0]);
        b.processed.pp.vfom_off = Some(array![1.0, 1.0]);
        proc.process(&mut b).unwrap();

        proc.cfg.reset = true;
        let mut b = bundle(2);
        b.processed.pp.x = Some(array![0.0, 1.0]);
        b.processed.pp.vfom_on = Some(array![5.0, 5.0]);
        b.processed.pp.vfom_off = Some(array![1.0, 1.0]);
        proc.process(&mut b).unwrap();

        let (x, y, _) = b.processed.pp.fom_hist.as_ref().unwrap().snapshot();
        assert_eq!((x, y), (vec![2.0], vec![4.0]));
    }
}
