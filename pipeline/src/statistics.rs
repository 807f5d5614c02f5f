// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Histogram statistics.
//!
//! Publishes the distribution of pulse FOMs within the current train and,
//! for the two pulses of interest, the distribution of their FOMs across
//! trains since the last reset. Pulses masked out by the pulse-index
//! filter do not contribute.

use crate::{Flow, ProcessResult, Processor, ProcessorError};
use algorithms::histogram1d;
use config::{AnalysisType, ConfigSnapshot, StatisticsConfig};
use correlator::Correlated;
use model::StatisticsData;
use ndarray::Array1;

pub struct StatisticsProcessor {
    cfg: StatisticsConfig,
    /// FOMs of each pulse of interest, accumulated across trains.
    poi_foms: [Vec<f64>; 2],
}

impl Default for StatisticsProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl StatisticsProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cfg: StatisticsConfig::default(),
            poi_foms: [Vec::new(), Vec::new()],
        }
    }

    fn pulse_foms(bundle: &Correlated, analysis_type: AnalysisType) -> Option<Array1<f64>> {
        let pulse = &bundle.processed.pulse;
        match analysis_type {
            AnalysisType::RoiFom => pulse.roi_fom.clone(),
            AnalysisType::AzimuthalInteg => pulse.ai_fom.clone(),
            _ => pulse.xgm_intensity.clone(),
        }
    }

    fn histogram_of(values: &[f64], n_bins: usize) -> Option<(Array1<f64>, Array1<u64>)> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        let (lo, hi) = finite
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if finite.is_empty() {
            return None;
        }
        // a degenerate spread still deserves one populated bin
        let (lo, hi) = if lo < hi { (lo, hi) } else { (lo - 0.5, hi + 0.5) };
        histogram1d(finite, lo, hi, n_bins).ok()
    }
}

impl Processor for StatisticsProcessor {
    fn name(&self) -> &'static str {
        "statistics"
    }

    fn update(&mut self, cfg: &ConfigSnapshot) -> Result<(), ProcessorError> {
        let next = cfg.statistics.clone();
        if next.reset || next.analysis_type != self.cfg.analysis_type {
            self.poi_foms = [Vec::new(), Vec::new()];
        }
        self.cfg = next;
        Ok(())
    }

    fn process(&mut self, bundle: &mut Correlated) -> ProcessResult {
        if self.cfg.analysis_type == AnalysisType::Undefined || !self.cfg.pulse_resolved {
            return Ok(Flow::Continue);
        }
        let Some(foms) = Self::pulse_foms(bundle, self.cfg.analysis_type) else {
            return Ok(Flow::Continue);
        };

        let kept: Vec<f64> = foms
            .iter()
            .enumerate()
            .filter_map(|(i, &fom)| bundle.processed.pidx.is_kept(i).then_some(fom))
            .collect();

        let mut st = StatisticsData {
            fom_hist: Some(Array1::from_vec(kept.clone())),
            ..StatisticsData::default()
        };
        if let Some((centers, counts)) = Self::histogram_of(&kept, self.cfg.n_bins) {
            st.fom_bin_center = Some(centers);
            st.fom_count = Some(counts);
        }

        for (slot, &poi) in bundle.processed.image.poi_indices.iter().enumerate() {
            if let Some(&fom) = foms.get(poi) {
                self.poi_foms[slot].push(fom);
            }
            if let Some((centers, counts)) =
                Self::histogram_of(&self.poi_foms[slot], self.cfg.n_bins)
            {
                st.poi_fom_bin_center[slot] = Some(centers);
                st.poi_fom_count[slot] = Some(counts);
            }
        }

        bundle.processed.st = st;
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

    fn bundle(tid: i64, foms: Array1<f64>) -> Correlated {
        let mut b = Correlated {
            catalog: SourceCatalog::new(),
            meta: HashMap::new(),
            raw: HashMap::new(),
            processed: ProcessedData::new(tid),
        };
        b.processed.pulse.roi_fom = Some(foms);
        b
    }

    fn snapshot(extra: &[(&str, &str)]) -> ConfigSnapshot {
        let store = MemoryStore::new();
        store.hset(ns::STATISTICS, "analysis_type", "ROI FOM");
        store.hset(ns::STATISTICS, "n_bins", "2");
        for (key, value) in extra {
            store.hset(ns::STATISTICS, key, value);
        }
        let mut snapshot = ConfigSnapshot::default();
        snapshot.refresh(&store).unwrap();
        snapshot
    }

    #[test]
    fn train_histogram_covers_kept_pulses_only() {
        let mut proc = StatisticsProcessor::new();
        proc.update(&snapshot(&[])).unwrap();

        let mut b = bundle(1, array![1.0, 2.0, 9.0, 10.0]);
        b.processed.pidx.mask(2);
        proc.process(&mut b).unwrap();

        let st = &b.processed.st;
        assert_eq!(
            st.fom_hist.as_ref().unwrap().as_slice().unwrap(),
            &[1.0, 2.0, 10.0]
        );
        // bins [1, 5.5) and [5.5, 10]
        assert_eq!(
            st.fom_count.as_ref().unwrap().as_slice().unwrap(),
            &[2, 1]
        );
    }

    #[test]
    fn poi_histograms_accumulate_across_trains() {
        let mut proc = StatisticsProcessor::new();
        proc.update(&snapshot(&[])).unwrap();

        for (tid, first) in [(1, 1.0), (2, 3.0), (3, 5.0)] {
            let mut b = bundle(tid, array![first, 100.0]);
            proc.process(&mut b).unwrap();
        }
        let mut b = bundle(4, array![7.0, 100.0]);
        proc.process(&mut b).unwrap();

        // POI 0 collected [1, 3, 5, 7]
        let counts = b.processed.st.poi_fom_count[0].as_ref().unwrap();
        assert_eq!(counts.sum(), 4);
    }

    #[test]
    fn reset_discards_the_across_train_state() {
        let mut proc = StatisticsProcessor::new();
        proc.update(&snapshot(&[])).unwrap();
        let mut b = bundle(1, array![1.0]);
        proc.process(&mut b).unwrap();

        proc.update(&snapshot(&[("reset", "1")])).unwrap();
        let mut b = bundle(2, array![2.0]);
        proc.process(&mut b).unwrap();
        let counts = b.processed.st.poi_fom_count[0].as_ref().unwrap();
        assert_eq!(counts.sum(), 1);
    }
}
