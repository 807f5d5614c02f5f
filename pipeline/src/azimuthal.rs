// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Azimuthal integration stage.
//!
//! Delegates the pixel-to-q reduction to the integrator collaborator and
//! derives the train FOM as the area under the normalized scattering curve
//! over the configured q window. With a pump/probe analysis selected, the
//! on/off images are integrated into the VFOM pair.

use crate::{Flow, ProcessResult, Processor, ProcessorError, normalize_vfom};
use algorithms::{AzimuthalIntegrator, IntegrationMethod, slice_curve, trapz};
use config::{AnalysisType, AzimuthalConfig, ConfigSnapshot, GlobalConfig};
use correlator::Correlated;
use ndarray::{Array1, Axis};
use tracing::trace;

pub struct AzimuthalProcessor {
    cfg: AzimuthalConfig,
    integrator: Option<AzimuthalIntegrator>,
}

impl Default for AzimuthalProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl AzimuthalProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cfg: AzimuthalConfig::default(),
            integrator: None,
        }
    }

    fn build_integrator(
        cfg: &AzimuthalConfig,
        global: &GlobalConfig,
    ) -> Result<AzimuthalIntegrator, ProcessorError> {
        let method: IntegrationMethod = cfg
            .method
            .parse()
            .map_err(|_| ProcessorError::UnknownParameter(format!(
                "integration method '{}'",
                cfg.method
            )))?;
        Ok(AzimuthalIntegrator {
            center: cfg.center,
            pixel_size: cfg.pixel_size,
            sample_distance: global.sample_distance,
            photon_energy: global.photon_energy,
            method,
            points: cfg.points,
            range: cfg.range,
        })
    }

    /// Per-pulse FOMs over the sliced pulses of the raw detector stack.
    fn pulse_foms(
        &self,
        bundle: &Correlated,
        integrator: &AzimuthalIntegrator,
    ) -> Result<Option<Array1<f64>>, ProcessorError> {
        let Some(key) = bundle.catalog.main_detector() else {
            return Ok(None);
        };
        let Some(correlator::SourceValue::Single(sources::Payload::ImageStack(stack))) =
            bundle.raw.get(key)
        else {
            return Ok(None);
        };

        let tid = bundle.tid();
        let n_pulses = stack.len_of(Axis(0));
        let mut foms = Vec::new();
        for &i in bundle
            .processed
            .image
            .sliced_indices
            .iter()
            .filter(|&&i| i < n_pulses)
        {
            let plane = stack.index_axis(Axis(0), i);
            let (q, intensity) = integrator
                .integrate(&plane)
                .map_err(|e| ProcessorError::Processing(format!("[{tid}] pulse {i}: {e}")))?;
            let (y, x) = slice_curve(
                &intensity.view(),
                &q.view(),
                self.cfg.fom_range.0,
                self.cfg.fom_range.1,
            );
            foms.push(trapz(&y.view(), &x.view()));
        }
        Ok(Some(Array1::from_vec(foms)))
    }
}

impl Processor for AzimuthalProcessor {
    fn name(&self) -> &'static str {
        "azimuthal"
    }

    fn update(&mut self, cfg: &ConfigSnapshot) -> Result<(), ProcessorError> {
        self.cfg = cfg.azimuthal.clone();
        self.integrator = if self.cfg.enabled {
            Some(Self::build_integrator(&self.cfg, &cfg.global)?)
        } else {
            None
        };
        Ok(())
    }

    fn process(&mut self, bundle: &mut Correlated) -> ProcessResult {
        let Some(integrator) = &self.integrator else {
            return Ok(Flow::Continue);
        };
        let tid = bundle.tid();
        let Some(image) = bundle.processed.image.masked_mean.clone() else {
            trace!(tid, "no conditioned image; azimuthal integration skipped");
            return Ok(Flow::Continue);
        };

        let (q, intensity) = integrator
            .integrate(&image.view())
            .map_err(|e| ProcessorError::Processing(format!("[{tid}] {e}")))?;

        let normalized = normalize_vfom(
            &bundle.processed,
            &intensity,
            self.cfg.normalizer,
            &q,
            self.cfg.auc_range,
        )?;

        let (fom_y, fom_x) = slice_curve(
            &normalized.view(),
            &q.view(),
            self.cfg.fom_range.0,
            self.cfg.fom_range.1,
        );
        let fom = trapz(&fom_y.view(), &fom_x.view());

        // pump/probe branch: the VFOM pair comes from the on/off images
        if bundle.processed.pp.analysis_type == AnalysisType::AzimuthalInteg
            && let (Some(on), Some(off)) = (
                bundle.processed.pp.image_on.clone(),
                bundle.processed.pp.image_off.clone(),
            )
        {
            let (_, on_i) = integrator
                .integrate(&on.view())
                .map_err(|e| ProcessorError::Processing(format!("[{tid}] on: {e}")))?;
            let (q_off, off_i) = integrator
                .integrate(&off.view())
                .map_err(|e| ProcessorError::Processing(format!("[{tid}] off: {e}")))?;
            bundle.processed.pp.x = Some(q_off);
            bundle.processed.pp.vfom_on = Some(on_i);
            bundle.processed.pp.vfom_off = Some(off_i);
        }

        if self.cfg.pulse_resolved {
            let foms = self.pulse_foms(bundle, integrator)?;
            bundle.processed.pulse.ai_fom = foms;
        }

        let ai = &mut bundle.processed.ai;
        ai.x = Some(q);
        ai.vfom = Some(normalized);
        ai.fom = Some(fom);
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use algorithms::Pixel;
    use config::{MemoryStore, SharedState, SourceType, ns};
    use ndarray::{Array2, Array3};
    use sources::{RawPacket, SourceCatalog, SourceCategory, SourceItem};

    fn bundle_with_image(tid: i64, image: Array2<Pixel>) -> Correlated {
        let mut catalog = SourceCatalog::new();
        catalog.add(
            "det",
            SourceItem::new(
                SourceCategory::Detector,
                "DET",
                [],
                "image.data",
                None,
                (f64::NEG_INFINITY, f64::INFINITY),
            )
            .unwrap(),
        );
        let (h, w) = image.dim();
        let stack: Array3<Pixel> = image.into_shape_clone((1, h, w)).unwrap();
        let mut packet = RawPacket::new();
        packet.insert("DET", "image.data", stack, tid);
        let mut correlator = correlator::TrainCorrelator::new(catalog);
        let mut bundle = correlator
            .correlate(&packet, SourceType::Calibrated)
            .unwrap()
            .0
            .unwrap();
        let mut image_proc = crate::ImageProcessor::new();
        image_proc.update(&ConfigSnapshot::default()).unwrap();
        image_proc.process(&mut bundle).unwrap();
        bundle
    }

    fn ai_snapshot(extra: &[(&str, &str)]) -> ConfigSnapshot {
        let store = MemoryStore::new();
        store.hset(ns::AZIMUTHAL_INTEG, "enabled", "True");
        store.hset(ns::AZIMUTHAL_INTEG, "integ_center_x", "16");
        store.hset(ns::AZIMUTHAL_INTEG, "integ_center_y", "16");
        store.hset(ns::AZIMUTHAL_INTEG, "integ_points", "32");
        store.hset(ns::AZIMUTHAL_INTEG, "integ_range", "(0.0, 5.0)");
        for (key, value) in extra {
            store.hset(ns::AZIMUTHAL_INTEG, key, value);
        }
        let mut snapshot = ConfigSnapshot::default();
        snapshot.refresh(&store).unwrap();
        snapshot
    }

    #[test]
    fn disabled_stage_is_a_no_op() {
        let mut proc = AzimuthalProcessor::new();
        proc.update(&ConfigSnapshot::default()).unwrap();
        let mut bundle = bundle_with_image(1, Array2::ones((33, 33)));
        proc.process(&mut bundle).unwrap();
        assert!(bundle.processed.ai.vfom.is_none());
    }

    #[test]
    fn uniform_image_yields_a_curve_and_fom() {
        let mut proc = AzimuthalProcessor::new();
        proc.update(&ai_snapshot(&[])).unwrap();
        let mut bundle = bundle_with_image(1, Array2::ones((33, 33)));
        proc.process(&mut bundle).unwrap();

        let ai = &bundle.processed.ai;
        assert_eq!(ai.x.as_ref().unwrap().len(), 32);
        assert!(ai.fom.is_some());
        assert!(ai.vfom.as_ref().unwrap().iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn unknown_method_tag_is_fatal() {
        let mut proc = AzimuthalProcessor::new();
        let snapshot = ai_snapshot(&[("integ_method", "splitpixel2")]);
        assert!(matches!(
            proc.update(&snapshot),
            Err(ProcessorError::UnknownParameter(_))
        ));
    }

    #[test]
    fn pulse_resolved_integration_fills_per_pulse_foms() {
        let mut proc = AzimuthalProcessor::new();
        proc.update(&ai_snapshot(&[("pulse_resolved", "True")]))
            .unwrap();

        let mut catalog = SourceCatalog::new();
        catalog.add(
            "det",
            SourceItem::new(
                SourceCategory::Detector,
                "DET",
                [],
                "image.data",
                None,
                (f64::NEG_INFINITY, f64::INFINITY),
            )
            .unwrap(),
        );
        let mut packet = RawPacket::new();
        packet.insert(
            "DET",
            "image.data",
            ndarray::Array3::<Pixel>::ones((3, 33, 33)),
            1,
        );
        let mut correlator = correlator::TrainCorrelator::new(catalog);
        let mut bundle = correlator
            .correlate(&packet, SourceType::Calibrated)
            .unwrap()
            .0
            .unwrap();
        let mut image_proc = crate::ImageProcessor::new();
        image_proc.update(&ConfigSnapshot::default()).unwrap();
        image_proc.process(&mut bundle).unwrap();

        proc.process(&mut bundle).unwrap();
        let foms = bundle.processed.pulse.ai_fom.as_ref().unwrap();
        assert_eq!(foms.len(), 3);
        // identical pulses integrate to identical FOMs
        assert!(foms.iter().all(|&f| (f - foms[0]).abs() < 1e-9));
    }

    #[test]
    fn pump_probe_branch_integrates_both_images() {
        let mut proc = AzimuthalProcessor::new();
        proc.update(&ai_snapshot(&[])).unwrap();
        let mut bundle = bundle_with_image(1, Array2::ones((33, 33)));
        bundle.processed.pp.analysis_type = AnalysisType::AzimuthalInteg;
        bundle.processed.pp.image_on = Some(Array2::from_elem((33, 33), 2.0));
        bundle.processed.pp.image_off = Some(Array2::ones((33, 33)));
        proc.process(&mut bundle).unwrap();

        assert!(bundle.processed.pp.vfom_on.is_some());
        assert!(bundle.processed.pp.vfom_off.is_some());
        assert_eq!(bundle.processed.pp.x.as_ref().unwrap().len(), 32);
    }
}
