// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Region-of-interest analysis.
//!
//! [`RoiFomProcessor`] derives scalar FOMs, projections and normalization
//! auxiliaries from `masked_mean`; [`RoiPumpProbeProcessor`] extracts the
//! signal/background regions from the pump and probe images. Compose them
//! with [`roi_processor`].

use crate::{
    CompositeProcessor, Flow, ProcessResult, Processor, ProcessorError,
};
use algorithms::{Pixel, intersection};
use config::{AnalysisType, ConfigSnapshot, RoiConfig, RoiReduction};
use correlator::Correlated;
use model::{HistoryInfo, PairData, RoiAux, RoiData};
use ndarray::{Array1, Array2, ArrayView2, Axis, s};
use std::sync::Arc;

/// The ROI stage: per-rank FOMs first, then the pump/probe branch.
#[must_use]
pub fn roi_processor() -> CompositeProcessor {
    CompositeProcessor::new("roi")
        .add(RoiFomProcessor::new())
        .add(RoiPumpProbeProcessor::new())
}

fn reduce(region: &ArrayView2<'_, Pixel>, reduction: RoiReduction) -> f64 {
    let sum: f64 = region.iter().map(|&v| f64::from(v)).sum();
    match reduction {
        RoiReduction::Sum => sum,
        RoiReduction::Mean => sum / region.len().max(1) as f64,
    }
}

/// Clip a configured ROI against the image extent.
///
/// Returns `None` when the intersection is empty; the ROI itself stays
/// activated so it recovers as soon as it overlaps the image again.
fn clip_roi(rect: [i64; 4], shape: (usize, usize)) -> Option<[i64; 4]> {
    let (height, width) = shape;
    let clipped = intersection(rect, [0, 0, width as i64, height as i64]);
    (clipped[2] > 0 && clipped[3] > 0).then_some(clipped)
}

fn roi_view<'a>(image: &'a Array2<Pixel>, rect: [i64; 4]) -> ArrayView2<'a, Pixel> {
    let [x, y, w, h] = rect.map(|v| v as usize);
    image.slice(s![y..y + h, x..x + w])
}

/// Per-pulse ROI1 FOMs over the sliced pulses of the raw detector stack.
fn pulse_roi_foms(
    bundle: &Correlated,
    rect: [i64; 4],
    reduction: RoiReduction,
) -> Option<Array1<f64>> {
    let key = bundle.catalog.main_detector()?;
    let correlator::SourceValue::Single(sources::Payload::ImageStack(stack)) =
        bundle.raw.get(key)?
    else {
        return None;
    };
    let [x, y, w, h] = rect.map(|v| v as usize);
    let n_pulses = stack.len_of(Axis(0));
    let foms = bundle
        .processed
        .image
        .sliced_indices
        .iter()
        .filter(|&&i| i < n_pulses)
        .map(|&i| reduce(&stack.slice(s![i, y..y + h, x..x + w]), reduction))
        .collect();
    Some(foms)
}

pub struct RoiFomProcessor {
    cfg: RoiConfig,
    hist: [Arc<PairData>; 4],
}

impl Default for RoiFomProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl RoiFomProcessor {
    #[must_use]
    pub fn new() -> Self {
        let hist = std::array::from_fn(|i| {
            Arc::new(PairData::new(HistoryInfo {
                device_id: format!("ROI{}", i + 1),
                property: "fom".to_string(),
                resolution: 0.0,
            }))
        });
        Self {
            cfg: RoiConfig::default(),
            hist,
        }
    }

    /// ROI3/ROI4 auxiliaries on an arbitrary image (used for the on/off
    /// images as well as the train mean).
    fn aux_for(&self, image: &Array2<Pixel>) -> RoiAux {
        let mut aux = RoiAux::default();
        for (rank, slot) in [(2_usize, 0_usize), (3, 1)] {
            let geom = self.cfg.geoms[rank];
            if !geom.activated {
                continue;
            }
            let Some(rect) = clip_roi(geom.rect(), image.dim()) else {
                continue;
            };
            let value = reduce(&roi_view(image, rect), self.cfg.fom_reduction);
            if slot == 0 {
                aux.norm3 = Some(value);
            } else {
                aux.norm4 = Some(value);
            }
        }
        if let (Some(n3), Some(n4)) = (aux.norm3, aux.norm4) {
            aux.norm3_sub_norm4 = Some(n3 - n4);
            aux.norm3_add_norm4 = Some(n3 + n4);
        }
        aux
    }
}

impl Processor for RoiFomProcessor {
    fn name(&self) -> &'static str {
        "roi_fom"
    }

    fn update(&mut self, cfg: &ConfigSnapshot) -> Result<(), ProcessorError> {
        self.cfg = cfg.roi.clone();
        Ok(())
    }

    fn process(&mut self, bundle: &mut Correlated) -> ProcessResult {
        let tid = bundle.tid();
        let Some(image) = bundle.processed.image.masked_mean.clone() else {
            // keep the series alive even without an image this train
            for hist in &self.hist {
                hist.push(tid as f64, 0.0);
            }
            bundle.processed.roi.fom_hist = self.hist.iter().map(Arc::clone).collect();
            return Ok(Flow::Stop);
        };

        let mut roi = RoiData::new();

        for rank in 0..4 {
            let geom = self.cfg.geoms[rank];
            let mut fom = None;

            if geom.activated
                && let Some(rect) = clip_roi(geom.rect(), image.dim())
            {
                roi.rects[rank] = Some(rect);
                let region = roi_view(&image, rect);
                let value = reduce(&region, self.cfg.fom_reduction);
                fom = Some(value);

                if rank < 2 {
                    // per-axis sums; x projects out the rows
                    let proj_x: Array1<f64> = region
                        .columns()
                        .into_iter()
                        .map(|col| col.iter().map(|&v| f64::from(v)).sum())
                        .collect();
                    let proj_y: Array1<f64> = region
                        .rows()
                        .into_iter()
                        .map(|row| row.iter().map(|&v| f64::from(v)).sum())
                        .collect();
                    let (scalar_item, proj_item, proj_y_item) = if rank == 0 {
                        (&mut roi.roi1, &mut roi.proj1, &mut roi.proj1_y)
                    } else {
                        (&mut roi.roi2, &mut roi.proj2, &mut roi.proj2_y)
                    };
                    scalar_item.fom = fom;
                    proj_item.fom = Some(proj_x.sum());
                    proj_item.x = Some(Array1::from_iter((0..proj_x.len()).map(|i| i as f64)));
                    proj_item.vfom = Some(proj_x);
                    proj_y_item.fom = Some(proj_y.sum());
                    proj_y_item.x =
                        Some(Array1::from_iter((0..proj_y.len()).map(|i| i as f64)));
                    proj_y_item.vfom = Some(proj_y);
                }
            }

            // history entry regardless of activation, so series started at
            // different times stay aligned
            self.hist[rank].push(tid as f64, fom.unwrap_or(0.0));
        }

        // derived scalar items
        if let (Some(a), Some(b)) = (roi.roi1.fom, roi.roi2.fom) {
            roi.roi1_sub_roi2.fom = Some(a - b);
            roi.roi1_add_roi2.fom = Some(a + b);
        }
        // derived projections, element-wise when the extents agree
        if let (Some(p1), Some(p2)) = (roi.proj1.vfom.clone(), roi.proj2.vfom.clone())
            && p1.len() == p2.len()
        {
            roi.proj1_sub_proj2.x = roi.proj1.x.clone();
            roi.proj1_sub_proj2.vfom = Some(&p1 - &p2);
            roi.proj1_sub_proj2.fom = Some((&p1 - &p2).sum());
            roi.proj1_add_proj2.x = roi.proj1.x.clone();
            roi.proj1_add_proj2.vfom = Some(&p1 + &p2);
            roi.proj1_add_proj2.fom = Some((&p1 + &p2).sum());
        }

        roi.aux = self.aux_for(&image);
        if let Some(on) = &bundle.processed.pp.image_on {
            roi.on = self.aux_for(on);
            bundle.processed.pp.roi_norm_on = roi.on.norm3;
        }
        if let Some(off) = &bundle.processed.pp.image_off {
            roi.off = self.aux_for(off);
            bundle.processed.pp.roi_norm_off = roi.off.norm3;
        }

        roi.fom_hist = self.hist.iter().map(Arc::clone).collect();

        if let Some(rect) = roi.rects[0] {
            let foms = pulse_roi_foms(bundle, rect, self.cfg.fom_reduction);
            bundle.processed.pulse.roi_fom = foms;
        }

        bundle.processed.roi = roi;
        Ok(Flow::Continue)
    }
}

/// Extracts the signal (ROI1) minus background (ROI2) regions from the
/// pump/probe image pair and derives the VFOM pair or, for the plain ROI
/// analysis, the final FOM.
#[derive(Default)]
pub struct RoiPumpProbeProcessor {
    reduction: RoiReduction,
}

impl RoiPumpProbeProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Processor for RoiPumpProbeProcessor {
    fn name(&self) -> &'static str {
        "roi_pump_probe"
    }

    fn update(&mut self, cfg: &ConfigSnapshot) -> Result<(), ProcessorError> {
        self.reduction = cfg.roi.fom_reduction;
        Ok(())
    }

    fn process(&mut self, bundle: &mut Correlated) -> ProcessResult {
        let analysis = bundle.processed.pp.analysis_type;
        if !matches!(analysis, AnalysisType::RoiFom | AnalysisType::RoiProj) {
            return Ok(Flow::Continue);
        }

        let Some(signal) = bundle.processed.roi.rects[0] else {
            return Ok(Flow::Stop);
        };
        let background = bundle.processed.roi.rects[1];
        if let Some(background) = background
            && (background[2], background[3]) != (signal[2], signal[3])
        {
            return Err(ProcessorError::Processing(format!(
                "[{}] shapes of ROI1 and ROI2 differ",
                bundle.tid()
            )));
        }

        let (Some(on), Some(off)) = (
            bundle.processed.pp.image_on.clone(),
            bundle.processed.pp.image_off.clone(),
        ) else {
            return Ok(Flow::Stop);
        };

        let extract = |image: &Array2<Pixel>| -> Array2<Pixel> {
            let mut region = roi_view(image, signal).to_owned();
            if let Some(background) = background {
                region -= &roi_view(image, background);
            }
            region
        };
        let on_roi = extract(&on);
        let off_roi = extract(&off);

        let pp = &mut bundle.processed.pp;
        match analysis {
            AnalysisType::RoiFom => {
                // scalar analysis: reduce the difference image directly
                let diff = &on_roi - &off_roi;
                let value = if pp.abs_difference {
                    reduce(&diff.mapv(Pixel::abs).view(), self.reduction)
                } else {
                    reduce(&diff.view(), self.reduction)
                };
                pp.fom = Some(value);
            }
            AnalysisType::RoiProj => {
                let project = |region: &Array2<Pixel>| -> Array1<f64> {
                    region
                        .columns()
                        .into_iter()
                        .map(|col| col.iter().map(|&v| f64::from(v)).sum())
                        .collect()
                };
                pp.x = Some(Array1::from_iter((0..on_roi.dim().1).map(|i| i as f64)));
                pp.vfom_on = Some(project(&on_roi));
                pp.vfom_off = Some(project(&off_roi));
            }
            _ => {}
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{MemoryStore, SharedState, SourceType, ns};
    use ndarray::{Array2, Array3};
    use sources::{RawPacket, SourceCatalog, SourceCategory, SourceItem};

    fn gradient_image(n: usize) -> Array2<Pixel> {
        Array2::from_shape_fn((n, n), |(i, j)| (i + j) as Pixel)
    }

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

    fn roi_snapshot(entries: &[(&str, &str)]) -> ConfigSnapshot {
        let store = MemoryStore::new();
        for (key, value) in entries {
            store.hset(ns::ROI, key, value);
        }
        let mut snapshot = ConfigSnapshot::default();
        snapshot.refresh(&store).unwrap();
        snapshot
    }

    #[test]
    fn gradient_roi_mean_and_projections() {
        let snapshot = roi_snapshot(&[
            ("region1", "[1, 1, 4, 4]"),
            ("activated1", "True"),
            ("fom_reduction", "mean"),
        ]);
        let mut proc = RoiFomProcessor::new();
        proc.update(&snapshot).unwrap();

        let mut bundle = bundle_with_image(42, gradient_image(6));
        proc.process(&mut bundle).unwrap();

        let roi = &bundle.processed.roi;
        assert_eq!(roi.rects[0], Some([1, 1, 4, 4]));
        assert_eq!(roi.roi1.fom, Some(5.0));
        // column sums of the (i + j) gradient over rows 1..=4; the
        // gradient is symmetric so both projections agree
        let proj = roi.proj1.vfom.as_ref().unwrap();
        assert_eq!(proj.as_slice().unwrap(), &[14.0, 18.0, 22.0, 26.0]);
        let proj_y = roi.proj1_y.vfom.as_ref().unwrap();
        assert_eq!(proj_y.as_slice().unwrap(), &[14.0, 18.0, 22.0, 26.0]);

        let (x, y, _) = roi.fom_hist[0].snapshot();
        assert_eq!(x, vec![42.0]);
        assert_eq!(y, vec![5.0]);
    }

    #[test]
    fn pulse_resolved_trains_get_per_pulse_foms() {
        let snapshot = roi_snapshot(&[
            ("region1", "[0, 0, 1, 1]"),
            ("activated1", "True"),
            ("fom_reduction", "sum"),
        ]);
        let mut proc = RoiFomProcessor::new();
        proc.update(&snapshot).unwrap();

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
            ndarray::array![[[2.0_f32]], [[5.0]], [[7.0]]],
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
        let foms = bundle.processed.pulse.roi_fom.as_ref().unwrap();
        assert_eq!(foms.as_slice().unwrap(), &[2.0, 5.0, 7.0]);
    }

    #[test]
    fn roi_outside_the_image_records_zero_and_stays_configured() {
        let snapshot = roi_snapshot(&[("region1", "[100, 100, 4, 4]"), ("activated1", "True")]);
        let mut proc = RoiFomProcessor::new();
        proc.update(&snapshot).unwrap();

        let mut bundle = bundle_with_image(7, gradient_image(6));
        proc.process(&mut bundle).unwrap();

        let roi = &bundle.processed.roi;
        assert_eq!(roi.rects[0], None);
        assert_eq!(roi.roi1.fom, None);
        let (x, y, _) = roi.fom_hist[0].snapshot();
        assert_eq!((x.as_slice(), y.as_slice()), (&[7.0][..], &[0.0][..]));
    }

    #[test]
    fn roi1_roi2_arithmetic() {
        let snapshot = roi_snapshot(&[
            ("region1", "[0, 0, 2, 2]"),
            ("activated1", "True"),
            ("region2", "[2, 2, 2, 2]"),
            ("activated2", "True"),
            ("fom_reduction", "sum"),
        ]);
        let mut proc = RoiFomProcessor::new();
        proc.update(&snapshot).unwrap();

        let mut bundle = bundle_with_image(1, gradient_image(6));
        proc.process(&mut bundle).unwrap();

        let roi = &bundle.processed.roi;
        // sums: rows 0..2 x cols 0..2 -> 4; rows 2..4 x cols 2..4 -> 20
        assert_eq!(roi.roi1.fom, Some(4.0));
        assert_eq!(roi.roi2.fom, Some(20.0));
        assert_eq!(roi.roi1_sub_roi2.fom, Some(-16.0));
        assert_eq!(roi.roi1_add_roi2.fom, Some(24.0));
        let sub = roi.proj1_sub_proj2.vfom.as_ref().unwrap();
        assert_eq!(sub.len(), 2);
    }

    #[test]
    fn norm_aux_from_roi3_and_roi4() {
        let snapshot = roi_snapshot(&[
            ("region3", "[0, 0, 2, 2]"),
            ("activated3", "True"),
            ("region4", "[0, 0, 1, 1]"),
            ("activated4", "True"),
            ("fom_reduction", "sum"),
        ]);
        let mut proc = RoiFomProcessor::new();
        proc.update(&snapshot).unwrap();

        let mut bundle = bundle_with_image(1, gradient_image(6));
        proc.process(&mut bundle).unwrap();

        let aux = &bundle.processed.roi.aux;
        assert_eq!(aux.norm3, Some(4.0));
        assert_eq!(aux.norm4, Some(0.0));
        assert_eq!(aux.norm3_sub_norm4, Some(4.0));
        assert_eq!(aux.norm3_add_norm4, Some(4.0));
    }

    #[test]
    fn pump_probe_roi_fom_reduces_the_difference() {
        let snapshot = roi_snapshot(&[
            ("region1", "[0, 0, 2, 2]"),
            ("activated1", "True"),
            ("fom_reduction", "sum"),
        ]);
        let mut fom_proc = RoiFomProcessor::new();
        fom_proc.update(&snapshot).unwrap();
        let mut pp_proc = RoiPumpProbeProcessor::new();
        pp_proc.update(&snapshot).unwrap();

        let mut bundle = bundle_with_image(1, gradient_image(6));
        bundle.processed.pp.analysis_type = AnalysisType::RoiFom;
        bundle.processed.pp.abs_difference = true;
        bundle.processed.pp.image_on = Some(Array2::from_elem((6, 6), 3.0));
        bundle.processed.pp.image_off = Some(Array2::from_elem((6, 6), 1.0));

        fom_proc.process(&mut bundle).unwrap();
        pp_proc.process(&mut bundle).unwrap();
        // |3 - 1| summed over the 2x2 signal region
        assert_eq!(bundle.processed.pp.fom, Some(8.0));
    }

    #[test]
    fn pump_probe_mismatched_background_is_an_error() {
        let snapshot = roi_snapshot(&[
            ("region1", "[0, 0, 2, 2]"),
            ("activated1", "True"),
            ("region2", "[3, 3, 1, 2]"),
            ("activated2", "True"),
        ]);
        let mut fom_proc = RoiFomProcessor::new();
        fom_proc.update(&snapshot).unwrap();
        let mut pp_proc = RoiPumpProbeProcessor::new();
        pp_proc.update(&snapshot).unwrap();

        let mut bundle = bundle_with_image(1, gradient_image(6));
        bundle.processed.pp.analysis_type = AnalysisType::RoiFom;
        bundle.processed.pp.image_on = Some(Array2::zeros((6, 6)));
        bundle.processed.pp.image_off = Some(Array2::zeros((6, 6)));

        fom_proc.process(&mut bundle).unwrap();
        assert!(matches!(
            pp_proc.process(&mut bundle),
            Err(ProcessorError::Processing(_))
        ));
    }
}
