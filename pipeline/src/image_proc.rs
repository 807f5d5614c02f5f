// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Image conditioning.
//!
//! Turns the main-detector payload of a correlated train into
//! `ImageData.masked_mean` and friends: slicing, NaN-aware averaging,
//! dark-run accumulation, background/dark subtraction, threshold clamp,
//! pixel masking and pulse-of-interest materialization. Modular packets are
//! assembled into one image per pulse through the geometry collaborator
//! before conditioning.

use crate::{Flow, ProcessResult, Processor, ProcessorError};
use algorithms::{
    GeometryAssembler, Pixel, PositionedAssembler, apply_image_mask, apply_threshold_mask,
    nanmean_stack_sliced,
};
use config::{ConfigSnapshot, ImageConfig};
use correlator::{Correlated, SourceValue};
use model::{ImageData, MovingAverageStack};
use ndarray::{Array2, Array3, Axis};
use ndarray_npy::read_npy;
use sources::Payload;
use tracing::debug;

pub struct ImageProcessor {
    cfg: ImageConfig,
    assembler: Box<dyn GeometryAssembler>,
    /// Moving average over the raw pulse stack.
    ma: MovingAverageStack,
    /// Dark-run accumulator.
    dark: MovingAverageStack,
    dark_count: u32,
    /// Cached `(path, mask)` so the mask file is read once per change.
    mask: Option<(String, Array2<bool>)>,
    reference: Option<Array2<Pixel>>,
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cfg: ImageConfig::default(),
            assembler: Box::new(PositionedAssembler::stacked(1, (0, 0))),
            ma: MovingAverageStack::new(1),
            dark: MovingAverageStack::new(u32::MAX),
            dark_count: 0,
            mask: None,
            reference: None,
        }
    }

    #[must_use]
    pub fn with_assembler(mut self, assembler: impl GeometryAssembler + 'static) -> Self {
        self.assembler = Box::new(assembler);
        self
    }

    pub fn set_reference(&mut self, reference: Option<Array2<Pixel>>) {
        self.reference = reference;
    }

    /// Pull the detector payload out of the bundle as a pulse stack.
    ///
    /// A train-resolved 2-D image becomes a single-pulse stack so one code
    /// path conditions both; modular payloads are assembled per train.
    fn detector_stack(&self, bundle: &Correlated) -> Result<Array3<Pixel>, ProcessorError> {
        let key = bundle.catalog.main_detector().ok_or_else(|| {
            ProcessorError::Processing("no main detector in the catalog".to_string())
        })?;
        let item = bundle
            .catalog
            .get(key)
            .ok_or_else(|| ProcessorError::Processing(format!("unknown source '{key}'")))?;

        match bundle.raw.get(key) {
            Some(SourceValue::Single(Payload::ImageStack(stack))) => Ok(stack.clone()),
            Some(SourceValue::Single(Payload::Image(image))) => Ok(image
                .clone()
                .insert_axis(Axis(0))),
            Some(SourceValue::Modular(modules)) => {
                let mut planes = std::collections::HashMap::new();
                for (&idx, properties) in modules {
                    let payload = properties.get(item.property()).or_else(|| {
                        properties.get(&format!("{}.value", item.property()))
                    });
                    match payload {
                        Some(Payload::Image(img)) => {
                            planes.insert(idx, img.clone());
                        }
                        _ => {
                            return Err(ProcessorError::Processing(format!(
                                "module {idx} of '{key}' carries no image"
                            )));
                        }
                    }
                }
                let assembled = self
                    .assembler
                    .assemble(&planes)
                    .map_err(|e| ProcessorError::Processing(e.to_string()))?;
                Ok(assembled.insert_axis(Axis(0)))
            }
            _ => Err(ProcessorError::Processing(format!(
                "detector source '{key}' missing from the train"
            ))),
        }
    }

    /// Background, dark, threshold and pixel mask, in that order.
    fn condition(&self, image: &mut Array2<Pixel>) -> Result<(), ProcessorError> {
        if self.cfg.background != 0.0 {
            let background = self.cfg.background as Pixel;
            image.mapv_inplace(|v| v - background);
        }
        if self.cfg.dark_subtraction
            && let Some(dark_mean) = self.dark_mean()
        {
            if dark_mean.dim() != image.dim() {
                return Err(ProcessorError::Processing(format!(
                    "dark mean shape {:?} does not match image shape {:?}",
                    dark_mean.dim(),
                    image.dim()
                )));
            }
            *image -= &dark_mean;
        }
        let (lo, hi) = self.cfg.threshold_mask;
        apply_threshold_mask(image, lo as Pixel, hi as Pixel);
        if let Some((_, mask)) = &self.mask {
            apply_image_mask(image, &mask.view())
                .map_err(|e| ProcessorError::Processing(e.to_string()))?;
        }
        Ok(())
    }

    fn dark_mean(&self) -> Option<Array2<Pixel>> {
        self.dark
            .get()
            .map(|stack| algorithms::nanmean_stack(&stack.view()))
    }
}

impl Processor for ImageProcessor {
    fn name(&self) -> &'static str {
        "image"
    }

    fn update(&mut self, cfg: &ConfigSnapshot) -> Result<(), ProcessorError> {
        let next = cfg.image.clone();

        if next.ma_window != self.cfg.ma_window {
            self.ma.set_window(next.ma_window)
                .map_err(|e| ProcessorError::Processing(e.to_string()))?;
        }

        // leaving dark-recording mode freezes the accumulator; re-entering
        // starts a fresh dark run
        if next.recording_dark && !self.cfg.recording_dark {
            self.dark.clear();
            self.dark_count = 0;
        }

        match (&next.mask_file, &self.mask) {
            (None, _) => self.mask = None,
            (Some(path), Some((cached, _))) if cached == path => {}
            (Some(path), _) => {
                let mask: Array2<bool> = read_npy(path).map_err(|e| {
                    ProcessorError::Processing(format!("cannot read image mask '{path}': {e}"))
                })?;
                debug!(path, "image mask loaded");
                self.mask = Some((path.clone(), mask));
            }
        }

        self.cfg = next;
        Ok(())
    }

    fn process(&mut self, bundle: &mut Correlated) -> ProcessResult {
        let tid = bundle.tid();
        let stack = self.detector_stack(bundle)?;
        let n_pulses = stack.len_of(Axis(0));

        let mut image = ImageData::new(bundle.processed.image.pixel_size());
        image.background = self.cfg.background;
        image.threshold_mask = Some((
            self.cfg.threshold_mask.0 as Pixel,
            self.cfg.threshold_mask.1 as Pixel,
        ));
        image.image_mask = self.mask.as_ref().map(|(_, mask)| mask.clone());
        image.reference = self.reference.clone();
        image.poi_indices = self.cfg.poi_indices;

        if self.cfg.recording_dark {
            // dark trains feed the accumulator and skip the analysis path
            self.dark.push(&stack.view());
            self.dark_count += 1;
            image.dark_mean = self.dark_mean();
            image.n_dark_pulses = self.dark.n_pulses();
            image.dark_count = self.dark_count;
            bundle.processed.image = image;
            debug!(tid, count = self.dark_count, "dark train recorded");
            return Ok(Flow::Stop);
        }

        image.dark_mean = self.dark_mean();
        image.n_dark_pulses = self.dark.n_pulses();
        image.dark_count = self.dark_count;

        // analysis trains fold into the raw moving average; darks do not
        self.ma.push(&stack.view());
        let stack = self.ma.get().cloned().unwrap_or(stack);

        // surviving pulses: slicer first, then the pulse-index mask
        let sliced: Vec<usize> = self
            .cfg
            .pulse_slicer
            .indices(n_pulses)
            .into_iter()
            .filter(|&i| bundle.processed.pidx.is_kept(i))
            .collect();
        if sliced.is_empty() {
            return Err(ProcessorError::Processing(format!(
                "[{tid}] no pulses survive slicing"
            )));
        }

        let mean = nanmean_stack_sliced(&stack.view(), &sliced);
        image.mean = Some(mean.clone());

        let mut masked = mean;
        self.condition(&mut masked)?;
        image.masked_mean = Some(masked);

        image.images = vec![None; n_pulses];
        image.sliced_indices = sliced;
        for &poi in &self.cfg.poi_indices {
            if poi < n_pulses {
                let mut pulse = stack.index_axis(Axis(0), poi).to_owned();
                self.condition(&mut pulse)?;
                image.images[poi] = Some(pulse);
            }
        }

        bundle.processed.image = image;
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{MemoryStore, SharedState, SourceType, ns};
    use ndarray::array;
    use sources::{RawPacket, SourceCatalog, SourceCategory, SourceItem};

    fn detector_catalog() -> SourceCatalog {
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
        catalog
    }

    fn bundle_with_stack(tid: i64, stack: Array3<Pixel>) -> Correlated {
        let mut packet = RawPacket::new();
        packet.insert("DET", "image.data", stack, tid);
        let mut correlator = correlator::TrainCorrelator::new(detector_catalog());
        let (out, _) = correlator
            .correlate(&packet, SourceType::Calibrated)
            .unwrap();
        out.unwrap()
    }

    fn snapshot_from(store: &MemoryStore) -> ConfigSnapshot {
        let mut snapshot = ConfigSnapshot::default();
        snapshot.refresh(store).unwrap();
        snapshot
    }

    #[test]
    fn stack_reduces_to_masked_mean() {
        let stack = array![[[2.0_f32, 4.0]], [[6.0, 8.0]]];
        let mut bundle = bundle_with_stack(1, stack);

        let mut proc = ImageProcessor::new();
        proc.update(&ConfigSnapshot::default()).unwrap();
        assert_eq!(proc.process(&mut bundle).unwrap(), Flow::Continue);

        let image = &bundle.processed.image;
        assert_eq!(image.n_images(), 2);
        assert_eq!(image.sliced_indices, vec![0, 1]);
        assert_eq!(image.mean.as_ref().unwrap(), &array![[4.0, 6.0]]);
        assert_eq!(image.masked_mean.as_ref().unwrap(), &array![[4.0, 6.0]]);
        // default POI materializes pulse 0, conditioned
        assert_eq!(image.images[0].as_ref().unwrap(), &array![[2.0, 4.0]]);
        assert!(image.images[1].is_none());
    }

    #[test]
    fn background_and_threshold_are_applied_in_order() {
        let store = MemoryStore::new();
        store.hset(ns::IMAGE, "background", "1");
        store.hset(ns::IMAGE, "threshold_mask", "(2, 5)");
        let snapshot = snapshot_from(&store);

        let stack = array![[[2.0_f32, 4.0]], [[6.0, 10.0]]];
        let mut bundle = bundle_with_stack(1, stack);
        let mut proc = ImageProcessor::new();
        proc.update(&snapshot).unwrap();
        proc.process(&mut bundle).unwrap();

        // mean [4, 7] -> -1 background -> [3, 6] -> clamp [2, 5] -> [3, 5]
        assert_eq!(
            bundle.processed.image.masked_mean.as_ref().unwrap(),
            &array![[3.0, 5.0]]
        );
    }

    #[test]
    fn clearing_the_threshold_restores_the_plain_mean() {
        let store = MemoryStore::new();
        store.hset(ns::IMAGE, "threshold_mask", "(2, 5)");
        let mut proc = ImageProcessor::new();
        proc.update(&snapshot_from(&store)).unwrap();

        let stack = array![[[0.0_f32, 10.0]]];
        let mut bundle = bundle_with_stack(1, stack.clone());
        proc.process(&mut bundle).unwrap();
        assert_eq!(
            bundle.processed.image.masked_mean.as_ref().unwrap(),
            &array![[2.0, 5.0]]
        );

        store.hset(ns::IMAGE, "threshold_mask", "(-inf, inf)");
        proc.update(&snapshot_from(&store)).unwrap();
        let mut bundle = bundle_with_stack(2, stack);
        proc.process(&mut bundle).unwrap();
        assert_eq!(
            bundle.processed.image.masked_mean.as_ref().unwrap(),
            bundle.processed.image.mean.as_ref().unwrap()
        );
    }

    #[test]
    fn dark_recording_skips_analysis_and_accumulates() {
        let store = MemoryStore::new();
        store.hset(ns::IMAGE, "recording_dark", "True");
        let snapshot = snapshot_from(&store);

        let mut proc = ImageProcessor::new();
        proc.update(&snapshot).unwrap();

        let mut bundle = bundle_with_stack(1, array![[[2.0_f32]], [[4.0]]]);
        assert_eq!(proc.process(&mut bundle).unwrap(), Flow::Stop);
        assert_eq!(bundle.processed.image.dark_count, 1);
        assert_eq!(bundle.processed.image.n_dark_pulses, 2);
        assert!(bundle.processed.image.masked_mean.is_none());

        let mut bundle = bundle_with_stack(2, array![[[4.0_f32]], [[8.0]]]);
        proc.process(&mut bundle).unwrap();
        assert_eq!(bundle.processed.image.dark_count, 2);
        // dark mean averages both trains, then both pulses
        assert_eq!(
            bundle.processed.image.dark_mean.as_ref().unwrap(),
            &array![[4.5]]
        );

        // with recording off the accumulated dark is subtracted
        let store = MemoryStore::new();
        store.hset(ns::IMAGE, "recording_dark", "False");
        proc.update(&snapshot_from(&store)).unwrap();
        let mut bundle = bundle_with_stack(3, array![[[10.0_f32]], [[10.0]]]);
        proc.process(&mut bundle).unwrap();
        assert_eq!(
            bundle.processed.image.masked_mean.as_ref().unwrap(),
            &array![[5.5]]
        );
    }

    #[test]
    fn pulse_slicer_restricts_the_mean() {
        let store = MemoryStore::new();
        store.hset(ns::IMAGE, "pulse_slicer", "[0, None, 2]");
        let snapshot = snapshot_from(&store);

        let stack = array![[[0.0_f32]], [[10.0]], [[20.0]], [[30.0]]];
        let mut bundle = bundle_with_stack(1, stack);
        let mut proc = ImageProcessor::new();
        proc.update(&snapshot).unwrap();
        proc.process(&mut bundle).unwrap();

        assert_eq!(bundle.processed.image.sliced_indices, vec![0, 2]);
        assert_eq!(
            bundle.processed.image.mean.as_ref().unwrap(),
            &array![[10.0]]
        );
    }

    #[test]
    fn mask_shape_mismatch_is_a_processing_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.npy");
        let mask = array![[false, true, false]];
        ndarray_npy::write_npy(&path, &mask).unwrap();

        let store = MemoryStore::new();
        store.hset(ns::IMAGE, "image_mask", path.to_str().unwrap());
        let snapshot = snapshot_from(&store);

        let mut proc = ImageProcessor::new();
        proc.update(&snapshot).unwrap();
        let mut bundle = bundle_with_stack(1, array![[[1.0_f32, 2.0]]]);
        assert!(matches!(
            proc.process(&mut bundle),
            Err(ProcessorError::Processing(_))
        ));
    }

    #[test]
    fn mask_file_zeroes_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.npy");
        let mask = array![[false, true]];
        ndarray_npy::write_npy(&path, &mask).unwrap();

        let store = MemoryStore::new();
        store.hset(ns::IMAGE, "image_mask", path.to_str().unwrap());
        let snapshot = snapshot_from(&store);

        let mut proc = ImageProcessor::new();
        proc.update(&snapshot).unwrap();
        let mut bundle = bundle_with_stack(1, array![[[3.0_f32, 7.0]]]);
        proc.process(&mut bundle).unwrap();
        assert_eq!(
            bundle.processed.image.masked_mean.as_ref().unwrap(),
            &array![[3.0, 0.0]]
        );
    }
}
