// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Per-train image data.

use crate::{ModelError, ModelResult};
use algorithms::{Pixel, mask_image, nanmean_stack};
use ndarray::{Array2, Array3, Axis};
use std::collections::BTreeSet;

/// Default detector pixel size in meters.
pub const DEFAULT_PIXEL_SIZE: f64 = 0.5e-3;

/// Raw image input accepted by [`ImageData::from_array`]: a single
/// train-resolved image or a pulse-resolved stack.
#[derive(Debug, Clone)]
pub enum ImageArray {
    Single(Array2<Pixel>),
    Stack(Array3<Pixel>),
}

impl From<Array2<Pixel>> for ImageArray {
    fn from(arr: Array2<Pixel>) -> Self {
        ImageArray::Single(arr)
    }
}

impl From<Array3<Pixel>> for ImageArray {
    fn from(arr: Array3<Pixel>) -> Self {
        ImageArray::Stack(arr)
    }
}

/// Construction options for [`ImageData::from_array`].
#[derive(Debug, Clone, Default)]
pub struct ImageDataOptions {
    pub background: f64,
    pub image_mask: Option<Array2<bool>>,
    pub threshold_mask: Option<(Pixel, Pixel)>,
    pub sliced_indices: Option<Vec<usize>>,
    pub poi_indices: Option<[usize; 2]>,
}

/// Image data for one train.
///
/// `images` is sparse: only pulses of interest are materialized, everything
/// else stays `None` so a 3-D train does not cost per-pulse copies.
#[derive(Debug, Clone)]
pub struct ImageData {
    pixel_size: f64,
    pub images: Vec<Option<Array2<Pixel>>>,
    /// Original pulse positions that survived slicing; always the same
    /// length as `images`.
    pub sliced_indices: Vec<usize>,
    pub poi_indices: [usize; 2],
    pub background: f64,
    pub dark_mean: Option<Array2<Pixel>>,
    pub n_dark_pulses: usize,
    pub dark_count: u32,
    pub image_mask: Option<Array2<bool>>,
    pub threshold_mask: Option<(Pixel, Pixel)>,
    pub reference: Option<Array2<Pixel>>,
    /// Raw per-train average image.
    pub mean: Option<Array2<Pixel>>,
    /// `mean` after background subtraction, threshold clamp and pixel mask.
    pub masked_mean: Option<Array2<Pixel>>,
}

impl Default for ImageData {
    fn default() -> Self {
        Self::new(DEFAULT_PIXEL_SIZE)
    }
}

impl ImageData {
    #[must_use]
    pub fn new(pixel_size: f64) -> Self {
        Self {
            pixel_size,
            images: Vec::new(),
            sliced_indices: Vec::new(),
            poi_indices: [0, 0],
            background: 0.0,
            dark_mean: None,
            n_dark_pulses: 0,
            dark_count: 0,
            image_mask: None,
            threshold_mask: None,
            reference: None,
            mean: None,
            masked_mean: None,
        }
    }

    #[must_use]
    pub fn pixel_size(&self) -> f64 {
        self.pixel_size
    }

    #[must_use]
    pub fn n_images(&self) -> usize {
        self.images.len()
    }

    /// Build a self-consistent `ImageData` from a raw array.
    ///
    /// For a stack, `sliced_indices` must be duplicate-free and match the
    /// number of pulses; a single image rejects them altogether. Pulses of
    /// interest outside the stack are skipped silently.
    pub fn from_array(arr: impl Into<ImageArray>, opts: ImageDataOptions) -> ModelResult<Self> {
        let mut data = Self::new(DEFAULT_PIXEL_SIZE);
        let poi_indices = opts.poi_indices.unwrap_or([0, 0]);

        match arr.into() {
            ImageArray::Stack(stack) => {
                let n_images = stack.len_of(Axis(0));
                data.images = vec![None; n_images];
                for &i in &poi_indices {
                    if i < n_images {
                        data.images[i] = Some(stack.index_axis(Axis(0), i).to_owned());
                    }
                }

                data.mean = Some(nanmean_stack(&stack.view()));

                data.sliced_indices = match opts.sliced_indices {
                    None => (0..n_images).collect(),
                    Some(indices) => {
                        let unique: BTreeSet<usize> = indices.iter().copied().collect();
                        if unique.len() != indices.len() {
                            return Err(ModelError::DuplicateSlicedIndices);
                        }
                        if indices.len() != n_images {
                            return Err(ModelError::SlicedIndicesMismatch(indices, n_images));
                        }
                        indices
                    }
                };
            }
            ImageArray::Single(img) => {
                if opts.sliced_indices.is_some() {
                    return Err(ModelError::SlicedIndicesOnImage);
                }
                data.images = vec![None];
                data.sliced_indices = vec![0];
                data.mean = Some(img);
            }
        }

        data.poi_indices = poi_indices;
        data.background = opts.background;

        let mut masked = data.mean.clone().unwrap_or_default();
        if opts.background != 0.0 {
            masked.mapv_inplace(|v| v - opts.background as Pixel);
        }
        let expected = masked.dim();
        let mask_view = opts.image_mask.as_ref().map(|mask| mask.view());
        mask_image(&mut masked, opts.threshold_mask, mask_view.as_ref()).map_err(|_| {
            ModelError::MaskShapeMismatch {
                expected,
                actual: opts.image_mask.as_ref().map_or((0, 0), |mask| mask.dim()),
            }
        })?;
        data.masked_mean = Some(masked);
        data.image_mask = opts.image_mask;
        data.threshold_mask = opts.threshold_mask;

        Ok(data)
    }
}
