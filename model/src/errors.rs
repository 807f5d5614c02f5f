// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Data-model errors.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("image data must be 2-D or 3-D, got {0} axes")]
    InvalidDimensions(usize),
    #[error("sliced indices {0:?} do not match {1} images")]
    SlicedIndicesMismatch(Vec<usize>, usize),
    #[error("sliced indices contain duplicates")]
    DuplicateSlicedIndices,
    #[error("train-resolved data does not support sliced indices")]
    SlicedIndicesOnImage,
    #[error("image mask shape {actual:?} does not match image shape {expected:?}")]
    MaskShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("history resolution must be positive, got {0}")]
    NonPositiveResolution(f64),
    #[error("moving average window must be positive")]
    ZeroWindow,
}

pub type ModelResult<T> = Result<T, ModelError>;
