// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Errors shared by the numeric kernels.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlgorithmError {
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("normalization integral is zero")]
    ZeroIntegral,
    #[error("invalid range: ({0}, {1})")]
    InvalidRange(f64, f64),
    #[error("unknown integration method '{0}'")]
    UnknownMethod(String),
    #[error("module {0} missing from assembly input")]
    MissingModule(usize),
}

pub type AlgorithmResult<T> = Result<T, AlgorithmError>;
