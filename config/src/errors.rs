// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Configuration errors.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The backend handed out text that does not name anything we implement.
    /// Fatal for the affected train and surfaced to the operator.
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),
    /// A value failed to parse in its expected textual form.
    #[error("malformed value for '{key}': {text}")]
    Malformed { key: String, text: String },
    /// A structurally valid value violates a cross-field rule.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
