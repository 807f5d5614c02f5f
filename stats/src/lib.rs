// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Pipeline telemetry.
//!
//! Thin wrappers over the `metrics` facade so call sites stay one-liners
//! and the metric names live in one place. The binary installs the actual
//! recorder (Prometheus exporter); without one these are no-ops.

#![deny(clippy::all, clippy::pedantic)]

mod register;

pub use register::*;

use metrics::counter;

/// Trains emitted by the correlator.
pub fn train_correlated() {
    counter!(CORRELATED).increment(1);
}

/// Trains that left the correlator buffer uncorrelated.
pub fn trains_dropped(n: usize) {
    counter!(DROPPED).increment(n as u64);
}

/// Trains that made it through the processor chain.
pub fn train_processed() {
    counter!(PROCESSED).increment(1);
}

/// Recoverable per-train processing failures.
pub fn processing_error() {
    counter!(PROCESSING_ERRORS).increment(1);
}

/// Configuration referencing something this build does not implement.
pub fn unknown_parameter() {
    counter!(UNKNOWN_PARAMETERS).increment(1);
}
