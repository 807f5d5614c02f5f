// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Metric names and their one-time registration.

use metrics::{Unit, describe_counter};
use tracing::debug;

pub const CORRELATED: &str = "beamline_trains_correlated_total";
pub const DROPPED: &str = "beamline_trains_dropped_total";
pub const PROCESSED: &str = "beamline_trains_processed_total";
pub const PROCESSING_ERRORS: &str = "beamline_processing_errors_total";
pub const UNKNOWN_PARAMETERS: &str = "beamline_unknown_parameters_total";

/// Describe every counter to the installed recorder. Call once after the
/// exporter is up; calling with no recorder installed is harmless.
pub fn register() {
    describe_counter!(
        CORRELATED,
        Unit::Count,
        "trains assembled from all catalog sources"
    );
    describe_counter!(
        DROPPED,
        Unit::Count,
        "trains dropped from the correlator buffer before completion"
    );
    describe_counter!(
        PROCESSED,
        Unit::Count,
        "trains fully run through the processor chain"
    );
    describe_counter!(
        PROCESSING_ERRORS,
        Unit::Count,
        "recoverable per-train processing failures"
    );
    describe_counter!(
        UNKNOWN_PARAMETERS,
        Unit::Count,
        "configuration values naming unimplemented analyses"
    );
    debug!("telemetry counters described");
}
