// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Hash and channel names used in the shared-state backend.
//!
//! One hash per concern; publish/subscribe channels are namespaced the same
//! way so a control surface can notify the pipeline of resets without
//! polling.

/// Hash names, one per processor concern.
pub mod ns {
    pub const GLOBAL: &str = "meta:proc:global";
    pub const IMAGE: &str = "meta:proc:image";
    pub const PUMP_PROBE: &str = "meta:proc:pump_probe";
    pub const ROI: &str = "meta:proc:roi";
    pub const AZIMUTHAL_INTEG: &str = "meta:proc:azimuthal_integ";
    pub const CORRELATION: &str = "meta:proc:correlation";
    pub const BIN: &str = "meta:proc:bin";
    pub const STATISTICS: &str = "meta:proc:statistics";
    pub const PULSE_FILTER: &str = "meta:proc:pulse_filter";

    /// All hashes fetched by the per-train snapshot, in fetch order.
    pub const ALL: [&str; 9] = [
        GLOBAL,
        IMAGE,
        PUMP_PROBE,
        ROI,
        AZIMUTHAL_INTEG,
        CORRELATION,
        BIN,
        STATISTICS,
        PULSE_FILTER,
    ];
}

/// Publish/subscribe channels.
pub mod channel {
    pub const ANALYSIS: &str = "channel:analysis";
    pub const PUMP_PROBE: &str = "channel:pump_probe";
    pub const CORRELATION: &str = "channel:correlation";
    pub const BIN: &str = "channel:bin";
}
