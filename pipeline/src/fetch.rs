// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Property lookup over a correlated bundle.

use correlator::Correlated;
use sources::{Payload, TrainId};

/// Value resolved by [`fetch_property`].
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<'a> {
    /// The train id itself (device name `"Any"`).
    Tid(TrainId),
    Value(&'a Payload),
}

impl Fetched<'_> {
    /// Scalar view used by correlation and binning x-values.
    #[must_use]
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Fetched::Tid(tid) => Some(*tid as f64),
            Fetched::Value(payload) => payload.scalar_like(),
        }
    }
}

/// Resolve `(device, property)` against a correlated bundle.
///
/// Returns `(value, reason)`:
/// - an empty device or property is "not activated", not an error:
///   `(None, "")`;
/// - device `"Any"` resolves to the train id;
/// - otherwise the catalog entries for `device` are searched, accepting the
///   exact property path first and the `".value"` flavour second;
/// - a missing device or property yields `None` plus a human-readable
///   reason.
#[must_use]
pub fn fetch_property<'a>(
    bundle: &'a Correlated,
    device: &str,
    property: &str,
) -> (Option<Fetched<'a>>, String) {
    let tid = bundle.tid();

    if device.is_empty() || property.is_empty() {
        return (None, String::new());
    }
    if device == "Any" {
        return (Some(Fetched::Tid(tid)), String::new());
    }

    let mut device_seen = false;
    for (key, item) in bundle.catalog.iter() {
        if item.name() != device {
            continue;
        }
        device_seen = true;
        // plain property path first, ".value" flavour second
        if item.property() == property || item.property() == format!("{property}.value") {
            if let Some(payload) = bundle.raw.get(key).and_then(correlator::SourceValue::as_single)
            {
                return (Some(Fetched::Value(payload)), String::new());
            }
        }
    }

    if device_seen {
        (
            None,
            format!("[{tid}] '{device}' does not contain property '{property}'"),
        )
    } else {
        (
            None,
            format!("[{tid}] source '{device}' is not in the data!"),
        )
    }
}
