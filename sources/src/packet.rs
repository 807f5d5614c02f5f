// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Raw packet shapes delivered by the transport.

use crate::{Payload, TrainId};
use std::collections::HashMap;

/// Properties of one device in one packet.
pub type PropertyMap = HashMap<String, Payload>;

/// `device -> {property -> payload}` for one packet.
pub type RawValues = HashMap<String, PropertyMap>;

/// Per-device metadata attached to a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceMeta {
    /// Train id stamped by the timing system ("timestamp.tid" upstream).
    pub tid: TrainId,
}

/// `device -> metadata` for one packet.
pub type RawMeta = HashMap<String, DeviceMeta>;

/// One `(values, metadata)` packet from the raw feed.
#[derive(Debug, Clone, Default)]
pub struct RawPacket {
    pub values: RawValues,
    pub meta: RawMeta,
}

impl RawPacket {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one property for a device, stamping the train id.
    pub fn insert(
        &mut self,
        device: impl Into<String>,
        property: impl Into<String>,
        payload: impl Into<Payload>,
        tid: TrainId,
    ) {
        let device = device.into();
        self.values
            .entry(device.clone())
            .or_default()
            .insert(property.into(), payload.into());
        self.meta.insert(device, DeviceMeta { tid });
    }
}
