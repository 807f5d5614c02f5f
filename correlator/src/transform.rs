// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Catalog projection of raw packets.

use crate::{CorrelatorError, SourceMeta, SourceMetaMap, SourceValue, SourceValues};
use config::SourceType;
use sources::{RawPacket, SourceCatalog, TrainId};
use std::collections::BTreeSet;
use tracing::trace;

/// A packet rewritten against the catalog.
#[derive(Debug)]
pub struct Transformed {
    pub raw: SourceValues,
    pub meta: SourceMetaMap,
    /// Train id of the packet, or -1 when the packet carried no metadata.
    pub tid: TrainId,
}

/// Rewrite one raw packet against the catalog.
///
/// Sources not in the packet are skipped silently; they simply do not
/// complete the train. Property lookup tries the plain property path first
/// and retries with a `.value` suffix, in that order, to tolerate both
/// known feed flavours. A packet whose devices disagree on the train id is
/// a fatal feed inconsistency.
pub fn transform(
    packet: &RawPacket,
    catalog: &SourceCatalog,
    source_type: SourceType,
) -> Result<Transformed, CorrelatorError> {
    let tids: BTreeSet<TrainId> = packet.meta.values().map(|m| m.tid).collect();

    if tids.is_empty() {
        return Ok(Transformed {
            raw: SourceValues::new(),
            meta: SourceMetaMap::new(),
            tid: -1,
        });
    }
    if tids.len() > 1 {
        return Err(CorrelatorError::MixedTrainIds(tids.into_iter().collect()));
    }
    let tid = tids.into_iter().next().unwrap_or(-1);

    let mut raw = SourceValues::new();
    let mut meta = SourceMetaMap::new();

    for (key, item) in catalog.iter() {
        if item.is_modular() {
            let mut modules = std::collections::HashMap::new();
            for (idx, module_name) in item.module_names() {
                if let Some(properties) = packet.values.get(&module_name) {
                    modules.insert(idx, properties.clone());
                }
            }
            if modules.is_empty() {
                continue;
            }
            raw.insert(key.clone(), SourceValue::Modular(modules));
        } else {
            let Some(properties) = packet.values.get(item.name()) else {
                trace!(source = %key, tid, "device not in packet");
                continue;
            };
            // plain property first, then the ".value" flavour
            let payload = properties.get(item.property()).or_else(|| {
                properties.get(&format!("{}.value", item.property()))
            });
            let Some(payload) = payload else {
                trace!(source = %key, tid, "property not in packet");
                continue;
            };
            raw.insert(key.clone(), SourceValue::Single(payload.clone()));
        }
        meta.insert(
            key.clone(),
            SourceMeta {
                train_id: tid,
                source_type,
            },
        );
    }

    Ok(Transformed { raw, meta, tid })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sources::{SourceCategory, SourceItem};

    fn open_range() -> (f64, f64) {
        (f64::NEG_INFINITY, f64::INFINITY)
    }

    fn catalog() -> SourceCatalog {
        let mut catalog = SourceCatalog::new();
        catalog.add(
            "xgm",
            SourceItem::new(
                SourceCategory::Xgm,
                "SA1_XGM",
                [],
                "photonFlux",
                None,
                open_range(),
            )
            .unwrap(),
        );
        catalog.add(
            "detector",
            SourceItem::new(
                SourceCategory::Detector,
                "DET_*_CH0",
                [0, 1],
                "image.data",
                None,
                open_range(),
            )
            .unwrap(),
        );
        catalog
    }

    #[test]
    fn empty_packet_yields_sentinel_tid() {
        let out = transform(&RawPacket::new(), &catalog(), SourceType::Unknown).unwrap();
        assert_eq!(out.tid, -1);
        assert!(out.raw.is_empty() && out.meta.is_empty());
    }

    #[test]
    fn mixed_train_ids_are_fatal() {
        let mut packet = RawPacket::new();
        packet.insert("SA1_XGM", "photonFlux", 1.0, 100);
        packet.insert("OTHER", "x", 2.0, 101);
        assert_eq!(
            transform(&packet, &catalog(), SourceType::Unknown).unwrap_err(),
            CorrelatorError::MixedTrainIds(vec![100, 101])
        );
    }

    #[test]
    fn value_suffix_is_tried_second() {
        let mut packet = RawPacket::new();
        packet.insert("SA1_XGM", "photonFlux.value", 7.0, 100);
        let out = transform(&packet, &catalog(), SourceType::Unknown).unwrap();
        assert_eq!(
            out.raw["xgm"].as_single().and_then(sources::Payload::as_scalar),
            Some(7.0)
        );

        // when both flavours exist the plain path wins
        packet.insert("SA1_XGM", "photonFlux", 3.0, 100);
        let out = transform(&packet, &catalog(), SourceType::Unknown).unwrap();
        assert_eq!(
            out.raw["xgm"].as_single().and_then(sources::Payload::as_scalar),
            Some(3.0)
        );
    }

    #[test]
    fn modular_source_collects_present_modules() {
        let mut packet = RawPacket::new();
        packet.insert("DET_1_CH0", "image.data", 5.0, 100);
        let out = transform(&packet, &catalog(), SourceType::Calibrated).unwrap();
        let modules = out.raw["detector"].as_modular().unwrap();
        assert_eq!(modules.len(), 1);
        assert!(modules.contains_key(&1));
        assert_eq!(
            out.meta["detector"],
            SourceMeta {
                train_id: 100,
                source_type: SourceType::Calibrated
            }
        );
    }

    #[test]
    fn absent_sources_are_skipped_silently() {
        let mut packet = RawPacket::new();
        packet.insert("UNRELATED", "y", 0.0, 42);
        let out = transform(&packet, &catalog(), SourceType::Unknown).unwrap();
        assert_eq!(out.tid, 42);
        assert!(out.raw.is_empty());
    }
}
