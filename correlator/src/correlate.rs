// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Train-id correlation with a bounded buffer.

use crate::{
    Correlated, CorrelatorError, SourceMetaMap, SourceValue, SourceValues, transform,
};
use config::SourceType;
use model::ProcessedData;
use ordermap::OrderMap;
use sources::{RawPacket, SourceCatalog, TrainId};
use tracing::{debug, trace};

#[derive(Debug, Default)]
struct TrainBucket {
    meta: SourceMetaMap,
    raw: SourceValues,
}

impl TrainBucket {
    /// Merge a transformed packet in. Modular sources accumulate modules
    /// across packets; everything else is replaced by the newest packet.
    fn merge(&mut self, meta: SourceMetaMap, raw: SourceValues) {
        self.meta.extend(meta);
        for (key, value) in raw {
            match (self.raw.get_mut(&key), value) {
                (Some(SourceValue::Modular(have)), SourceValue::Modular(new)) => {
                    have.extend(new);
                }
                (slot, value) => {
                    if let Some(slot) = slot {
                        *slot = value;
                    } else {
                        self.raw.insert(key, value);
                    }
                }
            }
        }
    }

    /// A train is complete when every catalog source reported in and every
    /// module of each segmented source has been collected.
    fn covers(&self, catalog: &SourceCatalog) -> bool {
        catalog.iter().all(|(key, item)| {
            if !self.meta.contains_key(key) {
                return false;
            }
            if item.is_modular() {
                matches!(
                    self.raw.get(key),
                    Some(SourceValue::Modular(modules)) if modules.len() == item.modules().len()
                )
            } else {
                true
            }
        })
    }
}

/// Groups transformed packets by train id and emits complete trains in
/// strictly increasing id order.
#[derive(Debug)]
pub struct TrainCorrelator {
    catalog: SourceCatalog,
    cached: OrderMap<TrainId, TrainBucket>,
    cache_size: usize,
    /// Latest correlated train id; -1 before the first emission.
    correlated_tid: TrainId,
}

impl TrainCorrelator {
    pub const DEFAULT_CACHE_SIZE: usize = 20;

    #[must_use]
    pub fn new(catalog: SourceCatalog) -> Self {
        Self::with_cache_size(catalog, Self::DEFAULT_CACHE_SIZE)
    }

    #[must_use]
    pub fn with_cache_size(catalog: SourceCatalog, cache_size: usize) -> Self {
        Self {
            catalog,
            cached: OrderMap::new(),
            cache_size,
            correlated_tid: -1,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn correlated_tid(&self) -> TrainId {
        self.correlated_tid
    }

    #[must_use]
    pub fn buffered(&self) -> usize {
        self.cached.len()
    }

    /// Transform one packet and fold it into the buffer.
    ///
    /// Returns the completed train, if any, together with every train id
    /// that left the buffer uncorrelated. Packets for trains at or below
    /// the latest correlated id are stale and ignored: emission order stays
    /// strictly increasing.
    pub fn correlate(
        &mut self,
        packet: &RawPacket,
        source_type: SourceType,
    ) -> Result<(Option<Correlated>, Vec<TrainId>), CorrelatorError> {
        let transformed = transform(packet, &self.catalog, source_type)?;
        let tid = transformed.tid;

        if tid <= 0 {
            return Ok((None, Vec::new()));
        }
        if tid <= self.correlated_tid {
            trace!(tid, latest = self.correlated_tid, "stale train ignored");
            return Ok((None, Vec::new()));
        }

        let mut dropped = Vec::new();

        let bucket = self.cached.entry(tid).or_default();
        bucket.merge(transformed.meta, transformed.raw);
        let complete = bucket.covers(&self.catalog);

        let correlated = if complete {
            // pop everything up to and including this train; the older ones
            // can no longer complete in order
            let mut bucket = None;
            while let Some((key, value)) = self.cached.remove_index(0) {
                if key == tid {
                    bucket = Some(value);
                    break;
                }
                dropped.push(key);
            }
            self.correlated_tid = tid;
            debug!(tid, dropped = dropped.len(), "train correlated");

            bucket.map(|bucket| Correlated {
                catalog: self.catalog.clone(),
                meta: bucket.meta,
                raw: bucket.raw,
                processed: ProcessedData::new(tid),
            })
        } else {
            None
        };

        while self.cached.len() > self.cache_size {
            if let Some((key, _)) = self.cached.remove_index(0) {
                debug!(tid = key, "train evicted from full correlator buffer");
                dropped.push(key);
            }
        }

        Ok((correlated, dropped))
    }

    /// Drop all buffered trains and forget the latest correlated id.
    pub fn reset(&mut self) {
        self.cached.clear();
        self.correlated_tid = -1;
    }
}
