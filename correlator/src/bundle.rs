// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Transformed and correlated bundle shapes.

use config::SourceType;
use model::ProcessedData;
use sources::{Payload, PropertyMap, SourceCatalog, TrainId};
use std::collections::HashMap;

/// Metadata attached to every retained source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMeta {
    pub train_id: TrainId,
    pub source_type: SourceType,
}

/// Values of one retained source after catalog projection.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    /// The resolved property payload of a plain source.
    Single(Payload),
    /// Per-module property maps of a segmented detector, keyed by module
    /// index. Modules accumulate across packets of the same train.
    Modular(HashMap<usize, PropertyMap>),
}

impl SourceValue {
    #[must_use]
    pub fn as_single(&self) -> Option<&Payload> {
        match self {
            SourceValue::Single(payload) => Some(payload),
            SourceValue::Modular(_) => None,
        }
    }

    #[must_use]
    pub fn as_modular(&self) -> Option<&HashMap<usize, PropertyMap>> {
        match self {
            SourceValue::Single(_) => None,
            SourceValue::Modular(modules) => Some(modules),
        }
    }
}

/// `source key -> value` for the retained sources of one train.
pub type SourceValues = HashMap<String, SourceValue>;

/// `source key -> metadata` for the retained sources of one train.
pub type SourceMetaMap = HashMap<String, SourceMeta>;

/// One complete train as handed to the processor chain.
#[derive(Debug)]
pub struct Correlated {
    /// Snapshot of the catalog the train was correlated against.
    pub catalog: SourceCatalog,
    pub meta: SourceMetaMap,
    pub raw: SourceValues,
    /// Fresh processed-data object keyed to this train.
    pub processed: ProcessedData,
}

impl Correlated {
    #[must_use]
    pub fn tid(&self) -> TrainId {
        self.processed.tid()
    }
}
