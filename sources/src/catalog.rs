// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Ordered catalog of the sources a complete train must cover.

use crate::{SourceCategory, SourceItem};
use ordermap::OrderMap;

/// Insertion-ordered map from source key to descriptor.
///
/// Iteration order is stable, which keeps correlation bookkeeping and log
/// output deterministic across trains.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceCatalog {
    items: OrderMap<String, SourceItem>,
    main_detector: Option<String>,
}

impl SourceCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source. The first detector-category source becomes the
    /// main detector unless one was already designated.
    pub fn add(&mut self, key: impl Into<String>, item: SourceItem) {
        let key = key.into();
        if self.main_detector.is_none() && item.category() == SourceCategory::Detector {
            self.main_detector = Some(key.clone());
        }
        self.items.insert(key, item);
    }

    pub fn remove(&mut self, key: &str) -> Option<SourceItem> {
        if self.main_detector.as_deref() == Some(key) {
            self.main_detector = None;
        }
        self.items.remove(key)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&SourceItem> {
        self.items.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    #[must_use]
    pub fn main_detector(&self) -> Option<&str> {
        self.main_detector.as_deref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SourceItem)> {
        self.items.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.items.keys()
    }
}
