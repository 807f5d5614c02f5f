// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Source descriptors.

use crate::PulseSlicer;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("modular device '{0}' requires a non-empty module set")]
    ModulesRequired(String),
    #[error("device '{0}' has no wildcard but a module set was given")]
    ModulesForbidden(String),
    #[error("device '{0}' has more than one wildcard")]
    MalformedWildcard(String),
}

/// Category of a source, used to pick defaults and the main detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceCategory {
    Detector,
    Xgm,
    Control,
}

/// Descriptor of one logical source.
///
/// A device name containing a single `*` denotes a segmented detector whose
/// per-module devices are obtained by substituting each module index for the
/// wildcard; the module set must then be non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceItem {
    category: SourceCategory,
    name: String,
    modules: BTreeSet<usize>,
    property: String,
    slicer: Option<PulseSlicer>,
    vrange: (f64, f64),
}

impl SourceItem {
    pub fn new(
        category: SourceCategory,
        name: impl Into<String>,
        modules: impl IntoIterator<Item = usize>,
        property: impl Into<String>,
        slicer: Option<PulseSlicer>,
        vrange: (f64, f64),
    ) -> Result<Self, SourceError> {
        let name = name.into();
        let modules: BTreeSet<usize> = modules.into_iter().collect();
        match name.matches('*').count() {
            0 if !modules.is_empty() => return Err(SourceError::ModulesForbidden(name)),
            1 if modules.is_empty() => return Err(SourceError::ModulesRequired(name)),
            0 | 1 => {}
            _ => return Err(SourceError::MalformedWildcard(name)),
        }
        Ok(Self {
            category,
            name,
            modules,
            property: property.into(),
            slicer,
            vrange,
        })
    }

    #[must_use]
    pub fn category(&self) -> SourceCategory {
        self.category
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_modular(&self) -> bool {
        !self.modules.is_empty()
    }

    #[must_use]
    pub fn modules(&self) -> &BTreeSet<usize> {
        &self.modules
    }

    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }

    #[must_use]
    pub fn slicer(&self) -> Option<&PulseSlicer> {
        self.slicer.as_ref()
    }

    /// Acceptance range consulted by the pulse filter.
    #[must_use]
    pub fn vrange(&self) -> (f64, f64) {
        self.vrange
    }

    /// Device names obtained by expanding the wildcard over the module set.
    ///
    /// Non-modular sources yield their device name unchanged.
    pub fn module_names(&self) -> impl Iterator<Item = (usize, String)> + '_ {
        let (prefix, suffix) = self.name.split_once('*').unwrap_or((self.name.as_str(), ""));
        self.modules
            .iter()
            .map(move |&idx| (idx, format!("{prefix}{idx}{suffix}")))
    }
}
