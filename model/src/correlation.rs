// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Correlation slots and their tagged-variant histories.

use crate::{AccumulatedPairData, DataStat, HistoryInfo, ModelResult, PairData};
use std::sync::Arc;

/// Backing store of one correlation slot.
///
/// Zero resolution keeps the raw pair stream; a positive resolution folds
/// samples into resolution-wide bins. Reconfiguring a slot swaps the
/// variant and discards the old samples.
#[derive(Debug)]
pub enum CorrelationHistory {
    Raw(PairData),
    Accumulated(AccumulatedPairData),
}

/// Point-in-time reading of a correlation history.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryReading {
    Raw { x: Vec<f64>, y: Vec<f64> },
    Binned { x: Vec<f64>, stat: DataStat },
}

impl CorrelationHistory {
    /// Build the variant matching `info.resolution`.
    pub fn for_info(info: HistoryInfo) -> ModelResult<Self> {
        if info.resolution > 0.0 {
            Ok(Self::Accumulated(AccumulatedPairData::new(info)?))
        } else {
            Ok(Self::Raw(PairData::new(info)))
        }
    }

    #[must_use]
    pub fn info(&self) -> &HistoryInfo {
        match self {
            Self::Raw(h) => h.info(),
            Self::Accumulated(h) => h.info(),
        }
    }

    pub fn push(&self, x: f64, y: f64) {
        match self {
            Self::Raw(h) => h.push(x, y),
            Self::Accumulated(h) => h.push(x, y),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> (HistoryReading, HistoryInfo) {
        match self {
            Self::Raw(h) => {
                let (x, y, info) = h.snapshot();
                (HistoryReading::Raw { x, y }, info)
            }
            Self::Accumulated(h) => {
                let (x, stat, info) = h.snapshot();
                (HistoryReading::Binned { x, stat }, info)
            }
        }
    }

    pub fn clear(&self) {
        match self {
            Self::Raw(h) => h.clear(),
            Self::Accumulated(h) => h.clear(),
        }
    }
}

/// One correlation slot as published per train.
#[derive(Debug, Clone, Default)]
pub struct CorrelationSlotData {
    /// The slow value read for this train.
    pub x: Option<f64>,
    /// The FOM paired with it.
    pub y: Option<f64>,
    pub device_id: String,
    pub property: String,
    pub resolution: f64,
    /// Handle onto the process-long history, absent while unconfigured.
    pub hist: Option<Arc<CorrelationHistory>>,
}

/// The four correlation slots.
#[derive(Debug, Clone, Default)]
pub struct CorrelationData {
    pub slots: [CorrelationSlotData; 4],
}
