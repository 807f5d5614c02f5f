// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Train correlator.
//!
//! Raw packets arrive as `(values, metadata)` keyed by device name; what the
//! processor chain needs is one bundle per train covering every catalog
//! source. [`TrainCorrelator`] projects each packet through the catalog
//! ([`transform`]) and groups the results by train id with a strictly
//! bounded buffer: when a train completes it is emitted and everything
//! older is dropped, and when the buffer overflows the oldest train is
//! dropped. Every dropped train id is reported exactly once.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod bundle;
mod correlate;
mod transform;

pub use bundle::*;
pub use correlate::*;
pub use transform::*;

use sources::TrainId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorrelatorError {
    /// The raw feed is inconsistent; there is no way to continue.
    #[error("packet carries multiple train ids: {0:?}")]
    MixedTrainIds(Vec<TrainId>),
}
