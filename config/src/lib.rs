// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Configuration plumbing.
//!
//! Operators edit analysis parameters through a shared-state key/value
//! backend (one hash per concern, values serialized as text). Processors
//! never talk to the backend directly: the scheduler assembles a
//! [`ConfigSnapshot`] once per train and hands it out immutably. A `None`
//! from any backend operation means the connection failed and the previous
//! snapshot section is reused unchanged.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod analysis;
mod errors;
mod namespaces;
mod parsers;
mod snapshot;
mod store;

pub use analysis::*;
pub use errors::*;
pub use namespaces::*;
pub use parsers::*;
pub use snapshot::*;
pub use store::*;

/// Upper bound on pulses per train; sizes the pulse-index bitmap.
pub const MAX_N_PULSES_PER_TRAIN: usize = 2700;
