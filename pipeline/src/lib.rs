// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! The processor chain.
//!
//! A [`ProcessorPipeline`] is an ordered list of [`Processor`]s acting on one
//! correlated train bundle. Each processor rereads its configuration from
//! the per-train [`config::ConfigSnapshot`] in `update` and derives fields
//! on the bundle's `ProcessedData` in `process`. A processor may end the
//! chain early for one train by returning [`Flow::Stop`]; data-dependent
//! failures are reported as [`ProcessorError::Processing`] and suppressed
//! per train by the scheduler.

#![deny(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]

mod azimuthal;
mod binning;
mod correlation;
mod fetch;
mod filter;
mod image_proc;
mod normalize;
mod pp_fom;
mod processor;
mod pump_probe;
mod roi;
mod scheduler;
mod statistics;
mod xgm;

pub use azimuthal::*;
pub use binning::*;
pub use correlation::*;
pub use fetch::*;
pub use filter::*;
pub use image_proc::*;
pub use normalize::*;
pub use pp_fom::*;
pub use processor::*;
pub use pump_probe::*;
pub use roi::*;
pub use scheduler::*;
pub use statistics::*;
pub use xgm::*;

use config::AnalysisType;
use model::ProcessedData;

/// Current train FOM of the configured analysis, if it was derived.
#[must_use]
pub fn train_fom(processed: &ProcessedData, analysis_type: AnalysisType) -> Option<f64> {
    match analysis_type {
        AnalysisType::Undefined => None,
        AnalysisType::PumpProbe => processed.pp.fom,
        AnalysisType::RoiFom => processed.roi.roi1.fom,
        AnalysisType::RoiProj => processed.roi.proj1.fom,
        AnalysisType::AzimuthalInteg => processed.ai.fom,
    }
}
