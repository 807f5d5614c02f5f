// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Analysis enums shared across the processor chain.

use strum_macros::{Display, EnumString};

/// Figure-of-merit family a downstream consumer asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
pub enum AnalysisType {
    #[default]
    #[strum(serialize = "")]
    Undefined,
    #[strum(serialize = "pump-probe")]
    PumpProbe,
    #[strum(serialize = "ROI FOM")]
    RoiFom,
    #[strum(serialize = "ROI proj")]
    RoiProj,
    #[strum(serialize = "azimuthal integ")]
    AzimuthalInteg,
}

/// How a scalar FOM is reduced out of a pixel region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
pub enum RoiReduction {
    #[strum(serialize = "sum")]
    #[default]
    Sum,
    #[strum(serialize = "mean")]
    Mean,
}

/// Normalizer applied to FOMs/VFOMs before differences are taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
pub enum Normalizer {
    #[strum(serialize = "")]
    #[default]
    Undefined,
    #[strum(serialize = "AUC")]
    Auc,
    #[strum(serialize = "XGM")]
    Xgm,
    #[strum(serialize = "ROI")]
    Roi,
    #[strum(serialize = "ROI3 - ROI4")]
    RoiSub,
    #[strum(serialize = "ROI3 + ROI4")]
    RoiAdd,
}

/// How on/off pulses are paired for pump-probe analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
pub enum PumpProbeMode {
    #[strum(serialize = "")]
    #[default]
    Undefined,
    #[strum(serialize = "reference as off")]
    PreDefinedOff,
    #[strum(serialize = "same train")]
    SameTrain,
    #[strum(serialize = "even/odd train")]
    EvenTrainOn,
    #[strum(serialize = "odd/even train")]
    OddTrainOn,
}

/// Format of the main detector source, attached to correlated metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
pub enum SourceType {
    #[strum(serialize = "unknown")]
    #[default]
    Unknown,
    #[strum(serialize = "calibrated")]
    Calibrated,
    #[strum(serialize = "assembled")]
    Assembled,
    #[strum(serialize = "processed")]
    Processed,
}
