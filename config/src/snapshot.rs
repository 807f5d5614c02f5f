// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Per-train configuration snapshot.
//!
//! The scheduler calls [`ConfigSnapshot::refresh`] once per train. The call
//! batches all concern hashes out of the backend, applies only the fields
//! that are present (a missing field means "no change") and clears one-shot
//! reset flags after reading them. Processors receive the snapshot by
//! shared reference and never see the backend.

use crate::{
    AnalysisType, ConfigError, ConfigResult, Normalizer, PumpProbeMode, RoiReduction, SharedState,
    ns, str2list, str2slice, str2tuple,
};
use sources::PulseSlicer;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::warn;

type Fields = HashMap<String, String>;

fn parse_field<T: FromStr>(fields: &Fields, key: &str) -> ConfigResult<Option<T>> {
    match fields.get(key) {
        None => Ok(None),
        Some(text) => text
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Malformed {
                key: key.to_string(),
                text: text.clone(),
            }),
    }
}

/// Enum fields get the harsher error: text that parses as nothing we
/// implement is an unknown parameter, not a typo to ignore.
fn parse_enum<T: FromStr>(fields: &Fields, key: &str) -> ConfigResult<Option<T>> {
    match fields.get(key) {
        None => Ok(None),
        Some(text) => text
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::UnknownParameter(format!("{key} = '{text}'"))),
    }
}

fn parse_bool(fields: &Fields, key: &str) -> ConfigResult<Option<bool>> {
    match fields.get(key).map(String::as_str) {
        None => Ok(None),
        Some("True" | "true" | "1") => Ok(Some(true)),
        Some("False" | "false" | "0") => Ok(Some(false)),
        Some(text) => Err(ConfigError::Malformed {
            key: key.to_string(),
            text: text.to_string(),
        }),
    }
}

fn parse_tuple(fields: &Fields, key: &str) -> ConfigResult<Option<(f64, f64)>> {
    fields.get(key).map(|text| str2tuple(text)).transpose()
}

/// Rectangular ROI geometry plus activation flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoiGeom {
    pub activated: bool,
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

impl Default for RoiGeom {
    fn default() -> Self {
        Self {
            activated: false,
            x: 0,
            y: 0,
            w: -1,
            h: -1,
        }
    }
}

impl RoiGeom {
    #[must_use]
    pub fn rect(&self) -> [i64; 4] {
        [self.x, self.y, self.w, self.h]
    }
}

/// One correlation slot: where x comes from and how finely it is binned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrelationSlot {
    pub device_id: String,
    pub property: String,
    pub resolution: f64,
}

/// Axis of a binning analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct BinAxis {
    pub device_id: String,
    pub property: String,
    pub n_bins: usize,
    pub range: (f64, f64),
}

impl Default for BinAxis {
    fn default() -> Self {
        Self {
            device_id: String::new(),
            property: String::new(),
            n_bins: 10,
            range: (0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalConfig {
    pub xgm_device: String,
    pub xgm_property: String,
    pub sample_distance: f64,
    pub photon_energy: f64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            xgm_device: String::new(),
            xgm_property: "pulseEnergy.photonFlux".to_string(),
            sample_distance: 0.2,
            photon_energy: 9.3,
        }
    }
}

impl GlobalConfig {
    fn apply(&mut self, fields: &Fields) -> ConfigResult<()> {
        if let Some(v) = fields.get("xgm_device") {
            self.xgm_device.clone_from(v);
        }
        if let Some(v) = fields.get("xgm_property") {
            self.xgm_property.clone_from(v);
        }
        if let Some(v) = parse_field(fields, "sample_distance")? {
            self.sample_distance = v;
        }
        if let Some(v) = parse_field(fields, "photon_energy")? {
            self.photon_energy = v;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageConfig {
    pub background: f64,
    pub threshold_mask: (f64, f64),
    pub mask_file: Option<String>,
    pub pulse_slicer: PulseSlicer,
    pub poi_indices: [usize; 2],
    pub ma_window: u32,
    pub recording_dark: bool,
    pub dark_subtraction: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            background: 0.0,
            threshold_mask: (f64::NEG_INFINITY, f64::INFINITY),
            mask_file: None,
            pulse_slicer: PulseSlicer::default(),
            poi_indices: [0, 0],
            ma_window: 1,
            recording_dark: false,
            dark_subtraction: true,
        }
    }
}

impl ImageConfig {
    fn apply(&mut self, fields: &Fields) -> ConfigResult<()> {
        if let Some(v) = parse_field(fields, "background")? {
            self.background = v;
        }
        if let Some(v) = parse_tuple(fields, "threshold_mask")? {
            self.threshold_mask = v;
        }
        if let Some(v) = fields.get("image_mask") {
            self.mask_file = (!v.is_empty()).then(|| v.clone());
        }
        if let Some(text) = fields.get("pulse_slicer") {
            self.pulse_slicer = str2slice(text)?;
        }
        if let Some(v) = parse_field(fields, "poi1")? {
            self.poi_indices[0] = v;
        }
        if let Some(v) = parse_field(fields, "poi2")? {
            self.poi_indices[1] = v;
        }
        if let Some(v) = parse_field(fields, "ma_window")? {
            if v == 0 {
                return Err(ConfigError::Validation(
                    "moving average window must be positive".to_string(),
                ));
            }
            self.ma_window = v;
        }
        if let Some(v) = parse_bool(fields, "recording_dark")? {
            self.recording_dark = v;
        }
        if let Some(v) = parse_bool(fields, "dark_subtraction")? {
            self.dark_subtraction = v;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PumpProbeConfig {
    pub mode: PumpProbeMode,
    pub analysis_type: AnalysisType,
    pub on_indices: Vec<usize>,
    pub off_indices: Vec<usize>,
    pub abs_difference: bool,
    pub ma_window: u32,
    pub reset: bool,
}

impl Default for PumpProbeConfig {
    fn default() -> Self {
        Self {
            mode: PumpProbeMode::Undefined,
            analysis_type: AnalysisType::Undefined,
            on_indices: Vec::new(),
            off_indices: Vec::new(),
            abs_difference: true,
            ma_window: 1,
            reset: false,
        }
    }
}

impl PumpProbeConfig {
    fn apply(&mut self, fields: &Fields) -> ConfigResult<()> {
        let mut next = self.clone();
        if let Some(v) = parse_enum(fields, "mode")? {
            next.mode = v;
        }
        if let Some(v) = parse_enum(fields, "analysis_type")? {
            next.analysis_type = v;
        }
        if let Some(text) = fields.get("on_indices") {
            next.on_indices = str2list(text)?;
        }
        if let Some(text) = fields.get("off_indices") {
            next.off_indices = str2list(text)?;
        }
        if let Some(v) = parse_bool(fields, "abs_difference")? {
            next.abs_difference = v;
        }
        if let Some(v) = parse_field(fields, "ma_window")? {
            next.ma_window = v;
        }
        next.reset = parse_bool(fields, "reset")?.unwrap_or(false);

        // reject the whole update before any train sees a half-applied state
        if next.mode == PumpProbeMode::SameTrain
            && next.on_indices.iter().any(|i| next.off_indices.contains(i))
        {
            return Err(ConfigError::Validation(
                "pump-probe on/off pulse indices overlap".to_string(),
            ));
        }
        *self = next;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoiConfig {
    pub geoms: [RoiGeom; 4],
    pub fom_reduction: RoiReduction,
}

impl RoiConfig {
    fn apply(&mut self, fields: &Fields) -> ConfigResult<()> {
        for (i, geom) in self.geoms.iter_mut().enumerate() {
            let rank = i + 1;
            if let Some(text) = fields.get(&format!("region{rank}")) {
                let v: Vec<i64> = str2list(text)?;
                let [x, y, w, h] = v.as_slice() else {
                    return Err(ConfigError::Malformed {
                        key: format!("region{rank}"),
                        text: text.clone(),
                    });
                };
                (geom.x, geom.y, geom.w, geom.h) = (*x, *y, *w, *h);
            }
            if let Some(v) = parse_bool(fields, &format!("activated{rank}"))? {
                geom.activated = v;
            }
        }
        if let Some(v) = parse_enum(fields, "fom_reduction")? {
            self.fom_reduction = v;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AzimuthalConfig {
    pub center: (f64, f64),
    pub pixel_size: f64,
    pub method: String,
    pub points: usize,
    pub range: (f64, f64),
    pub auc_range: (f64, f64),
    pub fom_range: (f64, f64),
    pub normalizer: Normalizer,
    pub enabled: bool,
    /// Also integrate every surviving pulse, not just the train mean.
    pub pulse_resolved: bool,
}

impl Default for AzimuthalConfig {
    fn default() -> Self {
        Self {
            center: (580.0, 620.0),
            pixel_size: 0.5e-3,
            method: "BBox".to_string(),
            points: 512,
            range: (0.2, 5.0),
            auc_range: (0.2, 5.0),
            fom_range: (0.2, 5.0),
            normalizer: Normalizer::Undefined,
            enabled: false,
            pulse_resolved: false,
        }
    }
}

impl AzimuthalConfig {
    fn apply(&mut self, fields: &Fields) -> ConfigResult<()> {
        if let Some(v) = parse_field(fields, "integ_center_x")? {
            self.center.0 = v;
        }
        if let Some(v) = parse_field(fields, "integ_center_y")? {
            self.center.1 = v;
        }
        if let Some(v) = parse_field(fields, "pixel_size")? {
            self.pixel_size = v;
        }
        if let Some(v) = fields.get("integ_method") {
            self.method.clone_from(v);
        }
        if let Some(v) = parse_field(fields, "integ_points")? {
            self.points = v;
        }
        if let Some(v) = parse_tuple(fields, "integ_range")? {
            self.range = v;
        }
        if let Some(v) = parse_tuple(fields, "auc_range")? {
            self.auc_range = v;
        }
        if let Some(v) = parse_tuple(fields, "fom_integ_range")? {
            self.fom_range = v;
        }
        if let Some(v) = parse_enum(fields, "normalizer")? {
            self.normalizer = v;
        }
        if let Some(v) = parse_bool(fields, "enabled")? {
            self.enabled = v;
        }
        if let Some(v) = parse_bool(fields, "pulse_resolved")? {
            self.pulse_resolved = v;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrelationConfig {
    pub analysis_type: AnalysisType,
    pub slots: [CorrelationSlot; 4],
    pub reset: bool,
}

impl CorrelationConfig {
    fn apply(&mut self, fields: &Fields) -> ConfigResult<()> {
        if let Some(v) = parse_enum(fields, "analysis_type")? {
            self.analysis_type = v;
        }
        for (i, slot) in self.slots.iter_mut().enumerate() {
            let rank = i + 1;
            if let Some(v) = fields.get(&format!("device_id{rank}")) {
                slot.device_id.clone_from(v);
            }
            if let Some(v) = fields.get(&format!("property{rank}")) {
                slot.property.clone_from(v);
            }
            if let Some(v) = parse_field(fields, &format!("resolution{rank}"))? {
                if v < 0.0 {
                    return Err(ConfigError::Validation(format!(
                        "correlation resolution{rank} must be >= 0"
                    )));
                }
                slot.resolution = v;
            }
        }
        self.reset = parse_bool(fields, "reset")?.unwrap_or(false);
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BinConfig {
    pub analysis_type: AnalysisType,
    pub x: BinAxis,
    pub y: BinAxis,
    pub reset: bool,
}

impl BinConfig {
    fn apply_axis(axis: &mut BinAxis, fields: &Fields, suffix: &str) -> ConfigResult<()> {
        if let Some(v) = fields.get(&format!("device_id_{suffix}")) {
            axis.device_id.clone_from(v);
        }
        if let Some(v) = fields.get(&format!("property_{suffix}")) {
            axis.property.clone_from(v);
        }
        if let Some(v) = parse_field(fields, &format!("n_bins_{suffix}"))? {
            axis.n_bins = v;
        }
        if let Some(v) = parse_tuple(fields, &format!("bin_range_{suffix}"))? {
            axis.range = v;
        }
        Ok(())
    }

    fn apply(&mut self, fields: &Fields) -> ConfigResult<()> {
        if let Some(v) = parse_enum(fields, "analysis_type")? {
            self.analysis_type = v;
        }
        Self::apply_axis(&mut self.x, fields, "x")?;
        Self::apply_axis(&mut self.y, fields, "y")?;
        self.reset = parse_bool(fields, "reset")?.unwrap_or(false);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsConfig {
    pub analysis_type: AnalysisType,
    pub n_bins: usize,
    pub pulse_resolved: bool,
    pub reset: bool,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            analysis_type: AnalysisType::Undefined,
            n_bins: 10,
            pulse_resolved: true,
            reset: false,
        }
    }
}

impl StatisticsConfig {
    fn apply(&mut self, fields: &Fields) -> ConfigResult<()> {
        if let Some(v) = parse_enum(fields, "analysis_type")? {
            self.analysis_type = v;
        }
        if let Some(v) = parse_field(fields, "n_bins")? {
            self.n_bins = v;
        }
        if let Some(v) = parse_bool(fields, "pulse_resolved")? {
            self.pulse_resolved = v;
        }
        self.reset = parse_bool(fields, "reset")?.unwrap_or(false);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PulseFilterConfig {
    pub analysis_type: AnalysisType,
    pub fom_range: (f64, f64),
}

impl Default for PulseFilterConfig {
    fn default() -> Self {
        Self {
            analysis_type: AnalysisType::Undefined,
            fom_range: (f64::NEG_INFINITY, f64::INFINITY),
        }
    }
}

impl PulseFilterConfig {
    fn apply(&mut self, fields: &Fields) -> ConfigResult<()> {
        if let Some(v) = parse_enum(fields, "analysis_type")? {
            self.analysis_type = v;
        }
        if let Some(v) = parse_tuple(fields, "fom_range")? {
            self.fom_range = v;
        }
        Ok(())
    }
}

/// Immutable view of every concern's configuration for one train.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSnapshot {
    pub global: GlobalConfig,
    pub image: ImageConfig,
    pub pump_probe: PumpProbeConfig,
    pub roi: RoiConfig,
    pub azimuthal: AzimuthalConfig,
    pub correlation: CorrelationConfig,
    pub binning: BinConfig,
    pub statistics: StatisticsConfig,
    pub pulse_filter: PulseFilterConfig,
}

impl ConfigSnapshot {
    /// Pull all concern hashes in one batch and fold present fields in.
    ///
    /// A backend connection failure leaves the snapshot untouched. One-shot
    /// `reset` flags are cleared in the backend once read.
    pub fn refresh(&mut self, store: &dyn SharedState) -> ConfigResult<()> {
        let Some(hashes) = store.hget_all_multi(&ns::ALL) else {
            warn!("shared-state backend unreachable; configuration unchanged");
            return Ok(());
        };
        debug_assert_eq!(hashes.len(), ns::ALL.len());

        let mut it = hashes.into_iter();
        let mut next = move || it.next().unwrap_or_default();

        self.global.apply(&next())?;
        self.image.apply(&next())?;

        let fields = next();
        self.pump_probe.apply(&fields)?;
        clear_reset(store, ns::PUMP_PROBE, &fields);

        self.roi.apply(&next())?;
        self.azimuthal.apply(&next())?;

        let fields = next();
        self.correlation.apply(&fields)?;
        clear_reset(store, ns::CORRELATION, &fields);

        let fields = next();
        self.binning.apply(&fields)?;
        clear_reset(store, ns::BIN, &fields);

        let fields = next();
        self.statistics.apply(&fields)?;
        clear_reset(store, ns::STATISTICS, &fields);

        self.pulse_filter.apply(&next())?;
        Ok(())
    }
}

fn clear_reset(store: &dyn SharedState, name: &str, fields: &Fields) {
    if fields.contains_key("reset") {
        store.hdel(name, &["reset"]);
    }
}
