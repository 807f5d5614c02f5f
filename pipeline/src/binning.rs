// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Binning aggregates.
//!
//! Two slow axes bin the train FOM (and VFOM, when the analysis has one)
//! into per-bin counts and running averages, plus a 2-D count/FOM heatmap
//! over both axes. The aggregates are process-long; a change of axis
//! configuration or the reset flag rebuilds them.

use crate::{Flow, ProcessResult, Processor, ProcessorError, fetch_property, train_fom};
use algorithms::BinEdges;
use config::{AnalysisType, BinAxis, ConfigSnapshot};
use correlator::Correlated;
use model::{Bin1dData, Bin2dData};
use ndarray::{Array1, Array2};
use tracing::debug;

struct AxisState {
    cfg: BinAxis,
    edges: Option<BinEdges>,
    count: Array1<u64>,
    fom_sum: Array1<f64>,
    /// Per-bin running VFOM sum, lazily sized to the first VFOM seen.
    vfom_sum: Option<Array2<f64>>,
    vfom_x: Option<Array1<f64>>,
}

impl AxisState {
    fn empty() -> Self {
        let cfg = BinAxis::default();
        let n_bins = cfg.n_bins;
        Self {
            cfg,
            edges: None,
            count: Array1::zeros(n_bins),
            fom_sum: Array1::zeros(n_bins),
            vfom_sum: None,
            vfom_x: None,
        }
    }

    fn rebuild(cfg: BinAxis) -> Result<Self, ProcessorError> {
        let configured = !cfg.device_id.is_empty() && !cfg.property.is_empty();
        let edges = if configured {
            Some(
                BinEdges::new(cfg.range.0, cfg.range.1, cfg.n_bins)
                    .map_err(|e| ProcessorError::Processing(e.to_string()))?,
            )
        } else {
            None
        };
        let n_bins = cfg.n_bins;
        Ok(Self {
            cfg,
            edges,
            count: Array1::zeros(n_bins),
            fom_sum: Array1::zeros(n_bins),
            vfom_sum: None,
            vfom_x: None,
        })
    }

    fn publish(&self) -> Bin1dData {
        let mut out = Bin1dData {
            label: format!("{} {}", self.cfg.device_id, self.cfg.property),
            ..Bin1dData::default()
        };
        let Some(edges) = &self.edges else {
            return out;
        };
        out.centers = Some(edges.centers());
        out.count_hist = Some(self.count.clone());
        out.fom_hist = Some(Array1::from_iter(
            self.count
                .iter()
                .zip(self.fom_sum.iter())
                .map(|(&c, &s)| if c > 0 { s / c as f64 } else { 0.0 }),
        ));
        if let (Some(vfom_sum), Some(x)) = (&self.vfom_sum, &self.vfom_x) {
            let mut heat = vfom_sum.clone();
            for (row, &c) in heat.rows_mut().into_iter().zip(self.count.iter()) {
                if c > 0 {
                    let inv = 1.0 / c as f64;
                    for v in row {
                        *v *= inv;
                    }
                }
            }
            out.vfom_heat = Some(heat);
            out.x = Some(x.clone());
            out.has_vfom = true;
        }
        out
    }
}

pub struct BinProcessor {
    analysis_type: AnalysisType,
    x_axis: AxisState,
    y_axis: AxisState,
    count_2d: Array2<u64>,
    fom_sum_2d: Array2<f64>,
}

impl Default for BinProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl BinProcessor {
    #[must_use]
    pub fn new() -> Self {
        let x_axis = AxisState::empty();
        let y_axis = AxisState::empty();
        let (nx, ny) = (x_axis.cfg.n_bins, y_axis.cfg.n_bins);
        Self {
            analysis_type: AnalysisType::Undefined,
            x_axis,
            y_axis,
            count_2d: Array2::zeros((ny, nx)),
            fom_sum_2d: Array2::zeros((ny, nx)),
        }
    }

    fn vfom_of(bundle: &Correlated, analysis_type: AnalysisType) -> Option<(Array1<f64>, Array1<f64>)> {
        let processed = &bundle.processed;
        let item = match analysis_type {
            AnalysisType::AzimuthalInteg => &processed.ai,
            AnalysisType::RoiProj => &processed.roi.proj1,
            _ => return None,
        };
        match (&item.x, &item.vfom) {
            (Some(x), Some(vfom)) => Some((x.clone(), vfom.clone())),
            _ => None,
        }
    }
}

impl Processor for BinProcessor {
    fn name(&self) -> &'static str {
        "binning"
    }

    fn update(&mut self, cfg: &ConfigSnapshot) -> Result<(), ProcessorError> {
        self.analysis_type = cfg.binning.analysis_type;

        let reset = cfg.binning.reset;
        let x_changed = cfg.binning.x != self.x_axis.cfg;
        let y_changed = cfg.binning.y != self.y_axis.cfg;
        if reset || x_changed {
            self.x_axis = AxisState::rebuild(cfg.binning.x.clone())?;
        }
        if reset || y_changed {
            self.y_axis = AxisState::rebuild(cfg.binning.y.clone())?;
        }
        if reset || x_changed || y_changed {
            let (nx, ny) = (self.x_axis.cfg.n_bins, self.y_axis.cfg.n_bins);
            self.count_2d = Array2::zeros((ny, nx));
            self.fom_sum_2d = Array2::zeros((ny, nx));
            debug!("binning aggregates rebuilt");
        }
        Ok(())
    }

    fn process(&mut self, bundle: &mut Correlated) -> ProcessResult {
        let fom = train_fom(&bundle.processed, self.analysis_type);
        let vfom = Self::vfom_of(bundle, self.analysis_type);

        let mut bin_x = None;
        let mut bin_y = None;

        for (axis, slot) in [
            (&mut self.x_axis, &mut bin_x),
            (&mut self.y_axis, &mut bin_y),
        ] {
            let Some(edges) = &axis.edges else {
                continue;
            };
            let (value, _) = fetch_property(bundle, &axis.cfg.device_id, &axis.cfg.property);
            let Some(value) = value.and_then(|v| v.as_scalar()) else {
                continue;
            };
            let Some(index) = edges.index(value) else {
                continue;
            };
            *slot = Some(index);

            if let Some(fom) = fom {
                axis.count[index] += 1;
                axis.fom_sum[index] += fom;
                if let Some((x, v)) = &vfom {
                    let n_bins = axis.cfg.n_bins;
                    let heat = axis
                        .vfom_sum
                        .get_or_insert_with(|| Array2::zeros((n_bins, v.len())));
                    if heat.dim().1 == v.len() {
                        let mut row = heat.row_mut(index);
                        row += &v.view();
                        axis.vfom_x = Some(x.clone());
                    }
                }
            }
        }

        let mut bin = model::BinData {
            bin1: self.x_axis.publish(),
            bin2: self.y_axis.publish(),
            bin12: Bin2dData::default(),
        };
        bin.bin1.updated = bin_x.is_some();
        bin.bin2.updated = bin_y.is_some();

        if let (Some(ix), Some(iy), Some(fom)) = (bin_x, bin_y, fom) {
            self.count_2d[[iy, ix]] += 1;
            self.fom_sum_2d[[iy, ix]] += fom;
        }
        if self.x_axis.edges.is_some() && self.y_axis.edges.is_some() {
            let mut fom_heat = self.fom_sum_2d.clone();
            ndarray::Zip::from(&mut fom_heat)
                .and(&self.count_2d)
                .for_each(|f, &c| {
                    if c > 0 {
                        *f /= c as f64;
                    }
                });
            bin.bin12 = Bin2dData {
                center_x: self.x_axis.edges.as_ref().map(BinEdges::centers),
                center_y: self.y_axis.edges.as_ref().map(BinEdges::centers),
                x_label: bin.bin1.label.clone(),
                y_label: bin.bin2.label.clone(),
                fom_heat: Some(fom_heat),
                count_heat: Some(self.count_2d.clone()),
                updated: bin_x.is_some() && bin_y.is_some(),
            };
        }

        bundle.processed.bin = bin;
        Ok(Flow::Continue)
    }
}
