// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Raw-data feed.
//!
//! The transport adapters that deliver real detector data are external
//! collaborators; this module provides the [`Feed`] boundary they plug into
//! and a simulated implementation used by `start` and by `stream`, which
//! replays a recorded run description (train count, pulse structure, source
//! names) through the same code path.

use crate::args::RunOpts;
use ndarray::{Array1, Array3};
use rand::Rng;
use serde::Deserialize;
use sources::{RawPacket, SourceCatalog, SourceCategory, SourceItem, TrainId};

pub const SIM_DETECTOR: &str = "SIM_DET";
pub const SIM_XGM: &str = "SIM_XGM";
pub const SIM_MOTOR: &str = "SIM_MOTOR";

/// One packet per call; `None` ends the run.
pub trait Feed: Send {
    fn next_packet(&mut self) -> Option<RawPacket>;
}

/// Parameters of a (simulated or recorded) run.
#[derive(Debug, Clone, Deserialize)]
pub struct RunDescription {
    #[serde(default)]
    pub n_trains: u64,
    pub n_pulses: usize,
    pub det_size: usize,
    #[serde(default = "default_start_tid")]
    pub start_tid: TrainId,
}

fn default_start_tid() -> TrainId {
    1
}

impl RunDescription {
    /// An open-ended run with the CLI's simulated-source parameters.
    #[must_use]
    pub fn endless(opts: &RunOpts) -> Self {
        Self {
            n_trains: opts.max_trains,
            n_pulses: opts.pulses,
            det_size: opts.det_size,
            start_tid: 1,
        }
    }

    pub fn from_file(path: &str) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read run description '{path}': {e}"))?;
        serde_json::from_str(&text)
            .map_err(|e| format!("malformed run description '{path}': {e}"))
    }

    /// The catalog matching the sources this run delivers.
    #[must_use]
    pub fn catalog(&self) -> SourceCatalog {
        let open = (f64::NEG_INFINITY, f64::INFINITY);
        let mut catalog = SourceCatalog::new();
        catalog.add(
            SIM_DETECTOR,
            SourceItem::new(
                SourceCategory::Detector,
                SIM_DETECTOR,
                [],
                "image.data",
                None,
                open,
            )
            .unwrap(),
        );
        catalog.add(
            SIM_XGM,
            SourceItem::new(SourceCategory::Xgm, SIM_XGM, [], "pulseEnergy", None, open)
                .unwrap(),
        );
        catalog.add(
            SIM_MOTOR,
            SourceItem::new(
                SourceCategory::Control,
                SIM_MOTOR,
                [],
                "actualPosition",
                None,
                open,
            )
            .unwrap(),
        );
        catalog
    }
}

/// Scattering-ring source with per-pulse intensity jitter.
pub struct SimulatedFeed {
    description: RunDescription,
    next_tid: TrainId,
    emitted: u64,
}

impl SimulatedFeed {
    #[must_use]
    pub fn new(description: RunDescription) -> Self {
        let next_tid = description.start_tid;
        Self {
            description,
            next_tid,
            emitted: 0,
        }
    }

    fn detector_stack(&self, rng: &mut impl Rng) -> Array3<f32> {
        let n = self.description.det_size;
        let center = n as f32 / 2.0;
        let ring_radius = n as f32 / 4.0;
        let mut stack = Array3::zeros((self.description.n_pulses, n, n));
        for mut plane in stack.outer_iter_mut() {
            let gain: f32 = rng.random_range(0.8..1.2);
            for ((y, x), v) in plane.indexed_iter_mut() {
                let dx = x as f32 - center;
                let dy = y as f32 - center;
                let r = dx.hypot(dy);
                let ring = (-((r - ring_radius) / 4.0).powi(2)).exp();
                *v = gain * (100.0 * ring + rng.random_range(0.0..5.0));
            }
        }
        stack
    }
}

impl Feed for SimulatedFeed {
    fn next_packet(&mut self) -> Option<RawPacket> {
        if self.description.n_trains > 0 && self.emitted >= self.description.n_trains {
            return None;
        }
        let tid = self.next_tid;
        self.next_tid += 1;
        self.emitted += 1;

        let mut rng = rand::rng();
        let mut packet = RawPacket::new();
        packet.insert(SIM_DETECTOR, "image.data", self.detector_stack(&mut rng), tid);

        let xgm: Array1<f64> = (0..self.description.n_pulses)
            .map(|_| rng.random_range(500.0..1500.0))
            .collect();
        packet.insert(SIM_XGM, "pulseEnergy", xgm, tid);

        // a slow scan: the motor sweeps back and forth one step per train
        let position = f64::from(u32::try_from(tid % 100).unwrap_or(0)) / 10.0;
        packet.insert(SIM_MOTOR, "actualPosition", position, tid);

        Some(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn description() -> RunDescription {
        RunDescription {
            n_trains: 3,
            n_pulses: 2,
            det_size: 8,
            start_tid: 10,
        }
    }

    #[test]
    fn bounded_feed_ends_after_its_trains() {
        let mut feed = SimulatedFeed::new(description());
        let tids: Vec<_> = std::iter::from_fn(|| feed.next_packet())
            .map(|p| p.meta[SIM_DETECTOR].tid)
            .collect();
        assert_eq!(tids, vec![10, 11, 12]);
    }

    #[test]
    fn packets_cover_the_whole_catalog() {
        let mut feed = SimulatedFeed::new(description());
        let packet = feed.next_packet().unwrap();
        for key in description().catalog().keys() {
            assert!(packet.values.contains_key(key), "missing {key}");
        }
    }

    #[test]
    fn run_description_loads_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"n_trains": 5, "n_pulses": 4, "det_size": 16}}"#).unwrap();
        let description = RunDescription::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(description.n_trains, 5);
        assert_eq!(description.start_tid, 1);
    }
}
