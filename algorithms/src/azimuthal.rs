// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Azimuthal integration of a detector image into a 1-D scattering curve.
//!
//! The integrator maps every pixel to momentum transfer
//! `q = 4π·sin(θ/2)/λ` (in 1/Å) from the beam-center geometry and averages
//! intensities per q bin. Two binning methods are supported, identified by
//! the tags used by standard integration libraries: `nosplit` drops each
//! pixel into a single bin, `BBox` splits the pixel over the bins covered by
//! its radial bounding box.

use crate::{AlgorithmError, AlgorithmResult, BinEdges, Pixel};
use ndarray::{Array1, ArrayView2};
use std::str::FromStr;

/// hc/e in keV·Å, used to derive the wavelength from the photon energy.
const HC_KEV_ANGSTROM: f64 = 12.3984;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrationMethod {
    #[default]
    BBox,
    NoSplit,
}

impl FromStr for IntegrationMethod {
    type Err = AlgorithmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BBox" => Ok(Self::BBox),
            "nosplit" | "none" => Ok(Self::NoSplit),
            other => Err(AlgorithmError::UnknownMethod(other.to_string())),
        }
    }
}

/// Beam-center geometry and integration parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct AzimuthalIntegrator {
    /// Beam center in pixel coordinates, `(cx, cy)`.
    pub center: (f64, f64),
    /// Pixel size in meters.
    pub pixel_size: f64,
    /// Orthogonal sample-detector distance in meters.
    pub sample_distance: f64,
    /// Photon energy in keV.
    pub photon_energy: f64,
    pub method: IntegrationMethod,
    /// Number of points in the output curve.
    pub points: usize,
    /// Integration range in 1/Å.
    pub range: (f64, f64),
}

impl AzimuthalIntegrator {
    /// Wavelength in Å derived from the photon energy.
    #[must_use]
    pub fn wavelength(&self) -> f64 {
        HC_KEV_ANGSTROM / self.photon_energy
    }

    fn q_at(&self, radius_px: f64) -> f64 {
        let r = radius_px * self.pixel_size;
        let theta = (r / self.sample_distance).atan();
        4.0 * std::f64::consts::PI * (theta / 2.0).sin() / self.wavelength()
    }

    /// Integrate one conditioned image into `(q, I)`.
    ///
    /// NaN pixels are excluded; bins that received no intensity report 0.
    pub fn integrate(
        &self,
        image: &ArrayView2<'_, Pixel>,
    ) -> AlgorithmResult<(Array1<f64>, Array1<f64>)> {
        let (lo, hi) = self.range;
        let edges = BinEdges::new(lo, hi, self.points)?;
        let bin_width = (hi - lo) / self.points as f64;

        let mut weight = Array1::<f64>::zeros(self.points);
        let mut sum = Array1::<f64>::zeros(self.points);

        let (cx, cy) = self.center;
        for ((y, x), &v) in image.indexed_iter() {
            if v.is_nan() {
                continue;
            }
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            let r = dx.hypot(dy);
            match self.method {
                IntegrationMethod::NoSplit => {
                    if let Some(i) = edges.index(self.q_at(r)) {
                        sum[i] += f64::from(v);
                        weight[i] += 1.0;
                    }
                }
                IntegrationMethod::BBox => {
                    // split the pixel over the q interval its radial extent
                    // covers, proportionally to the overlap with each bin
                    let q_lo = self.q_at((r - 0.5).max(0.0));
                    let q_hi = self.q_at(r + 0.5);
                    let span = (q_hi - q_lo).max(f64::EPSILON);
                    let first = ((q_lo - lo) / bin_width).floor().max(0.0) as usize;
                    let last = ((q_hi - lo) / bin_width).floor().max(0.0) as usize;
                    for i in first..=last.min(self.points.saturating_sub(1)) {
                        let b_lo = lo + i as f64 * bin_width;
                        let b_hi = b_lo + bin_width;
                        let overlap = (q_hi.min(b_hi) - q_lo.max(b_lo)).max(0.0) / span;
                        if overlap > 0.0 {
                            sum[i] += f64::from(v) * overlap;
                            weight[i] += overlap;
                        }
                    }
                }
            }
        }

        let intensity =
            Array1::from_iter((0..self.points).map(
                |i| {
                    if weight[i] > 0.0 { sum[i] / weight[i] } else { 0.0 }
                },
            ));
        Ok((edges.centers(), intensity))
    }
}
