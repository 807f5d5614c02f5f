// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Opaque per-property payloads delivered by the raw feed.

use algorithms::Pixel;
use ndarray::{Array1, Array2, Array3};

/// One property value as delivered by the transport.
///
/// Detector frames arrive as 2-D images (train-resolved) or 3-D pulse stacks;
/// auxiliary devices deliver scalars or 1-D arrays.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Scalar(f64),
    Vector(Array1<f64>),
    Image(Array2<Pixel>),
    ImageStack(Array3<Pixel>),
    Text(String),
}

impl Payload {
    #[must_use]
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Payload::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_vector(&self) -> Option<&Array1<f64>> {
        match self {
            Payload::Vector(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_image(&self) -> Option<&Array2<Pixel>> {
        match self {
            Payload::Image(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_image_stack(&self) -> Option<&Array3<Pixel>> {
        match self {
            Payload::ImageStack(v) => Some(v),
            _ => None,
        }
    }

    /// Scalar view of the payload for correlation/filter x-values: scalars
    /// pass through, single-element vectors collapse, anything else is not
    /// scalar-like.
    #[must_use]
    pub fn scalar_like(&self) -> Option<f64> {
        match self {
            Payload::Scalar(v) => Some(*v),
            Payload::Vector(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }
}

impl From<f64> for Payload {
    fn from(v: f64) -> Self {
        Payload::Scalar(v)
    }
}

impl From<Array1<f64>> for Payload {
    fn from(v: Array1<f64>) -> Self {
        Payload::Vector(v)
    }
}

impl From<Array2<Pixel>> for Payload {
    fn from(v: Array2<Pixel>) -> Self {
        Payload::Image(v)
    }
}

impl From<Array3<Pixel>> for Payload {
    fn from(v: Array3<Pixel>) -> Self {
        Payload::ImageStack(v)
    }
}
