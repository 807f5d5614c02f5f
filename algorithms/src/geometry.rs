// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Geometry assembly boundary.
//!
//! Assembling a modular detector into one image is delegated to a
//! collaborator behind [`GeometryAssembler`]; the data-plane only requires
//! that a set of module arrays maps deterministically to a single 2-D image.
//! [`PositionedAssembler`] is the built-in implementation driven by
//! per-module pixel offsets.

use crate::{AlgorithmError, AlgorithmResult, Pixel};
use ndarray::Array2;
use std::collections::HashMap;

pub trait GeometryAssembler: Send {
    /// Assemble the module arrays into a single image.
    ///
    /// Missing modules are an error: the correlator only forwards a modular
    /// source when at least one module arrived, and the assembler defines
    /// which subset is acceptable.
    fn assemble(&self, modules: &HashMap<usize, Array2<Pixel>>) -> AlgorithmResult<Array2<Pixel>>;
}

/// Offset-table assembler: module `i` is pasted at `offsets[i]` on a canvas
/// initialized to NaN, so gaps between modules stay masked downstream.
#[derive(Debug, Clone)]
pub struct PositionedAssembler {
    offsets: Vec<(usize, usize)>,
    canvas: (usize, usize),
}

impl PositionedAssembler {
    #[must_use]
    pub fn new(offsets: Vec<(usize, usize)>, canvas: (usize, usize)) -> Self {
        Self { offsets, canvas }
    }

    /// Stack modules vertically in index order, the trivial layout used when
    /// no geometry file is configured.
    #[must_use]
    pub fn stacked(n_modules: usize, module_shape: (usize, usize)) -> Self {
        let (h, w) = module_shape;
        let offsets = (0..n_modules).map(|i| (i * h, 0)).collect();
        Self::new(offsets, (n_modules * h, w))
    }
}

impl GeometryAssembler for PositionedAssembler {
    fn assemble(&self, modules: &HashMap<usize, Array2<Pixel>>) -> AlgorithmResult<Array2<Pixel>> {
        let mut canvas = Array2::<Pixel>::from_elem(self.canvas, Pixel::NAN);
        for (idx, &(oy, ox)) in self.offsets.iter().enumerate() {
            let Some(module) = modules.get(&idx) else {
                return Err(AlgorithmError::MissingModule(idx));
            };
            let (h, w) = module.dim();
            canvas
                .slice_mut(ndarray::s![oy..oy + h, ox..ox + w])
                .assign(module);
        }
        Ok(canvas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn stacked_layout_places_modules_in_order() {
        let assembler = PositionedAssembler::stacked(2, (1, 2));
        let mut modules = HashMap::new();
        modules.insert(0, array![[1.0_f32, 2.0]]);
        modules.insert(1, array![[3.0_f32, 4.0]]);
        let img = assembler.assemble(&modules).unwrap();
        assert_eq!(img, array![[1.0, 2.0], [3.0, 4.0]]);
    }

    #[test]
    fn missing_module_is_reported() {
        let assembler = PositionedAssembler::stacked(2, (1, 2));
        let mut modules = HashMap::new();
        modules.insert(0, array![[1.0_f32, 2.0]]);
        assert_eq!(
            assembler.assemble(&modules),
            Err(AlgorithmError::MissingModule(1))
        );
    }
}
