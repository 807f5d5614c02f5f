// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Pulse slicing.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("slice step must not be zero")]
pub struct ZeroStep;

/// `begin:end:step` slice with open ends, applied to the pulse axis.
///
/// Semantics follow the conventional sequence-slice rules: negative bounds
/// count from the end, an open begin/end covers the respective extreme, and
/// a negative step walks backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PulseSlicer {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

impl PulseSlicer {
    pub fn new(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Result<Self, ZeroStep> {
        if step == Some(0) {
            return Err(ZeroStep);
        }
        Ok(Self { start, stop, step })
    }

    fn clamp_index(v: i64, n: i64, backwards: bool) -> i64 {
        let v = if v < 0 { v + n } else { v };
        if backwards {
            v.clamp(-1, n - 1)
        } else {
            v.clamp(0, n)
        }
    }

    /// Indices selected out of `n` pulses, in traversal order.
    #[must_use]
    pub fn indices(&self, n: usize) -> Vec<usize> {
        let n = n as i64;
        let step = self.step.unwrap_or(1);
        debug_assert_ne!(step, 0);
        let backwards = step < 0;

        let start = match self.start {
            Some(v) => Self::clamp_index(v, n, backwards),
            None if backwards => n - 1,
            None => 0,
        };
        let stop = match self.stop {
            Some(v) => Self::clamp_index(v, n, backwards),
            None if backwards => -1,
            None => n,
        };

        let mut out = Vec::new();
        let mut i = start;
        while (step > 0 && i < stop) || (step < 0 && i > stop) {
            out.push(i as usize);
            i += step;
        }
        out
    }
}
