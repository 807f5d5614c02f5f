// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Moving-average accumulators.
//!
//! Shared update rule (window `W >= 1`):
//! - the first sample is stored verbatim with `count = 1`;
//! - while `count < W` the mean is exact: `count += 1; μ += (x − μ)/count`;
//! - once `count == W` the divisor stays at `W`, which turns the store into
//!   an exponentially-weighted running mean with `α = 1/W`. This
//!   approximation is deliberate and pinned by tests.
//! - a shape mismatch restarts the accumulator from the new sample;
//! - changing the window does not reset anything by itself: the next sample
//!   decides, because the fold condition `count <= window` no longer holds
//!   after shrinking the window.

use crate::{ModelError, ModelResult};
use algorithms::{Pixel, moving_average_image, moving_average_image_stack};
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};

macro_rules! ma_common {
    () => {
        pub fn set_window(&mut self, window: u32) -> ModelResult<()> {
            if window == 0 {
                return Err(ModelError::ZeroWindow);
            }
            self.window = window;
            Ok(())
        }

        #[must_use]
        pub fn window(&self) -> u32 {
            self.window
        }

        #[must_use]
        pub fn count(&self) -> u32 {
            self.count
        }

        /// Configuration reset: forget the accumulated mean.
        pub fn clear(&mut self) {
            self.data = None;
            self.count = 0;
        }
    };
}

/// Moving average of a scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingAverageScalar {
    data: Option<f64>,
    window: u32,
    count: u32,
}

impl Default for MovingAverageScalar {
    fn default() -> Self {
        Self::new(1)
    }
}

impl MovingAverageScalar {
    #[must_use]
    pub fn new(window: u32) -> Self {
        Self {
            data: None,
            window: window.max(1),
            count: 0,
        }
    }

    pub fn push(&mut self, value: f64) {
        match self.data {
            Some(ref mut data) if self.window > 1 && self.count <= self.window => {
                if self.count < self.window {
                    self.count += 1;
                }
                *data += (value - *data) / f64::from(self.count);
            }
            _ => {
                self.data = Some(value);
                self.count = 1;
            }
        }
    }

    #[must_use]
    pub fn get(&self) -> Option<f64> {
        self.data
    }

    ma_common!();
}

/// Moving average of a 2-D image, updated with the in-place kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingAverageImage {
    data: Option<Array2<Pixel>>,
    window: u32,
    count: u32,
}

impl Default for MovingAverageImage {
    fn default() -> Self {
        Self::new(1)
    }
}

impl MovingAverageImage {
    #[must_use]
    pub fn new(window: u32) -> Self {
        Self {
            data: None,
            window: window.max(1),
            count: 0,
        }
    }

    pub fn push(&mut self, new: &ArrayView2<'_, Pixel>) {
        match self.data {
            Some(ref mut data)
                if self.window > 1 && self.count <= self.window && data.dim() == new.dim() =>
            {
                if self.count < self.window {
                    self.count += 1;
                }
                moving_average_image(data, new, self.count);
            }
            _ => {
                self.data = Some(new.to_owned());
                self.count = 1;
            }
        }
    }

    #[must_use]
    pub fn get(&self) -> Option<&Array2<Pixel>> {
        self.data.as_ref()
    }

    ma_common!();
}

/// Moving average of a pulse stack; backs the dark-run accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingAverageStack {
    data: Option<Array3<Pixel>>,
    window: u32,
    count: u32,
}

impl Default for MovingAverageStack {
    fn default() -> Self {
        Self::new(1)
    }
}

impl MovingAverageStack {
    #[must_use]
    pub fn new(window: u32) -> Self {
        Self {
            data: None,
            window: window.max(1),
            count: 0,
        }
    }

    pub fn push(&mut self, new: &ArrayView3<'_, Pixel>) {
        match self.data {
            Some(ref mut data)
                if self.window > 1 && self.count <= self.window && data.dim() == new.dim() =>
            {
                if self.count < self.window {
                    self.count += 1;
                }
                moving_average_image_stack(data, new, self.count);
            }
            _ => {
                self.data = Some(new.to_owned());
                self.count = 1;
            }
        }
    }

    #[must_use]
    pub fn get(&self) -> Option<&Array3<Pixel>> {
        self.data.as_ref()
    }

    #[must_use]
    pub fn n_pulses(&self) -> usize {
        self.data.as_ref().map_or(0, |d| d.len_of(Axis(0)))
    }

    ma_common!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn scalar_sequence_matches_the_stated_rule() {
        let mut ma = MovingAverageScalar::new(4);
        let mut seen = Vec::new();
        for v in [2.0, 4.0, 6.0, 8.0, 10.0] {
            ma.push(v);
            seen.push(ma.get().unwrap());
        }
        // exact means while filling, divisor pinned at W = 4 afterwards
        assert_eq!(seen, vec![2.0, 3.0, 4.0, 5.0, 6.25]);
        assert_eq!(ma.count(), 4);
    }

    #[test]
    fn scalar_mean_is_exact_below_the_window() {
        let mut ma = MovingAverageScalar::new(10);
        for v in [1.0, 2.0, 3.0] {
            ma.push(v);
        }
        assert_relative_eq!(ma.get().unwrap(), 2.0);
        assert_eq!(ma.count(), 3);
    }

    #[test]
    fn window_of_one_tracks_the_last_sample() {
        let mut ma = MovingAverageScalar::new(1);
        ma.push(5.0);
        ma.push(9.0);
        assert_eq!(ma.get(), Some(9.0));
        assert_eq!(ma.count(), 1);
    }

    #[test]
    fn shrinking_the_window_takes_effect_on_the_next_sample() {
        let mut ma = MovingAverageScalar::new(4);
        for v in [2.0, 4.0, 6.0, 8.0] {
            ma.push(v);
        }
        assert_eq!(ma.count(), 4);
        ma.set_window(2).unwrap();
        // nothing changed yet
        assert_eq!(ma.get(), Some(5.0));
        assert_eq!(ma.count(), 4);
        // count(4) > window(2) breaks the fold condition: restart
        ma.push(7.0);
        assert_eq!(ma.get(), Some(7.0));
        assert_eq!(ma.count(), 1);
    }

    #[test]
    fn clear_resets_count_and_mean() {
        let mut ma = MovingAverageScalar::new(4);
        ma.push(3.0);
        ma.clear();
        assert_eq!(ma.get(), None);
        assert_eq!(ma.count(), 0);
        ma.push(8.0);
        assert_eq!(ma.get(), Some(8.0));
    }

    #[test]
    fn image_shape_mismatch_restarts() {
        let mut ma = MovingAverageImage::new(3);
        ma.push(&array![[2.0_f32, 2.0]].view());
        ma.push(&array![[4.0_f32, 4.0]].view());
        assert_eq!(ma.get().unwrap(), &array![[3.0, 3.0]]);
        ma.push(&array![[1.0_f32], [1.0]].view());
        assert_eq!(ma.count(), 1);
        assert_eq!(ma.get().unwrap(), &array![[1.0], [1.0]]);
    }

    #[test]
    fn stack_average_counts_pulses() {
        let mut ma = MovingAverageStack::new(5);
        ma.push(&array![[[2.0_f32]], [[4.0]]].view());
        ma.push(&array![[[4.0_f32]], [[8.0]]].view());
        assert_eq!(ma.n_pulses(), 2);
        assert_eq!(ma.get().unwrap(), &array![[[3.0]], [[6.0]]]);
    }
}
