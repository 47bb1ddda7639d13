// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Injected Gaussian sampling used for every resolution smear.
//!
//! Processors never reach for an ambient RNG; the aggregator hands them a
//! `&mut dyn GaussianSource` at end-of-event so tests can substitute a fixed
//! or recorded sequence.

use std::collections::VecDeque;

use crate::math::Prng;

/// Capability that draws from a normal distribution.
pub trait GaussianSource {
    /// Returns a sample from `N(mean, sigma²)`.
    fn gaussian(&mut self, mean: f64, sigma: f64) -> f64;
}

impl GaussianSource for Prng {
    fn gaussian(&mut self, mean: f64, sigma: f64) -> f64 {
        mean + sigma * self.next_standard_normal()
    }
}

/// Source that never smears: every draw returns `mean`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanSource;

impl GaussianSource for MeanSource {
    fn gaussian(&mut self, mean: f64, _sigma: f64) -> f64 {
        mean
    }
}

/// Replays recorded standard-normal deviates; `mean + sigma * z` per draw.
///
/// Once the script is exhausted further draws return `mean`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    deviates: VecDeque<f64>,
    draws: usize,
}

impl ScriptedSource {
    /// Builds a source from standard-normal deviates consumed in order.
    pub fn new(deviates: impl IntoIterator<Item = f64>) -> Self {
        Self {
            deviates: deviates.into_iter().collect(),
            draws: 0,
        }
    }

    /// Number of draws made so far.
    pub fn draws(&self) -> usize {
        self.draws
    }
}

impl GaussianSource for ScriptedSource {
    fn gaussian(&mut self, mean: f64, sigma: f64) -> f64 {
        self.draws += 1;
        self.deviates
            .pop_front()
            .map_or(mean, |z| mean + sigma * z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_source_scales_deviates_by_sigma() {
        let mut src = ScriptedSource::new([1.0, -2.0]);
        assert_eq!(src.gaussian(10.0, 0.5), 10.5);
        assert_eq!(src.gaussian(10.0, 0.5), 9.0);
        assert_eq!(src.gaussian(10.0, 0.5), 10.0);
        assert_eq!(src.draws(), 3);
    }

    #[test]
    fn prng_source_is_reproducible() {
        let mut a = Prng::from_seed_u64(99);
        let mut b = Prng::from_seed_u64(99);
        let xs: Vec<f64> = (0..8).map(|_| a.gaussian(50.0, 0.036)).collect();
        let ys: Vec<f64> = (0..8).map(|_| b.gaussian(50.0, 0.036)).collect();
        assert_eq!(xs, ys);
    }
}
