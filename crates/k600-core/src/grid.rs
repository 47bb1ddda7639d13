// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fixed-shape `[element][sub-channel][time-sample]` accumulators.
//!
//! Every detector subsystem owns one or more grids. Grids are reset at the
//! start of each event and never shared, so no interior mutability is needed.

use crate::math::Spherical;

/// Largest number of time samples a subsystem window may derive.
pub const MAX_TIME_SAMPLES: u32 = 4096;

/// Position of a cell inside a [`ChannelTimeGrid`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GridIndex {
    /// Detector element (TIARA, clover, paddle, ...).
    pub element: usize,
    /// Sub-channel within the element (crystal, ring-sector pad, shield segment).
    pub sub: usize,
    /// Time-sample bucket.
    pub sample: usize,
}

impl GridIndex {
    /// Convenience constructor.
    pub const fn new(element: usize, sub: usize, sample: usize) -> Self {
        Self {
            element,
            sub,
            sample,
        }
    }
}

/// Dimensions of a grid.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GridShape {
    /// Number of detector elements.
    pub elements: usize,
    /// Sub-channels per element.
    pub subs: usize,
    /// Time samples per sub-channel.
    pub samples: usize,
}

impl GridShape {
    /// Convenience constructor.
    pub const fn new(elements: usize, subs: usize, samples: usize) -> Self {
        Self {
            elements,
            subs,
            samples,
        }
    }

    /// Total number of cells.
    pub const fn len(&self) -> usize {
        self.elements * self.subs * self.samples
    }

    /// `true` when any dimension is zero.
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn offset(&self, idx: GridIndex) -> Option<usize> {
        if idx.element >= self.elements || idx.sub >= self.subs || idx.sample >= self.samples {
            return None;
        }
        Some((idx.element * self.subs + idx.sub) * self.samples + idx.sample)
    }

    fn index_of(&self, offset: usize) -> GridIndex {
        let sample = offset % self.samples;
        let rest = offset / self.samples;
        GridIndex::new(rest / self.subs, rest % self.subs, sample)
    }
}

/// Maps elapsed time onto time-sample buckets.
///
/// `sample = floor(time / period)`; times outside `[0, total)` have no sample
/// and are dropped by the caller.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SampleClock {
    period: f64,
    total: f64,
    samples: usize,
}

impl SampleClock {
    /// Builds a clock. Callers validate `period > 0` and `total > 0` beforehand
    /// (see [`crate::config::DetectorConfig::validate`]).
    pub fn new(period: f64, total: f64) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let samples = if period > 0.0 && total > 0.0 {
            (total / period).ceil() as usize
        } else {
            0
        };
        Self {
            period,
            total,
            samples,
        }
    }

    /// Number of buckets covering the sampled window.
    pub const fn samples(&self) -> usize {
        self.samples
    }

    /// Sampling period (ns).
    pub const fn period(&self) -> f64 {
        self.period
    }

    /// Total sampled time (ns).
    pub const fn total(&self) -> f64 {
        self.total
    }

    /// Bucket for `time`, or `None` when outside the sampled window.
    pub fn sample_of(&self, time: f64) -> Option<usize> {
        if !(time >= 0.0 && time < self.total) {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let sample = (time / self.period).floor() as usize;
        (sample < self.samples).then_some(sample)
    }
}

/// Dense accumulator over `[element][sub][sample]` cells of type `C`.
#[derive(Debug, Clone)]
pub struct ChannelTimeGrid<C> {
    shape: GridShape,
    cells: Vec<C>,
}

impl<C: Default + Clone> ChannelTimeGrid<C> {
    /// Allocates a grid with every cell at its sentinel (`C::default()`).
    pub fn new(shape: GridShape) -> Self {
        Self {
            shape,
            cells: vec![C::default(); shape.len()],
        }
    }

    /// Restores every cell to its sentinel.
    pub fn reset(&mut self) {
        self.cells.fill(C::default());
    }
}

impl<C> ChannelTimeGrid<C> {
    /// Grid dimensions.
    pub const fn shape(&self) -> GridShape {
        self.shape
    }

    /// Shared access to a cell; `None` when out of range.
    pub fn cell(&self, idx: GridIndex) -> Option<&C> {
        self.shape.offset(idx).map(|o| &self.cells[o])
    }

    /// Mutable access to a cell; `None` when out of range.
    pub fn cell_mut(&mut self, idx: GridIndex) -> Option<&mut C> {
        self.shape.offset(idx).map(|o| &mut self.cells[o])
    }

    /// Iterates cells in element → sub → sample order.
    pub fn iter(&self) -> impl Iterator<Item = (GridIndex, &C)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(|(o, c)| (self.shape.index_of(o), c))
    }

    /// Mutable iteration in the same order as [`ChannelTimeGrid::iter`].
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (GridIndex, &mut C)> + '_ {
        let shape = self.shape;
        self.cells
            .iter_mut()
            .enumerate()
            .map(move |(o, c)| (shape.index_of(o), c))
    }
}

/// Energy cell with an optional latched direction.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct EnergyCell {
    /// Accumulated (never smeared) energy deposit.
    pub energy: f64,
    /// Direction latched by the first qualifying hit this event.
    pub direction: Option<Spherical>,
}

impl ChannelTimeGrid<EnergyCell> {
    /// Adds `energy` to the cell. Returns `false` (and does nothing) when the
    /// index is outside the grid.
    pub fn accumulate(&mut self, idx: GridIndex, energy: f64) -> bool {
        match self.cell_mut(idx) {
            Some(cell) => {
                cell.energy += energy;
                true
            }
            None => false,
        }
    }

    /// Stores `direction` only if the cell has none yet this event.
    ///
    /// Returns `true` when this call performed the latch.
    pub fn latch_geometry(&mut self, idx: GridIndex, direction: Spherical) -> bool {
        match self.cell_mut(idx) {
            Some(cell) if cell.direction.is_none() => {
                cell.direction = Some(direction);
                true
            }
            _ => false,
        }
    }

    /// Accumulated energy, `0` when out of range.
    pub fn energy(&self, idx: GridIndex) -> f64 {
        self.cell(idx).map_or(0.0, |c| c.energy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> ChannelTimeGrid<EnergyCell> {
        ChannelTimeGrid::new(GridShape::new(2, 3, 4))
    }

    #[test]
    fn accumulate_sums_and_rejects_out_of_range() {
        let mut g = grid();
        let idx = GridIndex::new(1, 2, 3);
        assert!(g.accumulate(idx, 1.5));
        assert!(g.accumulate(idx, 2.0));
        assert_eq!(g.energy(idx), 3.5);
        assert!(!g.accumulate(GridIndex::new(2, 0, 0), 1.0));
        assert!(!g.accumulate(GridIndex::new(0, 0, 4), 1.0));
    }

    #[test]
    fn latch_is_first_write_wins() {
        let mut g = grid();
        let idx = GridIndex::new(0, 1, 0);
        let first = Spherical { theta: 10.0, phi: 20.0 };
        assert!(g.latch_geometry(idx, first));
        assert!(!g.latch_geometry(idx, Spherical { theta: 99.0, phi: 99.0 }));
        assert_eq!(g.cell(idx).and_then(|c| c.direction), Some(first));
    }

    #[test]
    fn reset_restores_sentinels() {
        let mut g = grid();
        for idx in [GridIndex::new(0, 0, 0), GridIndex::new(1, 2, 3)] {
            g.accumulate(idx, 5.0);
            g.latch_geometry(idx, Spherical { theta: 45.0, phi: 1.0 });
        }
        g.reset();
        assert!(g.iter().all(|(_, c)| *c == EnergyCell::default()));
    }

    #[test]
    fn iteration_order_matches_index_layout() {
        let g = grid();
        let idxs: Vec<GridIndex> = g.iter().map(|(i, _)| i).take(5).collect();
        assert_eq!(idxs[0], GridIndex::new(0, 0, 0));
        assert_eq!(idxs[3], GridIndex::new(0, 0, 3));
        assert_eq!(idxs[4], GridIndex::new(0, 1, 0));
        assert_eq!(g.iter().last().map(|(i, _)| i), Some(GridIndex::new(1, 2, 3)));
    }

    #[test]
    fn sample_clock_gates_the_window() {
        let clock = SampleClock::new(10.0, 95.0);
        assert_eq!(clock.samples(), 10);
        assert_eq!(clock.sample_of(0.0), Some(0));
        assert_eq!(clock.sample_of(9.999), Some(0));
        assert_eq!(clock.sample_of(10.0), Some(1));
        assert_eq!(clock.sample_of(94.9), Some(9));
        assert_eq!(clock.sample_of(95.0), None);
        assert_eq!(clock.sample_of(-1.0), None);
        assert_eq!(clock.sample_of(f64::NAN), None);
    }
}
