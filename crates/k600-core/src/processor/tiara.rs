// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Silicon ring array (TIARA).

use tracing::trace;

use super::Processor;
use crate::config::TiaraConfig;
use crate::geometry::{TiaraChannel, TIARA_CHANNELS_PER_DETECTOR, TIARA_DETECTORS, TIARA_SECTORS};
use crate::grid::{ChannelTimeGrid, EnergyCell, GridIndex, GridShape, SampleClock};
use crate::resolution::GaussianSource;
use crate::sink::{Row, TableId};
use crate::step::{StepRecord, Volume};

/// Per-pad, per-sample energy with the first hit's direction latched.
#[derive(Debug, Clone)]
pub struct TiaraArray {
    config: TiaraConfig,
    clock: SampleClock,
    grid: ChannelTimeGrid<EnergyCell>,
}

impl TiaraArray {
    /// Builds an empty array.
    pub fn new(config: TiaraConfig) -> Self {
        let clock = config.timing.clock();
        let shape = GridShape::new(TIARA_DETECTORS, TIARA_CHANNELS_PER_DETECTOR, clock.samples());
        Self {
            config,
            clock,
            grid: ChannelTimeGrid::new(shape),
        }
    }

    /// Underlying grid (`element` = detector, `sub` = pad).
    pub fn grid(&self) -> &ChannelTimeGrid<EnergyCell> {
        &self.grid
    }

    /// Grid index for `channel` at time-sample `sample`.
    pub const fn index(channel: TiaraChannel, sample: usize) -> GridIndex {
        GridIndex::new(channel.detector, channel.pad(), sample)
    }
}

impl Processor for TiaraArray {
    fn name(&self) -> &'static str {
        "tiara"
    }

    fn reset(&mut self) {
        self.grid.reset();
    }

    fn ingest(&mut self, step: &StepRecord) -> bool {
        if step.volume != Volume::TiaraActiveArea || step.energy_deposit <= 0.0 {
            return false;
        }
        let Some(sample) = self.clock.sample_of(step.time) else {
            trace!(time = step.time, "tiara step outside sampled window");
            return false;
        };
        let Ok(copy) = usize::try_from(step.copy_number) else {
            return false;
        };
        let channel = TiaraChannel::from_channel_id(copy);
        if !channel.in_array() {
            trace!(copy, "tiara copy number outside array");
            return false;
        }
        let idx = Self::index(channel, sample);
        self.grid.latch_geometry(idx, step.world_position.to_spherical());
        self.grid.accumulate(idx, step.energy_deposit)
    }

    fn reduce(&mut self, rng: &mut dyn GaussianSource) -> Vec<Row> {
        let threshold = self.config.threshold;
        let sigma = self.config.resolution_sigma;
        let mut rows = Vec::new();
        for (idx, cell) in self.grid.iter() {
            if cell.energy < threshold || cell.energy <= 0.0 {
                continue;
            }
            let direction = cell.direction.unwrap_or_default();
            let channel = TiaraChannel {
                detector: idx.element,
                row: idx.sub / TIARA_SECTORS,
                sector: idx.sub % TIARA_SECTORS,
            };
            let mut row = Row::new(TableId::Tiara);
            row.set_index(0, channel.detector)
                .set_index(1, channel.row)
                .set_index(2, channel.sector)
                .set_double(3, rng.gaussian(cell.energy, sigma))
                .set_double(4, direction.theta)
                .set_double(5, direction.phi);
            rows.push(row);
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;
    use crate::resolution::{MeanSource, ScriptedSource};
    use crate::sink::Cell;

    fn array() -> TiaraArray {
        TiaraArray::new(TiaraConfig::default())
    }

    fn pad_step(copy: u32, energy: f64) -> StepRecord {
        StepRecord::new(Volume::TiaraActiveArea, copy)
            .with_particle(crate::step::Particle::Proton)
            .with_deposit(energy)
    }

    #[test]
    fn threshold_uses_unsmeared_energy() {
        let mut tiara = array();
        let threshold = TiaraConfig::default().threshold;
        assert!(tiara.ingest(&pad_step(0, threshold)));
        // A large negative deviate would drop a smeared comparison below threshold.
        let mut rng = ScriptedSource::new([-5.0]);
        let rows = tiara.reduce(&mut rng);
        assert_eq!(rows.len(), 1);
        assert_eq!(rng.draws(), 1);
        assert!(rows[0].get(3).map_or(0.0, Cell::as_f64) < threshold);
    }

    #[test]
    fn later_hits_keep_the_first_direction() {
        let mut tiara = array();
        tiara.ingest(&pad_step(9, 30.0).at_world(Vec3::new(0.0, 1.0, 1.0)));
        tiara.ingest(&pad_step(9, 30.0).at_world(Vec3::new(0.0, -1.0, -1.0)));
        let rows = tiara.reduce(&mut MeanSource);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(3), Some(Cell::Double(60.0)));
        assert_eq!(rows[0].get(5), Some(Cell::Double(90.0)));
        assert!((rows[0].get(4).map_or(0.0, Cell::as_f64) - 45.0).abs() < 1e-9);
    }

    #[test]
    fn filters_out_of_window_and_foreign_steps() {
        let mut tiara = array();
        let window = TiaraConfig::default().timing.total_sampled_time;
        assert!(!tiara.ingest(&pad_step(0, 50.0).at_time(window)));
        assert!(!tiara.ingest(&pad_step(0, 0.0)));
        assert!(!tiara.ingest(&pad_step(5 * 128, 50.0)));
        assert!(!tiara.ingest(&StepRecord::new(Volume::TiaraPcb, 0).with_deposit(50.0)));
        assert!(tiara.reduce(&mut MeanSource).is_empty());
    }
}
