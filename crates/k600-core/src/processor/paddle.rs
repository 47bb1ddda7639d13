// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Plastic scintillator paddles: energy, time of flight and position.

use tracing::trace;

use super::Processor;
use crate::config::PaddleConfig;
use crate::geometry::PADDLES;
use crate::grid::{ChannelTimeGrid, GridIndex, GridShape, SampleClock};
use crate::resolution::GaussianSource;
use crate::sink::{Row, TableId};
use crate::step::{StepRecord, Volume};

#[derive(Debug, Copy, Clone, PartialEq, Default)]
struct PaddleCell {
    energy: f64,
    weighted_x: f64,
    weighted_y: f64,
    tof: Option<f64>,
}

/// Reconstructed paddle sample after end-of-event processing.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PaddleReading {
    /// Paddle number.
    pub paddle: usize,
    /// Time-sample bucket.
    pub sample: usize,
    /// Smeared energy (keV).
    pub energy: f64,
    /// Time of flight (ns); smeared only when the sample qualified.
    pub tof: f64,
    /// Smeared energy-weighted local x (mm).
    pub x: f64,
    /// Energy-weighted local y (mm).
    pub y: f64,
    /// Smeared energy reached the jittered threshold.
    pub qualified: bool,
}

/// Paddle array. Readings are kept for downstream consumers; rows are only
/// emitted when [`PaddleConfig::emit_rows`] is set.
#[derive(Debug, Clone)]
pub struct PaddleArray {
    config: PaddleConfig,
    clock: SampleClock,
    grid: ChannelTimeGrid<PaddleCell>,
    readings: Vec<PaddleReading>,
}

impl PaddleArray {
    /// Builds an empty array.
    pub fn new(config: PaddleConfig) -> Self {
        let clock = config.timing.clock();
        Self {
            grid: ChannelTimeGrid::new(GridShape::new(PADDLES, 1, clock.samples())),
            config,
            clock,
            readings: Vec::new(),
        }
    }

    /// Readings produced by the last reduction, in paddle → sample order.
    pub fn readings(&self) -> &[PaddleReading] {
        &self.readings
    }

    /// Raw accumulated energy of `paddle` at `sample`.
    pub fn energy(&self, paddle: usize, sample: usize) -> f64 {
        self.grid
            .cell(GridIndex::new(paddle, 0, sample))
            .map_or(0.0, |c| c.energy)
    }
}

impl Processor for PaddleArray {
    fn name(&self) -> &'static str {
        "paddle"
    }

    fn reset(&mut self) {
        self.grid.reset();
        self.readings.clear();
    }

    fn ingest(&mut self, step: &StepRecord) -> bool {
        if step.volume != Volume::Paddle {
            return false;
        }
        let Some(sample) = self.clock.sample_of(step.time) else {
            trace!(time = step.time, "paddle step outside sampled window");
            return false;
        };
        let Ok(paddle) = usize::try_from(step.copy_number) else {
            return false;
        };
        let Some(cell) = self.grid.cell_mut(GridIndex::new(paddle, 0, sample)) else {
            trace!(paddle, "paddle copy number outside array");
            return false;
        };
        let e = step.energy_deposit;
        cell.energy += e;
        cell.weighted_x += e * step.local_position.x();
        cell.weighted_y += e * step.local_position.y();
        cell.tof = Some(cell.tof.map_or(step.time, |t| t.min(step.time)));
        true
    }

    fn reduce(&mut self, rng: &mut dyn GaussianSource) -> Vec<Row> {
        let cfg = &self.config;
        self.readings.clear();
        for (idx, cell) in self.grid.iter() {
            if cell.energy <= 0.0 {
                continue;
            }
            let x = rng.gaussian(cell.weighted_x / cell.energy, cfg.position_sigma);
            let y = cell.weighted_y / cell.energy;
            let energy = rng.gaussian(cell.energy, cfg.energy_resolution * cell.energy);
            let threshold = rng.gaussian(cfg.threshold, cfg.threshold_jitter * cfg.threshold);
            let qualified = energy >= threshold;
            let raw_tof = cell.tof.unwrap_or_default();
            let tof = if qualified {
                rng.gaussian(raw_tof, cfg.tof_resolution * raw_tof)
            } else {
                raw_tof
            };
            self.readings.push(PaddleReading {
                paddle: idx.element,
                sample: idx.sample,
                energy,
                tof,
                x,
                y,
                qualified,
            });
        }

        if !cfg.emit_rows {
            return Vec::new();
        }
        self.readings
            .iter()
            .filter(|r| r.qualified)
            .map(|r| {
                let mut row = Row::new(TableId::Paddle);
                row.set_index(0, r.paddle)
                    .set_index(1, r.sample)
                    .set_double(2, r.energy)
                    .set_double(3, r.tof)
                    .set_double(4, r.x)
                    .set_double(5, r.y);
                row
            })
            .collect()
    }
}
