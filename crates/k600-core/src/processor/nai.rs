// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! NaI scintillator array: threshold only, no sub-crystals.

use tracing::trace;

use super::{discriminate, Processor};
use crate::config::NaiConfig;
use crate::geometry::NAI_DETECTORS;
use crate::grid::{ChannelTimeGrid, GridIndex, GridShape, SampleClock};
use crate::resolution::GaussianSource;
use crate::sink::{Row, TableId};
use crate::step::{StepRecord, Volume};

/// NaI array state for one event. Row layout: flag in column `i`,
/// calibrated energy in column `i + 5`.
#[derive(Debug, Clone)]
pub struct NaiArray {
    config: NaiConfig,
    clock: SampleClock,
    grid: ChannelTimeGrid<f64>,
}

impl NaiArray {
    /// Builds an empty array.
    pub fn new(config: NaiConfig) -> Self {
        let clock = config.timing.clock();
        Self {
            grid: ChannelTimeGrid::new(GridShape::new(NAI_DETECTORS, 1, clock.samples())),
            config,
            clock,
        }
    }

    /// Detector energy: raw before reduction, resmeared after it when the
    /// trigger passed.
    pub fn energy(&self, detector: usize, sample: usize) -> f64 {
        self.grid
            .cell(GridIndex::new(detector, 0, sample))
            .copied()
            .unwrap_or_default()
    }
}

impl Processor for NaiArray {
    fn name(&self) -> &'static str {
        "nai"
    }

    fn reset(&mut self) {
        self.grid.reset();
    }

    fn ingest(&mut self, step: &StepRecord) -> bool {
        if step.volume != Volume::NaiCrystal || step.energy_deposit <= 0.0 {
            return false;
        }
        let Some(sample) = self.clock.sample_of(step.time) else {
            trace!(time = step.time, "nai step outside sampled window");
            return false;
        };
        let Ok(detector) = usize::try_from(step.copy_number) else {
            return false;
        };
        match self.grid.cell_mut(GridIndex::new(detector, 0, sample)) {
            Some(cell) => {
                *cell += step.energy_deposit;
                true
            }
            None => false,
        }
    }

    fn reduce(&mut self, rng: &mut dyn GaussianSource) -> Vec<Row> {
        let cfg = &self.config;
        let mut row = Row::new(TableId::Nai);
        let mut triggered = false;
        for (idx, cell) in self.grid.iter_mut() {
            if *cell <= 0.0 {
                continue;
            }
            if let Some(e) =
                discriminate(rng, *cell, cfg.threshold, cfg.trigger_sigma, cfg.resolution_sigma)
            {
                *cell = e;
            }
            if *cell >= cfg.threshold {
                row.set_int(idx.element, 1)
                    .set_double(idx.element + NAI_DETECTORS, cfg.calibration.apply(*cell));
                triggered = true;
            }
        }
        if triggered {
            vec![row]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolution::ScriptedSource;
    use crate::sink::Cell;

    fn hit(detector: u32, e: f64) -> StepRecord {
        StepRecord::new(Volume::NaiCrystal, detector).with_deposit(e)
    }

    #[test]
    fn trigger_and_final_check_are_independent() {
        let mut nai = NaiArray::new(NaiConfig {
            threshold: 30.0,
            ..NaiConfig::default()
        });
        nai.ingest(&hit(0, 31.0));
        nai.ingest(&hit(4, 31.0));
        // Detector 0: trigger fails, raw 31 still passes the final check.
        // Detector 4: trigger passes, resmear drops it below threshold.
        let mut rng = ScriptedSource::new([-10.0, 0.0, -1.0]);
        let rows = nai.reduce(&mut rng);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(0), Some(Cell::Int(1)));
        assert_eq!(rows[0].get(5), Some(Cell::Double(31.0)));
        assert_eq!(rows[0].get(4), None);
        assert!((nai.energy(4, 0) - 29.3).abs() < 1e-9);
    }

    #[test]
    fn foreign_and_out_of_range_steps_are_filtered() {
        let mut nai = NaiArray::new(NaiConfig::default());
        assert!(!nai.ingest(&hit(5, 100.0)));
        assert!(!nai.ingest(&StepRecord::new(Volume::LepsCrystal, 0).with_deposit(100.0)));
        assert!(nai.ingest(&hit(1, 100.0)));
        nai.reset();
        assert_eq!(nai.energy(1, 0), 0.0);
    }
}
