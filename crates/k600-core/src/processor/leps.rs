// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Low-energy photon spectrometers: four-crystal HPGe detectors with
//! threshold gating and optional addback.
//!
//! Row layout: flag in column `i`, calibrated energy in column `i + 8` for
//! detector `i`.

use tracing::trace;

use super::{discriminate, Processor};
use crate::config::LepsConfig;
use crate::geometry::{split_copy_number, LEPS_CRYSTALS, LEPS_DETECTORS};
use crate::grid::{ChannelTimeGrid, GridIndex, GridShape, SampleClock};
use crate::resolution::GaussianSource;
use crate::sink::{Row, TableId};
use crate::step::{StepRecord, Volume};

/// LEPS array state for one event.
#[derive(Debug, Clone)]
pub struct LepsArray {
    config: LepsConfig,
    clock: SampleClock,
    crystals: ChannelTimeGrid<f64>,
    energy: ChannelTimeGrid<f64>,
}

impl LepsArray {
    /// Builds an empty array.
    pub fn new(config: LepsConfig) -> Self {
        let clock = config.timing.clock();
        let samples = clock.samples();
        Self {
            crystals: ChannelTimeGrid::new(GridShape::new(LEPS_DETECTORS, LEPS_CRYSTALS, samples)),
            energy: ChannelTimeGrid::new(GridShape::new(LEPS_DETECTORS, 1, samples)),
            config,
            clock,
        }
    }

    /// Crystal energy: raw before reduction, resmeared for qualifying
    /// crystals after it.
    pub fn crystal_energy(&self, detector: usize, crystal: usize, sample: usize) -> f64 {
        self.crystals
            .cell(GridIndex::new(detector, crystal, sample))
            .copied()
            .unwrap_or_default()
    }

    /// Detector-level energy at `sample` after reduction (uncalibrated).
    pub fn detector_energy(&self, detector: usize, sample: usize) -> f64 {
        self.energy
            .cell(GridIndex::new(detector, 0, sample))
            .copied()
            .unwrap_or_default()
    }
}

impl Processor for LepsArray {
    fn name(&self) -> &'static str {
        "leps"
    }

    fn reset(&mut self) {
        self.crystals.reset();
        self.energy.reset();
    }

    fn ingest(&mut self, step: &StepRecord) -> bool {
        if step.volume != Volume::LepsCrystal || step.energy_deposit <= 0.0 {
            return false;
        }
        let Some(sample) = self.clock.sample_of(step.time) else {
            trace!(time = step.time, "leps step outside sampled window");
            return false;
        };
        let Ok(copy) = usize::try_from(step.copy_number) else {
            return false;
        };
        let (detector, crystal) = split_copy_number(copy, LEPS_CRYSTALS);
        match self.crystals.cell_mut(GridIndex::new(detector, crystal, sample)) {
            Some(cell) => {
                *cell += step.energy_deposit;
                true
            }
            None => false,
        }
    }

    fn reduce(&mut self, rng: &mut dyn GaussianSource) -> Vec<Row> {
        let cfg = &self.config;
        let samples = self.crystals.shape().samples;
        let mut row = Row::new(TableId::Leps);
        let mut triggered = false;

        for detector in 0..LEPS_DETECTORS {
            for sample in 0..samples {
                let mut total = 0.0_f64;
                for crystal in 0..LEPS_CRYSTALS {
                    let idx = GridIndex::new(detector, crystal, sample);
                    let Some(cell) = self.crystals.cell_mut(idx) else {
                        continue;
                    };
                    if *cell <= 0.0 {
                        continue;
                    }
                    let Some(e) = discriminate(
                        rng,
                        *cell,
                        cfg.threshold,
                        cfg.trigger_sigma,
                        cfg.resolution_sigma,
                    ) else {
                        continue;
                    };
                    *cell = e;
                    total = if cfg.addback { total + e } else { total.max(e) };
                }
                if let Some(slot) = self.energy.cell_mut(GridIndex::new(detector, 0, sample)) {
                    *slot = total;
                }
                if total > 0.0 && total >= cfg.threshold {
                    row.set_int(detector, 1)
                        .set_double(detector + LEPS_DETECTORS, cfg.calibration.apply(total));
                    triggered = true;
                }
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
    use crate::config::EnergyCalibration;
    use crate::resolution::{MeanSource, ScriptedSource};
    use crate::sink::Cell;

    fn hit(detector: u32, crystal: u32, e: f64) -> StepRecord {
        StepRecord::new(Volume::LepsCrystal, detector * 4 + crystal).with_deposit(e)
    }

    #[test]
    fn addback_sums_qualifying_crystals_then_rechecks_threshold() {
        let mut leps = LepsArray::new(LepsConfig {
            threshold: 10.0,
            ..LepsConfig::default()
        });
        leps.ingest(&hit(2, 0, 6.0));
        leps.ingest(&hit(2, 1, 30.0));
        leps.ingest(&hit(2, 2, 25.0));
        let rows = leps.reduce(&mut MeanSource);
        assert_eq!(leps.detector_energy(2, 0), 55.0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(2), Some(Cell::Int(1)));
        assert_eq!(rows[0].get(10), Some(Cell::Double(55.0)));
    }

    #[test]
    fn gain_and_offset_apply_to_reported_energy() {
        let mut leps = LepsArray::new(LepsConfig {
            calibration: EnergyCalibration {
                gain: 2.0,
                offset: 1.0,
            },
            ..LepsConfig::default()
        });
        leps.ingest(&hit(0, 3, 40.0));
        let rows = leps.reduce(&mut MeanSource);
        assert_eq!(rows[0].get(8), Some(Cell::Double(81.0)));
    }

    #[test]
    fn resmear_is_folded_non_negative() {
        let mut leps = LepsArray::new(LepsConfig {
            threshold: 1.0,
            resolution_sigma: 10.0,
            ..LepsConfig::default()
        });
        leps.ingest(&hit(1, 0, 5.0));
        // Trigger draw passes, resolution draw lands at 5 - 20 = -15.
        let mut rng = ScriptedSource::new([0.0, -2.0]);
        leps.reduce(&mut rng);
        assert_eq!(leps.crystal_energy(1, 0, 0), 15.0);
    }

    #[test]
    fn below_threshold_emits_nothing() {
        let mut leps = LepsArray::new(LepsConfig::default());
        leps.ingest(&hit(0, 0, 2.0));
        assert!(leps.reduce(&mut MeanSource).is_empty());
        assert_eq!(leps.crystal_energy(0, 0, 0), 2.0);
    }
}
