// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Clover HPGe array with BGO anti-Compton shields, and the gamma station
//! that reports it together with the moderator boxes.
//!
//! Gamma-table column layout (`n` = number of clovers):
//!
//! | columns       | content                                      |
//! |---------------|----------------------------------------------|
//! | `0..n`        | clover fired flag                            |
//! | `n..2n`       | clover energy (addback sum or best crystal)  |
//! | `2n..3n`      | clover incident gamma energy                 |
//! | `3n..3n+3`    | paraffin flag, energy, incident energy       |
//! | `3n+3..3n+6`  | iron flag, energy, incident energy           |

use tracing::trace;

use super::moderator::{ModeratorBox, ModeratorReading};
use super::Processor;
use crate::config::CloverConfig;
use crate::geometry::{split_copy_number, CLOVERS, CLOVER_CRYSTALS, CLOVER_SHIELD_SEGMENTS};
use crate::grid::{ChannelTimeGrid, GridIndex, GridShape, SampleClock};
use crate::resolution::GaussianSource;
use crate::sink::{Row, TableId};
use crate::step::{StepRecord, Volume};

/// First clover flag column.
pub const GAMMA_FLAG_COLUMN: usize = 0;
/// First clover energy column.
pub const GAMMA_ENERGY_COLUMN: usize = CLOVERS;
/// First clover incident-energy column.
pub const GAMMA_INCIDENT_COLUMN: usize = 2 * CLOVERS;
/// Paraffin box flag column; energy and incident energy follow.
pub const PARAFFIN_COLUMN: usize = 3 * CLOVERS;
/// Iron box flag column; energy and incident energy follow.
pub const IRON_COLUMN: usize = PARAFFIN_COLUMN + 3;

/// Clover crystals and shields for one event.
#[derive(Debug, Clone)]
pub struct CloverArray {
    config: CloverConfig,
    clock: SampleClock,
    shield_clock: SampleClock,
    crystals: ChannelTimeGrid<f64>,
    vetoed: ChannelTimeGrid<bool>,
    shields: ChannelTimeGrid<f64>,
    energy: ChannelTimeGrid<f64>,
    incident: [Option<f64>; CLOVERS],
    triggered: bool,
}

impl CloverArray {
    /// Builds an empty array.
    pub fn new(config: CloverConfig) -> Self {
        let clock = config.timing.clock();
        let shield_clock = config.shield_timing.clock();
        let samples = clock.samples();
        Self {
            crystals: ChannelTimeGrid::new(GridShape::new(CLOVERS, CLOVER_CRYSTALS, samples)),
            vetoed: ChannelTimeGrid::new(GridShape::new(CLOVERS, CLOVER_CRYSTALS, samples)),
            shields: ChannelTimeGrid::new(GridShape::new(
                CLOVERS,
                CLOVER_SHIELD_SEGMENTS,
                shield_clock.samples(),
            )),
            energy: ChannelTimeGrid::new(GridShape::new(CLOVERS, 1, samples)),
            incident: [None; CLOVERS],
            triggered: false,
            config,
            clock,
            shield_clock,
        }
    }

    /// Restores every grid and latch.
    pub fn reset(&mut self) {
        self.crystals.reset();
        self.vetoed.reset();
        self.shields.reset();
        self.energy.reset();
        self.incident = [None; CLOVERS];
        self.triggered = false;
    }

    /// Routes HPGe and BGO steps; returns whether the step was kept.
    pub fn ingest(&mut self, step: &StepRecord) -> bool {
        match step.volume {
            Volume::CloverCrystal => self.ingest_crystal(step),
            Volume::CloverShield => self.ingest_shield(step),
            _ => false,
        }
    }

    fn ingest_crystal(&mut self, step: &StepRecord) -> bool {
        if !step.is_gamma() || step.energy_deposit <= 0.0 {
            return false;
        }
        let Some(sample) = self.clock.sample_of(step.time) else {
            trace!(time = step.time, "clover step outside sampled window");
            return false;
        };
        let Ok(copy) = usize::try_from(step.copy_number) else {
            return false;
        };
        let (clover, crystal) = split_copy_number(copy, CLOVER_CRYSTALS);
        let Some(cell) = self.crystals.cell_mut(GridIndex::new(clover, crystal, sample)) else {
            trace!(copy, "clover copy number outside array");
            return false;
        };
        *cell += step.energy_deposit;
        self.incident[clover].get_or_insert(step.kinetic_energy);
        true
    }

    fn ingest_shield(&mut self, step: &StepRecord) -> bool {
        if step.energy_deposit <= 0.0 {
            return false;
        }
        let Some(sample) = self.shield_clock.sample_of(step.time) else {
            trace!(time = step.time, "shield step outside sampled window");
            return false;
        };
        let Ok(copy) = usize::try_from(step.copy_number) else {
            return false;
        };
        let (clover, segment) = split_copy_number(copy, CLOVER_SHIELD_SEGMENTS);
        match self.shields.cell_mut(GridIndex::new(clover, segment, sample)) {
            Some(cell) => {
                *cell += step.energy_deposit;
                true
            }
            None => false,
        }
    }

    /// `true` when any shield segment of `clover` reaches the shield threshold
    /// in samples `sample..sample + window`.
    fn shield_fired(&self, clover: usize, sample: usize) -> bool {
        let last = (sample + self.config.compton_window).min(self.shields.shape().samples);
        (sample..last).any(|s| {
            (0..CLOVER_SHIELD_SEGMENTS).any(|m| {
                self.shields
                    .cell(GridIndex::new(clover, m, s))
                    .is_some_and(|e| *e >= self.config.shield_threshold)
            })
        })
    }

    /// Applies the Compton veto and builds the per-clover energy series.
    /// Repeated calls within one event give the same result.
    ///
    /// Returns whether any crystal had raw energy before the veto.
    pub fn resolve(&mut self) -> bool {
        self.energy.reset();
        let samples = self.crystals.shape().samples;
        for clover in 0..CLOVERS {
            for sample in 0..samples {
                for crystal in 0..CLOVER_CRYSTALS {
                    let idx = GridIndex::new(clover, crystal, sample);
                    let mut e = self.crystals.cell(idx).copied().unwrap_or_default();
                    if e <= 0.0 {
                        continue;
                    }
                    self.triggered = true;
                    if self.config.compton_suppression && self.shield_fired(clover, sample) {
                        if let Some(v) = self.vetoed.cell_mut(idx) {
                            *v = true;
                        }
                        if let Some(c) = self.crystals.cell_mut(idx) {
                            *c = 0.0;
                        }
                        e = 0.0;
                    }
                    if e <= 0.0 {
                        continue;
                    }
                    if let Some(total) = self.energy.cell_mut(GridIndex::new(clover, 0, sample)) {
                        *total = if self.config.addback { *total + e } else { total.max(e) };
                    }
                }
            }
        }
        self.triggered
    }

    /// Crystal energy; after [`CloverArray::resolve`] vetoed samples read `0`.
    pub fn crystal_energy(&self, clover: usize, crystal: usize, sample: usize) -> f64 {
        self.crystals
            .cell(GridIndex::new(clover, crystal, sample))
            .copied()
            .unwrap_or_default()
    }

    /// Whether the crystal sample was vetoed by its shield.
    pub fn vetoed(&self, clover: usize, crystal: usize, sample: usize) -> bool {
        self.vetoed
            .cell(GridIndex::new(clover, crystal, sample))
            .copied()
            .unwrap_or_default()
    }

    /// Clover-level energy at `sample`: the addback sum of non-vetoed
    /// crystals, or the largest non-vetoed crystal when addback is off.
    pub fn clover_energy(&self, clover: usize, sample: usize) -> f64 {
        self.energy
            .cell(GridIndex::new(clover, 0, sample))
            .copied()
            .unwrap_or_default()
    }

    /// Latched incident gamma energy of `clover`, `0` when unset.
    pub fn incident_energy(&self, clover: usize) -> f64 {
        self.incident
            .get(clover)
            .copied()
            .flatten()
            .unwrap_or_default()
    }

    /// Writes the clover columns of the gamma row.
    pub fn write_columns(&self, row: &mut Row) {
        let samples = self.energy.shape().samples;
        for clover in 0..CLOVERS {
            for sample in 0..samples {
                let e = self.clover_energy(clover, sample);
                if e > 0.0 {
                    row.set_int(GAMMA_FLAG_COLUMN + clover, 1)
                        .set_double(GAMMA_ENERGY_COLUMN + clover, e);
                }
            }
            row.set_double(GAMMA_INCIDENT_COLUMN + clover, self.incident_energy(clover));
        }
    }
}

/// Clover array plus paraffin and iron boxes, reported as one gamma row.
#[derive(Debug, Clone)]
pub struct GammaStation {
    clovers: CloverArray,
    paraffin: ModeratorBox,
    iron: ModeratorBox,
}

impl GammaStation {
    /// Builds the station.
    pub fn new(config: CloverConfig) -> Self {
        Self {
            clovers: CloverArray::new(config),
            paraffin: ModeratorBox::paraffin(),
            iron: ModeratorBox::iron(),
        }
    }

    /// Clover array state.
    pub fn clovers(&self) -> &CloverArray {
        &self.clovers
    }

    /// Paraffin box state.
    pub fn paraffin(&self) -> ModeratorReading {
        self.paraffin.reading()
    }

    /// Iron box state.
    pub fn iron(&self) -> ModeratorReading {
        self.iron.reading()
    }
}

fn write_box(row: &mut Row, column: usize, reading: ModeratorReading) {
    if reading.triggered {
        row.set_int(column, 1)
            .set_double(column + 1, reading.energy)
            .set_double(column + 2, reading.incident_energy);
    }
}

impl Processor for GammaStation {
    fn name(&self) -> &'static str {
        "gamma"
    }

    fn reset(&mut self) {
        self.clovers.reset();
        self.paraffin.reset();
        self.iron.reset();
    }

    fn ingest(&mut self, step: &StepRecord) -> bool {
        match step.volume {
            Volume::CloverCrystal | Volume::CloverShield => self.clovers.ingest(step),
            Volume::ParaffinBox => self.paraffin.ingest(step),
            Volume::IronBox => self.iron.ingest(step),
            _ => false,
        }
    }

    fn reduce(&mut self, _rng: &mut dyn GaussianSource) -> Vec<Row> {
        let clover_triggered = self.clovers.resolve();
        let paraffin = self.paraffin.reading();
        let iron = self.iron.reading();
        if !(clover_triggered || paraffin.triggered || iron.triggered) {
            return Vec::new();
        }
        let mut row = Row::new(TableId::Gamma);
        if clover_triggered {
            self.clovers.write_columns(&mut row);
        }
        write_box(&mut row, PARAFFIN_COLUMN, paraffin);
        write_box(&mut row, IRON_COLUMN, iron);
        vec![row]
    }
}
