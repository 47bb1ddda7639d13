// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Paraffin and iron moderator boxes: scalar gamma-energy sinks.

use crate::step::{StepRecord, Volume};

/// End-of-event state of one box.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct ModeratorReading {
    /// Any energy was deposited this event.
    pub triggered: bool,
    /// Total deposited energy (keV).
    pub energy: f64,
    /// Kinetic energy of the first depositing gamma (keV); `0` when unset.
    pub incident_energy: f64,
}

/// One box. Only gamma steps are counted and no time gate applies.
#[derive(Debug, Clone)]
pub struct ModeratorBox {
    volume: Volume,
    energy: f64,
    incident: Option<f64>,
}

impl ModeratorBox {
    /// Box listening on `volume` (paraffin or iron).
    pub const fn new(volume: Volume) -> Self {
        Self {
            volume,
            energy: 0.0,
            incident: None,
        }
    }

    /// Paraffin box.
    pub const fn paraffin() -> Self {
        Self::new(Volume::ParaffinBox)
    }

    /// Iron box.
    pub const fn iron() -> Self {
        Self::new(Volume::IronBox)
    }

    /// Clears the running total and the incident-energy latch.
    pub fn reset(&mut self) {
        self.energy = 0.0;
        self.incident = None;
    }

    /// Adds a gamma step in this box's volume; returns whether it counted.
    pub fn ingest(&mut self, step: &StepRecord) -> bool {
        if step.volume != self.volume || !step.is_gamma() || step.energy_deposit <= 0.0 {
            return false;
        }
        self.energy += step.energy_deposit;
        self.incident.get_or_insert(step.kinetic_energy);
        true
    }

    /// Current state.
    pub fn reading(&self) -> ModeratorReading {
        ModeratorReading {
            triggered: self.energy > 0.0,
            energy: self.energy,
            incident_energy: self.incident.unwrap_or_default(),
        }
    }
}
