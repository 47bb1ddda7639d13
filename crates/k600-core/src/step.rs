// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Step records handed over by the particle-transport engine.

use serde::{Deserialize, Serialize};

use crate::math::Vec3;

/// Sensitive (or bookkeeping) volume a step started in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Volume {
    /// TIARA active-area ring sectors (the readout pads).
    TiaraActiveArea,
    /// TIARA silicon wafer outside the active area.
    TiaraSiliconWafer,
    /// TIARA printed circuit board.
    TiaraPcb,
    /// Wire-chamber sense region; the copy number selects the plane.
    VdcSenseRegion,
    /// Plastic scintillator paddle.
    Paddle,
    /// Clover HPGe crystal.
    CloverCrystal,
    /// Clover BGO anti-Compton shield crystal.
    CloverShield,
    /// Paraffin moderator box.
    ParaffinBox,
    /// Iron moderator box.
    IronBox,
    /// Low-energy photon spectrometer HPGe crystal.
    LepsCrystal,
    /// NaI scintillator crystal.
    NaiCrystal,
    /// The world volume.
    World,
    /// Anything the processors do not care about.
    #[serde(other)]
    Other,
}

/// Particle species of the track that made the step.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Particle {
    /// Photon.
    Gamma,
    /// Neutron.
    Neutron,
    /// Proton.
    Proton,
    /// Electron.
    Electron,
    /// Alpha particle.
    Alpha,
    /// Anything else.
    #[serde(other)]
    Other,
}

/// One quantum of energy deposition.
///
/// Units: energies keV, time ns since event start, local positions mm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Event the step belongs to.
    #[serde(default)]
    pub event: u64,
    /// Volume the pre-step point lies in.
    pub volume: Volume,
    /// Copy number of that volume.
    #[serde(default)]
    pub copy_number: u32,
    /// Track species.
    pub particle: Particle,
    /// Parent track id; `0` marks the primary.
    #[serde(default)]
    pub parent_id: u32,
    /// Total energy deposited by the step.
    #[serde(default)]
    pub energy_deposit: f64,
    /// Kinetic energy at the pre-step point.
    #[serde(default)]
    pub kinetic_energy: f64,
    /// Pre-step position in the world frame.
    #[serde(default)]
    pub world_position: Vec3,
    /// Pre-step position in the volume's local frame.
    #[serde(default)]
    pub local_position: Vec3,
    /// Global time of the pre-step point.
    #[serde(default)]
    pub time: f64,
}

impl StepRecord {
    /// A zero-energy gamma step at the origin of `volume`/`copy_number`.
    pub fn new(volume: Volume, copy_number: u32) -> Self {
        Self {
            event: 0,
            volume,
            copy_number,
            particle: Particle::Gamma,
            parent_id: 0,
            energy_deposit: 0.0,
            kinetic_energy: 0.0,
            world_position: Vec3::ZERO,
            local_position: Vec3::ZERO,
            time: 0.0,
        }
    }

    /// Sets the deposited energy.
    pub fn with_deposit(mut self, energy: f64) -> Self {
        self.energy_deposit = energy;
        self
    }

    /// Sets the pre-step kinetic energy.
    pub fn with_kinetic_energy(mut self, energy: f64) -> Self {
        self.kinetic_energy = energy;
        self
    }

    /// Sets the global time.
    pub fn at_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    /// Sets the world-frame position.
    pub fn at_world(mut self, position: Vec3) -> Self {
        self.world_position = position;
        self
    }

    /// Sets the local-frame position.
    pub fn at_local(mut self, position: Vec3) -> Self {
        self.local_position = position;
        self
    }

    /// Sets the particle species.
    pub fn with_particle(mut self, particle: Particle) -> Self {
        self.particle = particle;
        self
    }

    /// Sets the parent track id.
    pub fn with_parent(mut self, parent_id: u32) -> Self {
        self.parent_id = parent_id;
        self
    }

    /// Sets the event id.
    pub fn in_event(mut self, event: u64) -> Self {
        self.event = event;
        self
    }

    /// `true` for steps of the primary track.
    pub const fn is_primary(&self) -> bool {
        self.parent_id == 0
    }

    /// `true` for photon steps.
    pub fn is_gamma(&self) -> bool {
        self.particle == Particle::Gamma
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_line_round_trips_with_defaults() {
        let line = r#"{"volume":"tiara_active_area","copy_number":283,"particle":"proton","energy_deposit":50.0,"world_position":[1.0,2.0,3.0],"time":4.5}"#;
        let step: StepRecord = serde_json::from_str(line).expect("parse step");
        assert_eq!(step.volume, Volume::TiaraActiveArea);
        assert_eq!(step.particle, Particle::Proton);
        assert_eq!(step.world_position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(step.local_position, Vec3::ZERO);
        assert!(step.is_primary());
    }

    #[test]
    fn unknown_volume_and_particle_map_to_other() {
        let line = r#"{"volume":"beam_pipe","particle":"pi+"}"#;
        let step: StepRecord = serde_json::from_str(line).expect("parse step");
        assert_eq!(step.volume, Volume::Other);
        assert_eq!(step.particle, Particle::Other);
    }
}
