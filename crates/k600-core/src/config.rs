// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Detector configuration: thresholds, sampling windows, resolution and
//! enable flags for every subsystem.
//!
//! Units: energies keV, times ns, lengths mm. Every field has a default so a
//! partial JSON document is a valid config; [`DetectorConfig::validate`] is
//! the single place fatal configuration errors are raised.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::geometry::{TIARA_DETECTORS, VDC_U_WIRE_ANGLE_DEG, VDC_X_CELL_WIDTH};
use crate::grid::{SampleClock, MAX_TIME_SAMPLES};

/// Sampling period and window of one subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Width of one time sample (ns).
    pub sampling_period: f64,
    /// Steps at or after this time (ns) are ignored.
    pub total_sampled_time: f64,
}

impl TimingConfig {
    /// Convenience constructor.
    pub const fn new(sampling_period: f64, total_sampled_time: f64) -> Self {
        Self {
            sampling_period,
            total_sampled_time,
        }
    }

    /// Sample clock for this window.
    pub fn clock(&self) -> SampleClock {
        SampleClock::new(self.sampling_period, self.total_sampled_time)
    }

    fn validate(&self, subsystem: &'static str) -> Result<(), ConfigError> {
        if !(self.sampling_period.is_finite() && self.sampling_period > 0.0) {
            return Err(ConfigError::SamplingPeriod {
                subsystem,
                value: self.sampling_period,
            });
        }
        if !(self.total_sampled_time.is_finite() && self.total_sampled_time > 0.0) {
            return Err(ConfigError::SampledWindow {
                subsystem,
                value: self.total_sampled_time,
            });
        }
        if (self.total_sampled_time / self.sampling_period).ceil() > f64::from(MAX_TIME_SAMPLES) {
            return Err(ConfigError::TooManySamples {
                subsystem,
                period: self.sampling_period,
                total: self.total_sampled_time,
                max: MAX_TIME_SAMPLES,
            });
        }
        Ok(())
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::new(10.0, 100.0)
    }
}

/// Linear gain/offset applied to reported energies. Pass-through by default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyCalibration {
    /// Multiplier.
    pub gain: f64,
    /// Additive offset (keV).
    pub offset: f64,
}

impl EnergyCalibration {
    /// `gain * energy + offset`.
    pub fn apply(&self, energy: f64) -> f64 {
        self.gain * energy + self.offset
    }
}

impl Default for EnergyCalibration {
    fn default() -> Self {
        Self {
            gain: 1.0,
            offset: 0.0,
        }
    }
}

/// Silicon ring array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TiaraConfig {
    /// Sampling window.
    pub timing: TimingConfig,
    /// Unsmeared energy a pad must reach to be reported (keV).
    pub threshold: f64,
    /// Fixed resolution sigma applied to reported energies (keV).
    pub resolution_sigma: f64,
}

impl Default for TiaraConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            threshold: 20.0,
            resolution_sigma: 36.0,
        }
    }
}

/// Plastic scintillator paddles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaddleConfig {
    /// Sampling window.
    pub timing: TimingConfig,
    /// Nominal discriminator threshold (keV).
    pub threshold: f64,
    /// Relative energy resolution sigma.
    pub energy_resolution: f64,
    /// Relative time-of-flight resolution sigma.
    pub tof_resolution: f64,
    /// Relative jitter sigma of the threshold itself.
    pub threshold_jitter: f64,
    /// Absolute x-position resolution sigma (mm).
    pub position_sigma: f64,
    /// Emit qualifying samples to the paddle table.
    pub emit_rows: bool,
}

impl Default for PaddleConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::new(10.0, 1000.0),
            threshold: 500.0,
            energy_resolution: 0.10,
            tof_resolution: 0.05,
            threshold_jitter: 0.01,
            position_sigma: 4.8,
            emit_rows: false,
        }
    }
}

/// Clover HPGe array with BGO shields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloverConfig {
    /// Crystal sampling window.
    pub timing: TimingConfig,
    /// Shield sampling window. Shield samples are indexed on the same
    /// sample axis as the crystals when scanning the veto window.
    pub shield_timing: TimingConfig,
    /// Shield energy at or above which a veto fires (keV).
    pub shield_threshold: f64,
    /// Enable Compton suppression.
    pub compton_suppression: bool,
    /// Forward samples scanned for shield activity, starting at the crystal sample.
    pub compton_window: usize,
    /// Sum non-vetoed crystals per clover and sample.
    pub addback: bool,
}

impl Default for CloverConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            shield_timing: TimingConfig::default(),
            shield_threshold: 50.0,
            compton_suppression: true,
            compton_window: 3,
            addback: true,
        }
    }
}

/// Low-energy photon spectrometer array (four-crystal HPGe).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LepsConfig {
    /// Sampling window.
    pub timing: TimingConfig,
    /// Crystal and element threshold (keV).
    pub threshold: f64,
    /// Sum qualifying crystals per detector and sample.
    pub addback: bool,
    /// Sigma of the smeared threshold comparison (keV).
    pub trigger_sigma: f64,
    /// Sigma of the reported-energy resmear (keV).
    pub resolution_sigma: f64,
    /// Gain/offset applied to reported energies.
    pub calibration: EnergyCalibration,
}

impl Default for LepsConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            threshold: 10.0,
            addback: true,
            trigger_sigma: 0.7,
            resolution_sigma: 1.7,
            calibration: EnergyCalibration::default(),
        }
    }
}

/// NaI scintillator array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NaiConfig {
    /// Sampling window.
    pub timing: TimingConfig,
    /// Threshold (keV).
    pub threshold: f64,
    /// Sigma of the smeared threshold comparison (keV).
    pub trigger_sigma: f64,
    /// Sigma of the reported-energy resmear (keV).
    pub resolution_sigma: f64,
    /// Gain/offset applied to reported energies.
    pub calibration: EnergyCalibration,
}

impl Default for NaiConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            threshold: 30.0,
            trigger_sigma: 0.7,
            resolution_sigma: 1.7,
            calibration: EnergyCalibration::default(),
        }
    }
}

/// How the U-plane shear `-(1 / tan(50)) * y` interprets its angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShearConvention {
    /// `tan(50)` with the argument taken in radians, as existing output was produced.
    LegacyRadians,
    /// `tan(50°)`.
    Degrees,
}

impl ShearConvention {
    /// Shear slope `dx/dy` applied to the local y coordinate.
    pub fn slope(self) -> f64 {
        match self {
            Self::LegacyRadians => -1.0 / VDC_U_WIRE_ANGLE_DEG.tan(),
            Self::Degrees => -1.0 / VDC_U_WIRE_ANGLE_DEG.to_radians().tan(),
        }
    }
}

/// Vertical drift chambers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VdcConfig {
    /// Steps at or after this time (ns) are ignored.
    pub total_sampled_time: f64,
    /// Digitiser slots per event.
    pub hit_buffer_size: usize,
    /// U-plane cell pitch along local x (mm).
    pub u_cell_pitch: f64,
    /// U-plane shear convention.
    pub shear: ShearConvention,
}

impl Default for VdcConfig {
    fn default() -> Self {
        Self {
            total_sampled_time: 1000.0,
            hit_buffer_size: 100,
            u_cell_pitch: VDC_X_CELL_WIDTH / VDC_U_WIRE_ANGLE_DEG.to_radians().sin(),
            shear: ShearConvention::LegacyRadians,
        }
    }
}

/// Geometry-analysis (solid-angle calibration) mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Run the calibration reducer.
    pub enabled: bool,
    /// Latch per-channel angles each event and log them.
    pub angular_distribution: bool,
    /// Capture the world-volume direction into each input-distribution row.
    pub input_distribution: bool,
    /// Only the first TIARA-volume step of an event counts.
    pub line_of_sight: bool,
    /// Number of events in the run, used as the solid-angle denominator.
    pub events: u64,
    /// Write the artifacts when event `events - 1` closes. Workers whose sums
    /// are merged into a coordinator turn this off and leave finalisation to
    /// the coordinator's explicit `finalize`.
    pub finalize_at_last_event: bool,
    /// TIARA detectors covered by the lookup table.
    pub detectors: usize,
    /// Plain-text table artifact.
    pub table_path: PathBuf,
    /// Lookup-table source literal artifact.
    pub lookup_path: PathBuf,
    /// Per-event angular distribution listing.
    pub angular_log_path: PathBuf,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            angular_distribution: false,
            input_distribution: false,
            line_of_sight: false,
            events: 0,
            finalize_at_last_event: true,
            detectors: 4,
            table_path: PathBuf::from("K600SimOutput.txt"),
            lookup_path: PathBuf::from("K600SimOutput.h"),
            angular_log_path: PathBuf::from("AngDist.txt"),
        }
    }
}

/// Complete detector configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Silicon ring array.
    pub tiara: TiaraConfig,
    /// Scintillator paddles.
    pub paddle: PaddleConfig,
    /// Clover array.
    pub clover: CloverConfig,
    /// LEPS array.
    pub leps: LepsConfig,
    /// NaI array.
    pub nai: NaiConfig,
    /// Wire chambers.
    pub vdc: VdcConfig,
    /// Geometry calibration.
    pub calibration: CalibrationConfig,
}

impl DetectorConfig {
    /// Checks every section; the first problem found is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tiara.timing.validate("tiara")?;
        self.paddle.timing.validate("paddle")?;
        self.clover.timing.validate("clover")?;
        self.clover.shield_timing.validate("clover.shield")?;
        self.leps.timing.validate("leps")?;
        self.nai.timing.validate("nai")?;

        if !(self.vdc.total_sampled_time.is_finite() && self.vdc.total_sampled_time > 0.0) {
            return Err(ConfigError::SampledWindow {
                subsystem: "vdc",
                value: self.vdc.total_sampled_time,
            });
        }
        if self.vdc.hit_buffer_size == 0 {
            return Err(ConfigError::Invalid {
                subsystem: "vdc",
                reason: "hit buffer needs at least one slot".into(),
            });
        }
        if !(self.vdc.u_cell_pitch.is_finite() && self.vdc.u_cell_pitch > 0.0) {
            return Err(ConfigError::Invalid {
                subsystem: "vdc",
                reason: format!("u cell pitch must be positive, got {}", self.vdc.u_cell_pitch),
            });
        }
        if self.clover.compton_suppression && self.clover.compton_window == 0 {
            return Err(ConfigError::Invalid {
                subsystem: "clover",
                reason: "compton window must span at least one sample".into(),
            });
        }

        let cal = &self.calibration;
        if cal.enabled {
            if cal.events == 0 {
                return Err(ConfigError::CalibrationEvents);
            }
            if cal.detectors == 0 || cal.detectors > TIARA_DETECTORS {
                return Err(ConfigError::CalibrationDetectors {
                    value: cal.detectors,
                    max: TIARA_DETECTORS,
                });
            }
        }
        Ok(())
    }
}
