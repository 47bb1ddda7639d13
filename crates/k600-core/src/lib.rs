// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! k600-core: detector-response aggregation for the K600 spectrometer
//! simulation.
//!
//! Step records from the transport engine are binned per channel and time
//! sample, reduced at end-of-event by each subsystem (smearing, thresholds,
//! Compton veto, addback, wire-cell assignment) and committed as rows to an
//! [`OutputSink`]. The geometry calibration mode accumulates run-wide hit
//! statistics and writes per-channel angles and solid angles at the last
//! configured event.
#![forbid(unsafe_code)]

pub mod math;

pub mod calibration;
pub mod config;
mod config_store;
pub mod error;
mod event;
pub mod geometry;
pub mod grid;
pub mod processor;
mod resolution;
mod ring;
pub mod sink;
mod step;

pub use calibration::{CalibrationAccumulator, ChannelGeometry, GeometryCalibrationReducer};
pub use config::DetectorConfig;
pub use config_store::{ConfigService, ConfigStore};
pub use error::{CalibrationError, ConfigError, EventError, SinkError};
pub use event::{EventAggregator, EventSummary};
pub use grid::{ChannelTimeGrid, GridIndex, GridShape, SampleClock};
pub use math::{to_spherical, Prng, Spherical, Vec3};
pub use resolution::{GaussianSource, MeanSource, ScriptedSource};
pub use ring::{Assignment, HitRingBuffer, HitSlot};
pub use sink::{Cell, MemorySink, OutputSink, Row, TableId};
pub use step::{Particle, StepRecord, Volume};
