// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error types for the fallible boundaries: configuration, row sinks, and
//! calibration artifacts. Step ingestion itself never fails.

use thiserror::Error;

/// Configuration load/validation failure. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key not present in store.
    #[error("not found")]
    NotFound,
    /// I/O error while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// A sampling period was zero, negative, or not finite.
    #[error("{subsystem}: sampling period must be positive, got {value}")]
    SamplingPeriod {
        /// Subsystem section name.
        subsystem: &'static str,
        /// Offending value.
        value: f64,
    },
    /// A sampled-time window was zero, negative, or not finite.
    #[error("{subsystem}: total sampled time must be positive, got {value}")]
    SampledWindow {
        /// Subsystem section name.
        subsystem: &'static str,
        /// Offending value.
        value: f64,
    },
    /// The sampling period is so small relative to the window that the
    /// derived grid would exceed the supported number of time samples.
    #[error("{subsystem}: {period} ns samples over {total} ns exceed {max} time samples")]
    TooManySamples {
        /// Subsystem section name.
        subsystem: &'static str,
        /// Sampling period (ns).
        period: f64,
        /// Sampled window (ns).
        total: f64,
        /// Largest supported sample count.
        max: u32,
    },
    /// Calibration mode needs a positive event count to finalise.
    #[error("calibration: configured event count must be positive")]
    CalibrationEvents,
    /// Calibration detector count outside `1..=5`.
    #[error("calibration: detector count must be in 1..={max}, got {value}")]
    CalibrationDetectors {
        /// Offending value.
        value: usize,
        /// Largest supported value.
        max: usize,
    },
    /// Any other invalid setting.
    #[error("{subsystem}: {reason}")]
    Invalid {
        /// Subsystem section name.
        subsystem: &'static str,
        /// What is wrong.
        reason: String,
    },
    /// Catch-all error variant.
    #[error("other: {0}")]
    Other(String),
}

/// Failure while committing a row to an output sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// I/O error in the underlying writer.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Row could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure while writing calibration artifacts.
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// I/O error on an artifact file.
    #[error("io error on {path}: {source}")]
    Io {
        /// Artifact path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Row emission failed.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Failure while closing an event.
#[derive(Debug, Error)]
pub enum EventError {
    /// Row emission failed.
    #[error(transparent)]
    Sink(#[from] SinkError),
    /// Calibration artifact writing failed.
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}
