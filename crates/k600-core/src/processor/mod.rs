// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-subsystem detector processors.
//!
//! Every subsystem implements the same two-phase contract: steps are
//! [`Processor::ingest`]ed as the transport engine produces them, then
//! [`Processor::reduce`] runs once at end-of-event, smearing, thresholding and
//! turning the subsystem grid into output rows. Nothing is smeared during
//! ingestion.

mod clover;
mod leps;
mod moderator;
mod nai;
mod paddle;
mod tiara;
mod vdc;

pub use clover::{
    CloverArray, GammaStation, GAMMA_ENERGY_COLUMN, GAMMA_FLAG_COLUMN, GAMMA_INCIDENT_COLUMN,
    IRON_COLUMN, PARAFFIN_COLUMN,
};
pub use leps::LepsArray;
pub use moderator::{ModeratorBox, ModeratorReading};
pub use nai::NaiArray;
pub use paddle::{PaddleArray, PaddleReading};
pub use tiara::TiaraArray;
pub use vdc::{locate_cell, VdcArray, WireplaneTraversal};

use crate::resolution::GaussianSource;
use crate::sink::Row;
use crate::step::StepRecord;

/// Two-phase contract shared by every subsystem.
pub trait Processor {
    /// Short subsystem name for diagnostics.
    fn name(&self) -> &'static str;

    /// Restores every grid cell and latch to its sentinel.
    fn reset(&mut self);

    /// Folds one step into the subsystem state.
    ///
    /// Returns `false` when the step was filtered (wrong particle, outside the
    /// sampled window, outside the geometry). Filtering is never an error.
    fn ingest(&mut self, step: &StepRecord) -> bool;

    /// End-of-event reduction. May mutate the grid (smearing, veto) and
    /// returns the rows to commit, in emission order.
    fn reduce(&mut self, rng: &mut dyn GaussianSource) -> Vec<Row>;
}

/// Scintillator/HPGe discriminator: the deposit passes when a copy smeared
/// by `trigger_sigma` reaches `threshold`; the reported energy is then a
/// fresh smear by `resolution_sigma`, folded to be non-negative.
fn discriminate(
    rng: &mut dyn GaussianSource,
    energy: f64,
    threshold: f64,
    trigger_sigma: f64,
    resolution_sigma: f64,
) -> Option<f64> {
    (rng.gaussian(energy, trigger_sigma) >= threshold)
        .then(|| rng.gaussian(energy, resolution_sigma).abs())
}
