// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-event orchestration: reset, step dispatch and end-of-event reduction.

use tracing::{debug, info, instrument};

use crate::calibration::GeometryCalibrationReducer;
use crate::config::DetectorConfig;
use crate::error::{ConfigError, EventError};
use crate::processor::{
    GammaStation, LepsArray, NaiArray, PaddleArray, Processor, TiaraArray, VdcArray,
};
use crate::resolution::GaussianSource;
use crate::sink::OutputSink;
use crate::step::{StepRecord, Volume};

/// What one event produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventSummary {
    /// Event id.
    pub event: u64,
    /// Steps kept by a processor.
    pub accepted: usize,
    /// Steps no processor kept.
    pub filtered: usize,
    /// Rows committed to the sink (calibration rows excluded).
    pub rows: usize,
    /// Wire-chamber hits dropped for lack of a digitiser slot.
    pub dropped_hits: usize,
}

/// Owns every subsystem processor and the optional calibration reducer.
///
/// Lifecycle per event: [`EventAggregator::begin_event`], any number of
/// [`EventAggregator::ingest`] calls in transport order, then exactly one
/// [`EventAggregator::end_event`].
#[derive(Debug)]
pub struct EventAggregator {
    tiara: TiaraArray,
    paddles: PaddleArray,
    gamma: GammaStation,
    leps: LepsArray,
    nai: NaiArray,
    vdc: VdcArray,
    calibration: Option<GeometryCalibrationReducer>,
    summary: EventSummary,
}

impl EventAggregator {
    /// Validates `config` and builds every processor.
    pub fn new(config: &DetectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let calibration = config
            .calibration
            .enabled
            .then(|| GeometryCalibrationReducer::new(config.calibration.clone()));
        info!(
            calibration = calibration.is_some(),
            addback = config.clover.addback,
            compton_suppression = config.clover.compton_suppression,
            "event aggregator ready"
        );
        Ok(Self {
            tiara: TiaraArray::new(config.tiara.clone()),
            paddles: PaddleArray::new(config.paddle.clone()),
            gamma: GammaStation::new(config.clover.clone()),
            leps: LepsArray::new(config.leps.clone()),
            nai: NaiArray::new(config.nai.clone()),
            vdc: VdcArray::new(config.vdc.clone()),
            calibration,
            summary: EventSummary::default(),
        })
    }

    /// Processors in reduction order.
    fn processors_mut(&mut self) -> [&mut dyn Processor; 6] {
        [
            &mut self.tiara,
            &mut self.paddles,
            &mut self.gamma,
            &mut self.leps,
            &mut self.nai,
            &mut self.vdc,
        ]
    }

    /// Resets every grid, latch and ring buffer and starts event `event`.
    pub fn begin_event(&mut self, event: u64) {
        for processor in self.processors_mut() {
            processor.reset();
        }
        if let Some(cal) = self.calibration.as_mut() {
            cal.begin_event(event);
        }
        self.summary = EventSummary {
            event,
            ..EventSummary::default()
        };
    }

    /// Routes one step to the processor owning its volume and to the
    /// calibration reducer. Returns whether a processor kept it.
    pub fn ingest(&mut self, step: &StepRecord) -> bool {
        if let Some(cal) = self.calibration.as_mut() {
            cal.observe(step);
        }
        let kept = match step.volume {
            Volume::TiaraActiveArea => self.tiara.ingest(step),
            Volume::Paddle => self.paddles.ingest(step),
            Volume::CloverCrystal
            | Volume::CloverShield
            | Volume::ParaffinBox
            | Volume::IronBox => self.gamma.ingest(step),
            Volume::LepsCrystal => self.leps.ingest(step),
            Volume::NaiCrystal => self.nai.ingest(step),
            Volume::VdcSenseRegion => self.vdc.ingest(step),
            Volume::TiaraSiliconWafer | Volume::TiaraPcb | Volume::World | Volume::Other => false,
        };
        if kept {
            self.summary.accepted += 1;
        } else {
            self.summary.filtered += 1;
        }
        kept
    }

    /// Runs every reducer in fixed order (TIARA, paddles, gamma station,
    /// LEPS, NaI, wire chambers) and commits their rows, then closes the
    /// calibration event.
    #[instrument(level = "debug", skip_all, fields(event = self.summary.event))]
    pub fn end_event(
        &mut self,
        rng: &mut dyn GaussianSource,
        sink: &mut dyn OutputSink,
    ) -> Result<EventSummary, EventError> {
        let mut rows = 0;
        for processor in self.processors_mut() {
            let reduced = processor.reduce(rng);
            debug!(processor = processor.name(), rows = reduced.len(), "reduced");
            for row in reduced {
                sink.emit(row)?;
                rows += 1;
            }
        }
        self.summary.rows = rows;
        self.summary.dropped_hits = self.vdc.hits().dropped();
        if let Some(cal) = self.calibration.as_mut() {
            cal.end_event(sink)?;
        }
        debug!(
            accepted = self.summary.accepted,
            filtered = self.summary.filtered,
            rows,
            dropped_hits = self.summary.dropped_hits,
            "event closed"
        );
        Ok(self.summary)
    }

    /// Silicon ring array.
    pub fn tiara(&self) -> &TiaraArray {
        &self.tiara
    }

    /// Scintillator paddles.
    pub fn paddles(&self) -> &PaddleArray {
        &self.paddles
    }

    /// Clover array and moderator boxes.
    pub fn gamma(&self) -> &GammaStation {
        &self.gamma
    }

    /// LEPS array.
    pub fn leps(&self) -> &LepsArray {
        &self.leps
    }

    /// NaI array.
    pub fn nai(&self) -> &NaiArray {
        &self.nai
    }

    /// Wire chambers.
    pub fn vdc(&self) -> &VdcArray {
        &self.vdc
    }

    /// Calibration reducer, when calibration mode is on.
    pub fn calibration(&self) -> Option<&GeometryCalibrationReducer> {
        self.calibration.as_ref()
    }

    /// Mutable calibration reducer (merging worker sums, forcing finalisation).
    pub fn calibration_mut(&mut self) -> Option<&mut GeometryCalibrationReducer> {
        self.calibration.as_mut()
    }
}
