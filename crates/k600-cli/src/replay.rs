// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Replays a recorded step stream through the event aggregator.

use std::collections::BTreeMap;
use std::io::BufRead;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use k600_core::error::SinkError;
use k600_core::{DetectorConfig, EventAggregator, GaussianSource, OutputSink, Row, StepRecord, TableId};

/// Totals over a whole replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    /// Events closed.
    pub events: u64,
    /// Steps kept by a processor.
    pub accepted: usize,
    /// Steps no processor kept.
    pub filtered: usize,
    /// Wire-chamber hits dropped for lack of a digitiser slot.
    pub dropped_hits: usize,
    /// Rows committed per table, calibration tables included.
    pub rows: BTreeMap<&'static str, usize>,
    /// Whether the calibration artifacts were written.
    pub calibration_finalized: bool,
}

/// Parses JSON-lines step records. Blank lines are skipped.
pub fn read_steps(reader: impl BufRead) -> Result<Vec<StepRecord>> {
    let mut steps = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read step line {}", n + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let step: StepRecord = serde_json::from_str(&line)
            .with_context(|| format!("invalid step record on line {}", n + 1))?;
        steps.push(step);
    }
    Ok(steps)
}

/// Counts rows per table on the way to the real sink.
struct Tally<'a> {
    inner: &'a mut dyn OutputSink,
    rows: BTreeMap<TableId, usize>,
}

impl OutputSink for Tally<'_> {
    fn emit(&mut self, row: Row) -> Result<(), SinkError> {
        *self.rows.entry(row.table()).or_default() += 1;
        self.inner.emit(row)
    }
}

/// Runs every event found in `steps` through a fresh aggregator.
///
/// Steps are grouped by their `event` id and keep their arrival order inside
/// each event. Events are closed in id order from `0`; ids with no steps are
/// still opened and closed, and when calibration is enabled the run extends
/// to the configured event count so the artifacts get written.
pub fn replay(
    config: &DetectorConfig,
    steps: Vec<StepRecord>,
    rng: &mut dyn GaussianSource,
    sink: &mut dyn OutputSink,
) -> Result<ReplayReport> {
    let mut agg = EventAggregator::new(config).context("invalid detector configuration")?;

    let mut events: BTreeMap<u64, Vec<StepRecord>> = BTreeMap::new();
    for step in steps {
        events.entry(step.event).or_default().push(step);
    }
    let recorded = events.last_key_value().map_or(0, |(id, _)| id + 1);
    let total = if config.calibration.enabled {
        recorded.max(config.calibration.events)
    } else {
        recorded
    };
    info!(events = total, recorded = events.len(), "replaying step stream");

    let mut tally = Tally {
        inner: sink,
        rows: BTreeMap::new(),
    };
    let mut report = ReplayReport::default();
    for event in 0..total {
        agg.begin_event(event);
        for step in events.get(&event).map(Vec::as_slice).unwrap_or_default() {
            agg.ingest(step);
        }
        let summary = agg
            .end_event(rng, &mut tally)
            .with_context(|| format!("failed to close event {event}"))?;
        report.events += 1;
        report.accepted += summary.accepted;
        report.filtered += summary.filtered;
        report.dropped_hits += summary.dropped_hits;
    }

    report.rows = TableId::ALL
        .iter()
        .map(|t| (t.name(), tally.rows.get(t).copied().unwrap_or_default()))
        .collect();
    report.calibration_finalized = agg.calibration().is_some_and(|c| c.is_finalized());
    Ok(report)
}
