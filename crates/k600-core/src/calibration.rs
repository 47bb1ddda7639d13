// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Geometry calibration: run-scoped hit statistics per TIARA channel, turned
//! into mean angles and solid-angle coverage at the last configured event.
//!
//! Two lifetimes live here. [`CalibrationAccumulator`] is run-scoped and is
//! never reset mid-run; workers that split a run merge their accumulators.
//! The per-event latch, line-of-sight flag and input direction inside
//! [`GeometryCalibrationReducer`] are rebuilt by every
//! [`GeometryCalibrationReducer::begin_event`].

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::config::CalibrationConfig;
use crate::error::CalibrationError;
use crate::geometry::{TiaraChannel, TIARA_CHANNELS_PER_DETECTOR};
use crate::math::{to_spherical, Spherical, Vec3};
use crate::sink::{OutputSink, Row, TableId};
use crate::step::{StepRecord, Volume};

/// Running position sums of one channel.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct ChannelSums {
    /// Sum of world x.
    pub x: f64,
    /// Sum of world y.
    pub y: f64,
    /// Sum of world z.
    pub z: f64,
    /// Number of hits.
    pub hits: u64,
}

impl ChannelSums {
    /// Mean hit position; `None` without hits.
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> Option<Vec3> {
        (self.hits > 0).then(|| {
            let n = self.hits as f64;
            Vec3::new(self.x / n, self.y / n, self.z / n)
        })
    }
}

/// Per-channel sums across a whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationAccumulator {
    channels: Vec<ChannelSums>,
}

impl CalibrationAccumulator {
    /// Zeroed sums for `channels` channels.
    pub fn new(channels: usize) -> Self {
        Self {
            channels: vec![ChannelSums::default(); channels],
        }
    }

    /// Adds one hit at `position`. Channels outside the table are ignored.
    pub fn record(&mut self, channel: usize, position: Vec3) -> bool {
        let Some(sums) = self.channels.get_mut(channel) else {
            return false;
        };
        sums.x += position.x();
        sums.y += position.y();
        sums.z += position.z();
        sums.hits += 1;
        true
    }

    /// Folds `other` into `self`. Order of merges does not matter.
    pub fn merge(&mut self, other: &Self) {
        if other.channels.len() > self.channels.len() {
            self.channels
                .resize(other.channels.len(), ChannelSums::default());
        }
        for (mine, theirs) in self.channels.iter_mut().zip(&other.channels) {
            mine.x += theirs.x;
            mine.y += theirs.y;
            mine.z += theirs.z;
            mine.hits += theirs.hits;
        }
    }

    /// Sums for `channel`.
    pub fn channel(&self, channel: usize) -> Option<&ChannelSums> {
        self.channels.get(channel)
    }

    /// Number of channels covered.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// `true` when no channels are covered.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// `0.5 * hits / events`. The factor compensates for primaries that only
    /// span one hemisphere.
    #[allow(clippy::cast_precision_loss)]
    pub fn solid_angle(&self, channel: usize, events: u64) -> f64 {
        match (self.channels.get(channel), events) {
            (Some(sums), n) if n > 0 => 0.5 * (sums.hits as f64 / n as f64),
            _ => 0.0,
        }
    }

    /// Finalised row for every channel with hits, in channel order.
    pub fn summary(&self, events: u64) -> Vec<ChannelGeometry> {
        self.channels
            .iter()
            .enumerate()
            .filter_map(|(id, sums)| {
                let mean = sums.mean()?;
                Some(ChannelGeometry {
                    channel: TiaraChannel::from_channel_id(id),
                    direction: to_spherical(mean.x(), mean.y(), mean.z()),
                    solid_angle: self.solid_angle(id, events),
                })
            })
            .collect()
    }
}

/// Calibrated geometry of one channel.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ChannelGeometry {
    /// Channel.
    pub channel: TiaraChannel,
    /// Direction of the mean hit position.
    pub direction: Spherical,
    /// Solid-angle fraction.
    pub solid_angle: f64,
}

/// Calibration reducer fed by every step of every event.
#[derive(Debug)]
pub struct GeometryCalibrationReducer {
    config: CalibrationConfig,
    run: CalibrationAccumulator,
    event: u64,
    latched: Vec<Option<Spherical>>,
    line_of_sight: bool,
    input: Option<Spherical>,
    angular_log: Option<BufWriter<File>>,
    finalized: bool,
}

impl GeometryCalibrationReducer {
    /// Builds a reducer; the run accumulator starts at zero.
    pub fn new(config: CalibrationConfig) -> Self {
        let channels = config.detectors * TIARA_CHANNELS_PER_DETECTOR;
        Self {
            run: CalibrationAccumulator::new(channels),
            latched: vec![None; channels],
            event: 0,
            line_of_sight: true,
            input: None,
            angular_log: None,
            finalized: false,
            config,
        }
    }

    /// Run-scoped sums.
    pub fn accumulator(&self) -> &CalibrationAccumulator {
        &self.run
    }

    /// Folds another worker's sums into this run.
    pub fn merge(&mut self, other: &CalibrationAccumulator) {
        self.run.merge(other);
    }

    /// Direction latched for `channel` this event.
    pub fn latched(&self, channel: usize) -> Option<Spherical> {
        self.latched.get(channel).copied().flatten()
    }

    /// World-volume direction captured this event.
    pub fn input_direction(&self) -> Option<Spherical> {
        self.input
    }

    /// Whether artifacts have been written.
    pub const fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Starts event `event`: clears the latch, input direction and
    /// line-of-sight flag. The run accumulator is untouched.
    pub fn begin_event(&mut self, event: u64) {
        self.event = event;
        self.latched.fill(None);
        self.line_of_sight = true;
        self.input = None;
    }

    /// Observes one step.
    pub fn observe(&mut self, step: &StepRecord) {
        let in_sensor = matches!(
            step.volume,
            Volume::TiaraActiveArea | Volume::TiaraSiliconWafer
        );
        let visible = !self.config.line_of_sight || self.line_of_sight;
        let world = step.volume == Volume::World && self.config.input_distribution;

        if (in_sensor && visible) || world {
            let position = step.world_position;
            let direction = position.to_spherical();
            if step.volume == Volume::TiaraActiveArea {
                let channel = usize::try_from(step.copy_number).unwrap_or(usize::MAX);
                self.run.record(channel, position);
                if self.config.angular_distribution {
                    if let Some(slot) = self.latched.get_mut(channel) {
                        slot.get_or_insert(direction);
                    }
                }
            }
            if world {
                self.input = Some(direction);
            }
        }

        if self.config.line_of_sight
            && matches!(
                step.volume,
                Volume::TiaraActiveArea | Volume::TiaraPcb | Volume::TiaraSiliconWafer
            )
        {
            self.line_of_sight = false;
        }
    }

    /// Closes the current event: emits the input-distribution row (`0, 0`
    /// when no world direction was captured), maintains the angular log and,
    /// at event `events - 1`, writes the artifacts unless this reducer is a
    /// worker (`finalize_at_last_event = false`).
    pub fn end_event(&mut self, sink: &mut dyn OutputSink) -> Result<(), CalibrationError> {
        let input = self.input.unwrap_or_default();
        sink.emit(
            Row::new(TableId::InputDistribution)
                .with_double(0, input.theta)
                .with_double(1, input.phi),
        )?;

        if self.config.angular_distribution {
            self.write_angular(sink)?;
        }

        let last = self.config.events > 0 && self.event == self.config.events - 1;
        if last && self.config.finalize_at_last_event {
            self.finalize()?;
        }
        Ok(())
    }

    fn write_angular(&mut self, sink: &mut dyn OutputSink) -> Result<(), CalibrationError> {
        let path = self.config.angular_log_path.clone();
        if self.angular_log.is_none() {
            info!(path = %path.display(), "opening angular distribution log");
            self.angular_log = Some(BufWriter::new(open_append(&path)?));
        }
        let mut lines = Vec::new();
        for (id, direction) in self.latched.iter().enumerate() {
            let Some(direction) = direction else {
                continue;
            };
            let ch = TiaraChannel::from_channel_id(id);
            let mut row = Row::new(TableId::GeometryAnalysis);
            row.set_index(0, ch.detector)
                .set_index(1, ch.row)
                .set_index(2, ch.sector)
                .set_double(3, direction.theta)
                .set_double(4, direction.phi);
            sink.emit(row)?;
            lines.push(format!(
                "{}    {}    {}    {}    {}",
                ch.detector,
                ch.row,
                ch.sector,
                format_general(direction.theta),
                format_general(direction.phi)
            ));
        }
        if let Some(log) = self.angular_log.as_mut() {
            for line in &lines {
                writeln!(log, "{line}").map_err(|source| io_error(&path, source))?;
            }
        }
        if self.config.events > 0 && (self.event + 1) % self.config.events == 0 {
            if let Some(mut log) = self.angular_log.take() {
                log.flush().map_err(|source| io_error(&path, source))?;
                debug!(event = self.event, "closed angular distribution log");
            }
        }
        Ok(())
    }

    /// Writes the table and lookup-literal artifacts (append mode). Runs at
    /// most once per reducer.
    pub fn finalize(&mut self) -> Result<(), CalibrationError> {
        if self.finalized {
            return Ok(());
        }
        let rows = self.run.summary(self.config.events);
        write_table(&self.config.table_path, self.run.len(), &rows)?;
        write_lookup(&self.config.lookup_path, &rows)?;
        self.finalized = true;
        info!(
            channels = rows.len(),
            events = self.config.events,
            table = %self.config.table_path.display(),
            lookup = %self.config.lookup_path.display(),
            "geometry calibration written"
        );
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> CalibrationError {
    CalibrationError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn open_append(path: &Path) -> Result<File, CalibrationError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| io_error(path, source))
}

fn write_table(path: &Path, channels: usize, rows: &[ChannelGeometry]) -> Result<(), CalibrationError> {
    let mut out = BufWriter::new(open_append(path)?);
    let mut body = String::from(
        "(TIARA NUMBER)  (ROW NUMBER)  (SECTOR NUMBER)  (THETA)      (PHI)      (SOLID ANGLE)\n",
    );
    let mut rows = rows.iter().peekable();
    for id in 0..channels {
        if id % TIARA_CHANNELS_PER_DETECTOR == 0 {
            body.push_str("   \n");
        }
        let Some(geo) = rows.next_if(|g| g.channel.channel_id() == id) else {
            continue;
        };
        body.push_str(&format!(
            "{},              {},            {},               {},     {},   {}\n",
            geo.channel.detector,
            geo.channel.row,
            geo.channel.sector,
            format_general(geo.direction.theta),
            format_general(geo.direction.phi),
            format_general(geo.solid_angle)
        ));
    }
    out.write_all(body.as_bytes())
        .and_then(|()| out.flush())
        .map_err(|source| io_error(path, source))
}

fn write_lookup(path: &Path, rows: &[ChannelGeometry]) -> Result<(), CalibrationError> {
    let mut out = BufWriter::new(open_append(path)?);
    let mut body = String::from(
        "                  \nDouble_t GA_TIARA[5][16][8][3];\n                  \nvoid initialize_GA()\n{\n",
    );
    for geo in rows {
        let (t, r, s) = (geo.channel.detector, geo.channel.row, geo.channel.sector);
        body.push_str(&format!(
            "    GA_TIARA[{t}][{r}][{s}][0]={};   GA_TIARA[{t}][{r}][{s}][1]={};   GA_TIARA[{t}][{r}][{s}][2]={};\n",
            format_general(geo.direction.theta),
            format_general(geo.direction.phi),
            format_general(geo.solid_angle)
        ));
    }
    body.push_str("}\n");
    out.write_all(body.as_bytes())
        .and_then(|()| out.flush())
        .map_err(|source| io_error(path, source))
}

/// Six-significant-digit `%g` rendering used by the text artifacts.
fn format_general(value: f64) -> String {
    if value == 0.0 {
        return "0".into();
    }
    if !value.is_finite() {
        return value.to_string();
    }
    let sci = format!("{value:.5e}");
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    if !(-4..6).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{}e{sign}{:02}", trim_fraction(mantissa), exp.abs());
    }
    let decimals = usize::try_from(5 - exp).unwrap_or(0);
    trim_fraction(&format!("{value:.decimals$}")).to_owned()
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn config(dir: &Path) -> CalibrationConfig {
        CalibrationConfig {
            enabled: true,
            events: 4,
            table_path: dir.join("table.txt"),
            lookup_path: dir.join("lookup.h"),
            angular_log_path: dir.join("angdist.txt"),
            ..CalibrationConfig::default()
        }
    }

    fn rs(copy: u32, at: Vec3) -> StepRecord {
        StepRecord::new(Volume::TiaraActiveArea, copy).at_world(at)
    }

    #[test]
    fn general_format_matches_six_significant_digits() {
        assert_eq!(format_general(0.0), "0");
        assert_eq!(format_general(45.0), "45");
        assert_eq!(format_general(54.735_610_317), "54.7356");
        assert_eq!(format_general(0.125), "0.125");
        assert_eq!(format_general(0.000_012_5), "1.25e-05");
        assert_eq!(format_general(1_234_567.0), "1.23457e+06");
        assert_eq!(format_general(999_999.7), "1e+06");
        assert_eq!(format_general(-270.0), "-270");
    }

    #[test]
    fn merge_is_commutative() {
        let mut a = CalibrationAccumulator::new(4);
        let mut b = CalibrationAccumulator::new(4);
        a.record(1, Vec3::new(1.0, 0.0, 0.0));
        b.record(1, Vec3::new(0.0, 2.0, 0.0));
        b.record(3, Vec3::new(0.0, 0.0, 1.0));
        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);
        assert_eq!(ab, ba);
        assert_eq!(ab.channel(1).map(|c| c.hits), Some(2));
    }

    #[test]
    fn line_of_sight_counts_only_the_first_tiara_volume() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cal = GeometryCalibrationReducer::new(CalibrationConfig {
            line_of_sight: true,
            ..config(dir.path())
        });
        cal.begin_event(0);
        cal.observe(&StepRecord::new(Volume::TiaraPcb, 0));
        cal.observe(&rs(5, Vec3::new(0.0, 0.0, 1.0)));
        assert_eq!(cal.accumulator().channel(5).map(|c| c.hits), Some(0));

        cal.begin_event(1);
        cal.observe(&rs(5, Vec3::new(0.0, 0.0, 1.0)));
        cal.observe(&rs(6, Vec3::new(0.0, 0.0, 1.0)));
        assert_eq!(cal.accumulator().channel(5).map(|c| c.hits), Some(1));
        assert_eq!(cal.accumulator().channel(6).map(|c| c.hits), Some(0));
    }

    #[test]
    fn angular_log_lifecycle_and_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = CalibrationConfig {
            angular_distribution: true,
            events: 2,
            ..config(dir.path())
        };
        let log = cfg.angular_log_path.clone();
        let mut cal = GeometryCalibrationReducer::new(cfg);
        let mut sink = MemorySink::new();

        cal.begin_event(0);
        cal.observe(&rs(130, Vec3::new(0.0, 1.0, 0.0)));
        cal.observe(&rs(130, Vec3::new(1.0, 0.0, 0.0)));
        assert_eq!(cal.latched(130).map(|d| d.phi), Some(90.0));
        cal.end_event(&mut sink).expect("event 0");
        cal.begin_event(1);
        cal.end_event(&mut sink).expect("event 1");

        let rows: Vec<&Row> = sink.table(TableId::GeometryAnalysis).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(0), Some(crate::sink::Cell::Int(1)));
        assert_eq!(rows[0].get(1), Some(crate::sink::Cell::Int(0)));
        assert_eq!(rows[0].get(2), Some(crate::sink::Cell::Int(2)));
        let text = std::fs::read_to_string(log).expect("read log");
        assert_eq!(text, "1    0    2    90    90\n");
        assert!(cal.is_finalized());
    }

    #[test]
    fn finalize_writes_both_artifacts_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = config(dir.path());
        let (table, lookup) = (cfg.table_path.clone(), cfg.lookup_path.clone());
        let mut cal = GeometryCalibrationReducer::new(cfg);
        let mut sink = MemorySink::new();
        for event in 0..4 {
            cal.begin_event(event);
            if event % 2 == 0 {
                cal.observe(&rs(9, Vec3::new(1.0, 1.0, 0.0)));
            }
            cal.end_event(&mut sink).expect("event");
        }
        cal.finalize().expect("second finalize is a no-op");

        let table = std::fs::read_to_string(table).expect("table");
        let mut lines = table.lines();
        assert_eq!(
            lines.next(),
            Some("(TIARA NUMBER)  (ROW NUMBER)  (SECTOR NUMBER)  (THETA)      (PHI)      (SOLID ANGLE)")
        );
        assert_eq!(lines.next(), Some("   "));
        assert_eq!(
            lines.next(),
            Some("0,              1,            1,               90,     45,   0.25")
        );
        assert_eq!(table.matches("   \n").count(), 4);

        let lookup = std::fs::read_to_string(lookup).expect("lookup");
        assert!(lookup.contains("Double_t GA_TIARA[5][16][8][3];"));
        assert!(lookup.contains(
            "    GA_TIARA[0][1][1][0]=90;   GA_TIARA[0][1][1][1]=45;   GA_TIARA[0][1][1][2]=0.25;"
        ));
        assert!(lookup.ends_with("}\n"));

        // Without world capture every event still commits a zeroed input row.
        assert_eq!(sink.rows().len(), 4);
        assert!(sink.table(TableId::InputDistribution).all(|r| {
            r.get(0) == Some(crate::sink::Cell::Double(0.0))
                && r.get(1) == Some(crate::sink::Cell::Double(0.0))
        }));
    }

    #[test]
    fn worker_reducer_leaves_finalisation_to_the_caller() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = CalibrationConfig {
            finalize_at_last_event: false,
            ..config(dir.path())
        };
        let table = cfg.table_path.clone();
        let mut cal = GeometryCalibrationReducer::new(cfg);
        let mut sink = MemorySink::new();
        for event in 0..4 {
            cal.begin_event(event);
            cal.end_event(&mut sink).expect("event");
        }
        assert!(!cal.is_finalized());
        assert!(!table.exists());
        cal.finalize().expect("finalize");
        assert!(cal.is_finalized());
        assert!(table.exists());
    }
}
