// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
use k600_core::{
    CalibrationAccumulator, Cell, DetectorConfig, EventAggregator, MeanSource, MemorySink,
    StepRecord, TableId, Vec3, Volume,
};

fn calibration_config(dir: &std::path::Path, events: u64) -> DetectorConfig {
    let mut config = DetectorConfig::default();
    config.calibration.enabled = true;
    config.calibration.input_distribution = true;
    config.calibration.events = events;
    config.calibration.table_path = dir.join("K600SimOutput.txt");
    config.calibration.lookup_path = dir.join("K600SimOutput.h");
    config.calibration.angular_log_path = dir.join("AngDist.txt");
    config
}

#[test]
fn solid_angle_is_half_the_hit_fraction() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = calibration_config(dir.path(), 4);
    let mut agg = EventAggregator::new(&config).expect("valid config");
    let mut sink = MemorySink::new();

    for event in 0..4 {
        agg.begin_event(event);
        agg.ingest(&StepRecord::new(Volume::World, 0).at_world(Vec3::new(0.0, 1.0, 0.0)));
        if event % 2 == 0 {
            agg.ingest(
                &StepRecord::new(Volume::TiaraActiveArea, 9).at_world(Vec3::new(1.0, 1.0, 0.0)),
            );
        }
        let summary = agg.end_event(&mut MeanSource, &mut sink).expect("end event");
        assert_eq!(summary.rows, 0);
    }

    let cal = agg.calibration().expect("calibration enabled");
    assert!(cal.is_finalized());
    assert_eq!(cal.accumulator().solid_angle(9, 4), 0.25);
    assert_eq!(cal.accumulator().solid_angle(10, 4), 0.0);

    let inputs: Vec<_> = sink.table(TableId::InputDistribution).collect();
    assert_eq!(inputs.len(), 4);
    assert!(inputs
        .iter()
        .all(|r| r.get(0) == Some(Cell::Double(90.0)) && r.get(1) == Some(Cell::Double(90.0))));

    let table = std::fs::read_to_string(dir.path().join("K600SimOutput.txt")).expect("table");
    assert!(table.contains("0,              1,            1,               90,     45,   0.25\n"));
    let lookup = std::fs::read_to_string(dir.path().join("K600SimOutput.h")).expect("lookup");
    assert!(lookup.starts_with("                  \nDouble_t GA_TIARA[5][16][8][3];"));
    assert!(!dir.path().join("AngDist.txt").exists());
}

#[test]
fn worker_accumulators_merge_before_finalisation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = calibration_config(dir.path(), 2);
    let mut agg = EventAggregator::new(&config).expect("valid config");

    let mut worker = CalibrationAccumulator::new(4 * 128);
    worker.record(3, Vec3::new(0.0, 0.0, 2.0));
    worker.record(3, Vec3::new(0.0, 0.0, 4.0));
    agg.calibration_mut().expect("calibration enabled").merge(&worker);

    let cal = agg.calibration().expect("calibration enabled");
    let sums = cal.accumulator().channel(3).expect("channel 3");
    assert_eq!(sums.hits, 2);
    assert_eq!(sums.mean(), Some(Vec3::new(0.0, 0.0, 3.0)));
    assert_eq!(cal.accumulator().solid_angle(3, 2), 0.5);
}

#[test]
fn coordinator_owning_the_last_event_finalises_merged_sums() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = calibration_config(dir.path(), 4);
    config.calibration.finalize_at_last_event = false;
    let channel_9 =
        || StepRecord::new(Volume::TiaraActiveArea, 9).at_world(Vec3::new(1.0, 1.0, 0.0));

    let mut first = EventAggregator::new(&config).expect("valid config");
    let mut second = EventAggregator::new(&config).expect("valid config");
    let mut sink = MemorySink::new();
    for event in 0..2 {
        first.begin_event(event);
        first.ingest(&channel_9());
        first.end_event(&mut MeanSource, &mut sink).expect("end event");
    }
    for event in 2..4 {
        second.begin_event(event);
        second.end_event(&mut MeanSource, &mut sink).expect("end event");
    }
    assert!(!second.calibration().expect("calibration enabled").is_finalized());
    assert!(!dir.path().join("K600SimOutput.txt").exists());

    let partial = first.calibration().expect("calibration enabled").accumulator().clone();
    let cal = second.calibration_mut().expect("calibration enabled");
    cal.merge(&partial);
    cal.finalize().expect("finalize");
    assert!(cal.is_finalized());
    assert_eq!(cal.accumulator().solid_angle(9, 4), 0.5);

    let table = std::fs::read_to_string(dir.path().join("K600SimOutput.txt")).expect("table");
    assert!(table.contains("0,              1,            1,               90,     45,   0.5\n"));
}

#[test]
fn calibration_without_events_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = calibration_config(dir.path(), 0);
    assert!(EventAggregator::new(&config).is_err());
}
