use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::{tempdir, TempDir};

use tailmerge::{
    FieldType, FieldValue, MergeCoordinator, PollIntervals, Record, RecordSchema, TailMergeConfig, TypeRegistry,
    OPERATION_EXECUTION_RECORD,
};

fn fast_poll() -> PollIntervals {
    PollIntervals {
        new_lines_ms: 5,
        new_files_ms: 20,
        mapping_settle_ms: 10,
    }
}

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::with_builtin_types();
    registry.register("test.Event", RecordSchema::new(vec![FieldType::String]));
    registry
}

fn config(dirs: &[&Path]) -> TailMergeConfig {
    TailMergeConfig::new(dirs.iter().map(|d| d.to_path_buf()).collect()).with_poll(fast_poll())
}

/// A source directory with `$1=test.Event` mapped and one data file holding
/// the given `(timestamp, payload)` records.
fn source_dir(records: &[(i64, &str)]) -> TempDir {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("kieker.map"), "$1=test.Event\n").unwrap();
    let mut body = String::new();
    for (ts, payload) in records {
        body.push_str(&format!("$1;{ts};{payload}\n"));
    }
    fs::write(dir.path().join("kieker-0001.dat"), body).unwrap();
    dir
}

fn timestamps(records: &[Record]) -> Vec<i64> {
    records.iter().map(|r| r.logging_timestamp).collect()
}

fn payload(record: &Record) -> &str {
    record.field(0).and_then(FieldValue::as_str).unwrap()
}

#[test]
fn merge_interleaves_two_sorted_sources() {
    let a = source_dir(&[(1, "a"), (3, "a"), (5, "a"), (7, "a")]);
    let b = source_dir(&[(2, "b"), (4, "b"), (6, "b"), (8, "b")]);

    let coordinator = MergeCoordinator::new(config(&[a.path(), b.path()]), registry());
    let mut out = Vec::new();
    // Record 8 stays pending until source a produces more, so stop at 7.
    let summary = coordinator.run(&mut |r: Record| {
        out.push(r);
        out.len() < 7
    });

    assert_eq!(timestamps(&out), vec![1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(summary.sources_launched, 2);
    assert_eq!(summary.records_delivered, 7);
}

#[test]
fn equal_timestamps_follow_directory_order() {
    let a = source_dir(&[(5, "first"), (9, "a")]);
    let b = source_dir(&[(5, "second"), (9, "b")]);

    let coordinator = MergeCoordinator::new(config(&[b.path(), a.path()]), registry());
    let mut out = Vec::new();
    coordinator.run(&mut |r: Record| {
        out.push(r);
        out.len() < 3
    });

    let payloads: Vec<&str> = out.iter().map(payload).collect();
    assert_eq!(payloads, vec!["second", "first", "b"]);
}

#[test]
fn strict_unknown_type_retires_only_that_source() {
    let a = source_dir(&[(1, "a"), (3, "a")]);
    let mut f = OpenOptions::new()
        .append(true)
        .open(a.path().join("kieker-0001.dat"))
        .unwrap();
    f.write_all(b"$9;4;unknown\n$1;5;never\n").unwrap();
    drop(f);
    let b = source_dir(&[(2, "b"), (4, "b"), (6, "b"), (8, "b")]);

    let coordinator = MergeCoordinator::new(config(&[a.path(), b.path()]), registry());
    let mut out = Vec::new();
    coordinator.run(&mut |r: Record| {
        out.push(r);
        out.len() < 6
    });

    // After source a stops, source b drains on its own.
    assert_eq!(timestamps(&out), vec![1, 2, 3, 4, 6, 8]);
    assert!(out.iter().all(|r| payload(r) != "never"));
}

#[test]
fn permissive_unknown_type_is_skipped() {
    let a = source_dir(&[(1, "a")]);
    let mut f = OpenOptions::new()
        .append(true)
        .open(a.path().join("kieker-0001.dat"))
        .unwrap();
    f.write_all(b"$9;2;unknown\n$1;3;after\n").unwrap();
    drop(f);

    let cfg = config(&[a.path()]).with_ignore_unknown_record_types(true);
    let coordinator = MergeCoordinator::new(cfg, registry());
    let mut out = Vec::new();
    coordinator.run(&mut |r: Record| {
        out.push(r);
        out.len() < 2
    });

    assert_eq!(timestamps(&out), vec![1, 3]);
    assert_eq!(payload(&out[1]), "after");
}

#[test]
fn late_files_are_picked_up_in_order() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("kieker.map"), "$1=test.Event\n").unwrap();
    let writer_dir: PathBuf = dir.path().to_path_buf();

    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        fs::write(writer_dir.join("kieker-0001.dat"), "$1;1;one\n").unwrap();
        thread::sleep(Duration::from_millis(50));
        fs::write(writer_dir.join("kieker-0002.dat"), "$1;2;two\n").unwrap();
    });

    let coordinator = MergeCoordinator::new(config(&[dir.path()]), registry());
    let mut out = Vec::new();
    coordinator.run(&mut |r: Record| {
        out.push(r);
        out.len() < 2
    });
    writer.join().unwrap();

    let payloads: Vec<&str> = out.iter().map(payload).collect();
    assert_eq!(payloads, vec!["one", "two"]);
}

#[test]
fn external_stop_ends_idle_merge_promptly() {
    // Mapping present but no data files: both readers poll forever.
    let a = tempdir().unwrap();
    let b = tempdir().unwrap();
    fs::write(a.path().join("kieker.map"), "$1=test.Event\n").unwrap();

    let coordinator = MergeCoordinator::new(config(&[a.path(), b.path()]), registry());
    let state = coordinator.state();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        state.stop();
    });

    let started = Instant::now();
    let mut out: Vec<Record> = Vec::new();
    let summary = coordinator.run(&mut out);
    stopper.join().unwrap();

    assert!(out.is_empty());
    assert_eq!(summary.sources_launched, 2);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn sink_is_not_invoked_after_stop() {
    let evens: Vec<(i64, &str)> = (0..200).map(|i| (i * 2, "a")).collect();
    let odds: Vec<(i64, &str)> = (0..200).map(|i| (i * 2 + 1, "b")).collect();
    let a = source_dir(&evens);
    let b = source_dir(&odds);

    let coordinator = MergeCoordinator::new(config(&[a.path(), b.path()]), registry());
    let state = coordinator.state();
    let mut calls = 0u32;
    let summary = coordinator.run(&mut |_: Record| {
        calls += 1;
        if calls == 50 {
            state.stop();
        }
        true
    });

    assert_eq!(calls, 50);
    assert_eq!(summary.records_delivered, 50);
}

#[test]
fn missing_directories_are_skipped() {
    let a = source_dir(&[(1, "a"), (2, "a")]);
    let gone = a.path().join("does-not-exist");

    let coordinator = MergeCoordinator::new(config(&[gone.as_path(), a.path()]), registry());
    let mut out = Vec::new();
    let summary = coordinator.run(&mut |r: Record| {
        out.push(r);
        out.len() < 2
    });

    assert_eq!(summary.sources_launched, 1);
    assert_eq!(timestamps(&out), vec![1, 2]);
}

#[test]
fn empty_configuration_returns_immediately() {
    let coordinator = MergeCoordinator::new(TailMergeConfig::default(), registry());
    let mut out: Vec<Record> = Vec::new();
    let summary = coordinator.run(&mut out);
    assert_eq!(summary.sources_launched, 0);
    assert!(out.is_empty());
}

#[test]
fn legacy_directory_decodes_operation_execution_records() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("tpmon.map"),
        format!("1={OPERATION_EXECUTION_RECORD}\n"),
    )
    .unwrap();
    fs::write(
        dir.path().join("tpmon-0001.dat"),
        "x;public void a.B.c();sess;7;100;200;host;0;1\n$1;300;public void a.B.d();sess;7;250;300;host;1;1\n",
    )
    .unwrap();

    let coordinator = MergeCoordinator::new(config(&[dir.path()]), registry());
    let mut out = Vec::new();
    coordinator.run(&mut |r: Record| {
        out.push(r);
        out.len() < 2
    });

    assert_eq!(timestamps(&out), vec![200, 300]);
    assert!(out.iter().all(|r| &*r.type_name == OPERATION_EXECUTION_RECORD));
    assert_eq!(out[0].field(2), Some(&FieldValue::Long(7)));
}
