//! Concurrent appends from independent log channels.

use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;

use pkg_cacher::config::{Config, ConfigStore};
use pkg_cacher::http::CacheStatus;
use pkg_cacher::observability::LogChannel;

const WRITERS: usize = 16;
const RECORDS: usize = 50;

/// Each writer owns its own channel (its own open file description), the
/// way separate worker processes would.
#[test]
fn concurrent_writers_never_interleave() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ConfigStore::from_config(Config::with_defaults(), "/dev/null"));
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let dir = dir.path().to_path_buf();
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let logs = LogChannel::new(store);
                logs.open(&dir).unwrap();
                let filename = format!("writer-{writer:02}/{}", "x".repeat(512));
                barrier.wait();
                for _ in 0..RECORDS {
                    logs.write_access(CacheStatus::Hit, &filename, 4096, None).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let content = fs::read_to_string(dir.path().join("access.log")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), WRITERS * RECORDS);

    let padding = "x".repeat(512);
    for writer in 0..WRITERS {
        let suffix = format!("|-|HIT|4096|writer-{writer:02}/{padding}");
        let count = lines.iter().filter(|line| line.ends_with(&suffix)).count();
        assert_eq!(count, RECORDS, "writer {writer} lost or corrupted records");
    }
    for line in &lines {
        assert_eq!(line.split('|').count(), 6, "interleaved record: {line}");
    }
}

#[test]
fn error_log_records_from_shared_channel() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ConfigStore::from_config(Config::with_defaults(), "/dev/null"));
    let logs = Arc::new(LogChannel::new(store));
    logs.open(dir.path()).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let logs = Arc::clone(&logs);
            thread::spawn(move || logs.write_error(&format!("failure {n}")).unwrap())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let content = fs::read_to_string(dir.path().join("error.log")).unwrap();
    assert_eq!(content.lines().count(), 8);
    assert!(content.lines().all(|line| line.contains("|error [")));
}
