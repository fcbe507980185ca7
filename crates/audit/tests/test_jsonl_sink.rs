use opsdeck_audit::{AuditEntry, AuditFilter, AuditLog, AuditSink, JsonlFileSink, EXECUTE_COMMAND};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn create_entry(user: &str, command: &str) -> AuditEntry {
    AuditEntry::allowed(user, "dc", EXECUTE_COMMAND, command)
}

fn line_count(path: &std::path::Path) -> usize {
    let reader = BufReader::new(File::open(path).unwrap());
    reader.lines().count()
}

#[test]
fn test_one_line_per_entry() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("audit.jsonl");
    let sink = JsonlFileSink::open(&path).unwrap();

    for i in 0..10 {
        sink.append(&create_entry(&format!("user{}", i), "pov_list")).unwrap();
    }

    assert_eq!(line_count(&path), 10);
}

#[test]
fn test_creates_parent_directories() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("dir").join("audit.jsonl");
    let sink = JsonlFileSink::open(&path).unwrap();
    sink.append(&create_entry("u1", "help")).unwrap();
    assert!(path.exists());
}

#[test]
fn test_reopen_appends() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("audit.jsonl");

    {
        let sink = JsonlFileSink::open(&path).unwrap();
        sink.append(&create_entry("u1", "pov_list")).unwrap();
    }
    {
        let sink = JsonlFileSink::open(&path).unwrap();
        sink.append(&create_entry("u2", "trr_list")).unwrap();
    }

    assert_eq!(line_count(&path), 2);
}

#[test]
fn test_history_survives_restart() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("audit.jsonl");

    {
        let log = AuditLog::with_sink(100, Arc::new(JsonlFileSink::open(&path).unwrap()));
        log.record(create_entry("u1", "pov_list"));
        log.record(create_entry("u1", "pov_report"));
        log.record(AuditEntry::denied("u2", "analyst", EXECUTE_COMMAND, "pov_create", "insufficient role permissions"));
    }

    let log = AuditLog::restore(100, Arc::new(JsonlFileSink::open(&path).unwrap()));
    assert_eq!(log.len(), 3);
    assert_eq!(log.query(&AuditFilter::default().allowed(false)).len(), 1);
    assert_eq!(log.usage_statistics().get("pov_report"), Some(&1));
}

#[test]
fn test_restore_respects_capacity() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("audit.jsonl");
    let sink = JsonlFileSink::open(&path).unwrap();
    for i in 0..20 {
        sink.append(&create_entry("u1", &format!("cmd{}", i))).unwrap();
    }

    let log = AuditLog::restore(5, Arc::new(JsonlFileSink::open(&path).unwrap()));
    let resources: Vec<_> = log.query(&AuditFilter::default()).into_iter().map(|e| e.resource).collect();
    assert_eq!(resources, vec!["cmd15", "cmd16", "cmd17", "cmd18", "cmd19"]);
    assert_eq!(line_count(&path), 5);
}

#[test]
fn test_replay_limit_keeps_newest() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("audit.jsonl");
    let sink = JsonlFileSink::open(&path).unwrap();
    for i in 0..10 {
        sink.append(&create_entry("u1", &format!("cmd{}", i))).unwrap();
    }

    let resources: Vec<_> = sink.replay(3).unwrap().into_iter().map(|e| e.resource).collect();
    assert_eq!(resources, vec!["cmd7", "cmd8", "cmd9"]);
    assert!(sink.replay(0).unwrap().is_empty());
}

#[test]
fn test_file_stays_bounded_across_reopens() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("audit.jsonl");

    for round in 0..3 {
        let log = AuditLog::restore(5, Arc::new(JsonlFileSink::open(&path).unwrap()));
        assert!(line_count(&path) <= 5, "round {} reopened with {} lines", round, line_count(&path));

        for i in 0..20 {
            log.record(create_entry("u1", &format!("r{}-{}", round, i)));
            assert!(line_count(&path) <= 10);
        }
        assert_eq!(log.len(), 5);
    }

    let log = AuditLog::restore(5, Arc::new(JsonlFileSink::open(&path).unwrap()));
    let resources: Vec<_> = log.query(&AuditFilter::default()).into_iter().map(|e| e.resource).collect();
    assert_eq!(resources, vec!["r2-15", "r2-16", "r2-17", "r2-18", "r2-19"]);
    assert_eq!(line_count(&path), 5);
}

#[test]
fn test_compaction_keeps_appending() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("audit.jsonl");
    let log = AuditLog::with_sink(2, Arc::new(JsonlFileSink::open(&path).unwrap()));

    // The fifth write pushes the file past twice the capacity
    for i in 0..5 {
        log.record(create_entry("u1", &format!("cmd{}", i)));
    }
    assert_eq!(line_count(&path), 2);

    log.record(create_entry("u1", "cmd5"));
    let sink = JsonlFileSink::open(&path).unwrap();
    let resources: Vec<_> = sink.replay(usize::MAX).unwrap().into_iter().map(|e| e.resource).collect();
    assert_eq!(resources, vec!["cmd3", "cmd4", "cmd5"]);
    assert!(!temp.path().join("audit.tmp").exists());
}

#[test]
fn test_replay_skips_malformed_lines() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("audit.jsonl");
    {
        let sink = JsonlFileSink::open(&path).unwrap();
        sink.append(&create_entry("u1", "pov_list")).unwrap();
    }
    {
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();
        writeln!(file).unwrap();
    }

    let sink = JsonlFileSink::open(&path).unwrap();
    let entries = sink.replay(usize::MAX).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].resource, "pov_list");
}

#[test]
fn test_concurrent_recording() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("audit.jsonl");
    let log = Arc::new(AuditLog::with_sink(1000, Arc::new(JsonlFileSink::open(&path).unwrap())));

    let mut handles = vec![];
    for t in 0..8 {
        let log = log.clone();
        handles.push(thread::spawn(move || {
            for i in 0..25 {
                log.record(create_entry(&format!("user{}", t), &format!("cmd{}", i)));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(log.len(), 200);
    assert_eq!(line_count(&path), 200);
}
