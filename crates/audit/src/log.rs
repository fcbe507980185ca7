use crate::entry::{AuditEntry, AuditFilter, EXECUTE_COMMAND};
use crate::sink::{AuditSink, NullSink};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_RETENTION: usize = 1000;

/// Bounded in-memory audit trail with best-effort persistence.
///
/// Recording never fails: sink errors are logged and the entry is still kept
/// in memory. Once `capacity` is reached the oldest entry is evicted. The sink
/// is compacted back to the retained entries on restore and whenever it holds
/// more than twice `capacity`.
pub struct AuditLog {
    retained: Mutex<Retained>,
    capacity: usize,
    sink: Arc<dyn AuditSink>,
}

struct Retained {
    entries: VecDeque<AuditEntry>,
    /// Entries the sink holds since it was last compacted.
    persisted: usize,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self::with_sink(capacity, Arc::new(NullSink))
    }

    pub fn with_sink(capacity: usize, sink: Arc<dyn AuditSink>) -> Self {
        let capacity = capacity.max(1);
        Self {
            retained: Mutex::new(Retained {
                entries: VecDeque::with_capacity(capacity.min(DEFAULT_RETENTION)),
                persisted: 0,
            }),
            capacity,
            sink,
        }
    }

    /// Build a log pre-filled with the newest entries the sink holds, then
    /// trim the sink to match.
    pub fn restore(capacity: usize, sink: Arc<dyn AuditSink>) -> Self {
        let log = Self::with_sink(capacity, sink);
        match log.sink.replay(log.capacity) {
            Ok(previous) => {
                debug!("Replayed {} audit entries", previous.len());
                let mut retained = log.retained.lock();
                for entry in previous {
                    push_bounded(&mut retained.entries, log.capacity, entry);
                }
                log.compact(&mut retained);
            }
            Err(e) => warn!("Audit replay failed, starting empty: {}", e),
        }
        log
    }

    pub fn record(&self, entry: AuditEntry) {
        let mut retained = self.retained.lock();
        match self.sink.append(&entry) {
            Ok(()) => retained.persisted += 1,
            Err(e) => warn!("Audit sink write failed for {}/{}: {}", entry.action, entry.resource, e),
        }
        push_bounded(&mut retained.entries, self.capacity, entry);

        if retained.persisted > self.capacity.saturating_mul(2) {
            self.compact(&mut retained);
        }
    }

    fn compact(&self, retained: &mut Retained) {
        let snapshot: Vec<AuditEntry> = retained.entries.iter().cloned().collect();
        match self.sink.rewrite(&snapshot) {
            Ok(()) => retained.persisted = snapshot.len(),
            Err(e) => warn!("Audit sink compaction failed: {}", e),
        }
    }

    /// Matching entries, oldest first.
    pub fn query(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        self.retained
            .lock()
            .entries
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    /// Allowed command executions, counted per command id.
    pub fn usage_statistics(&self) -> BTreeMap<String, u64> {
        let mut stats = BTreeMap::new();
        for entry in self.retained.lock().entries.iter() {
            if entry.allowed && entry.action == EXECUTE_COMMAND {
                *stats.entry(entry.resource.clone()).or_insert(0) += 1;
            }
        }
        stats
    }

    /// A user's most recent command executions, newest first.
    pub fn execution_history(&self, user_id: &str, limit: usize) -> Vec<AuditEntry> {
        let filter = AuditFilter::user(user_id).action(EXECUTE_COMMAND);
        let retained = self.retained.lock();
        retained
            .entries
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.retained.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retained.lock().entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

fn push_bounded(entries: &mut VecDeque<AuditEntry>, capacity: usize, entry: AuditEntry) {
    while entries.len() >= capacity {
        entries.pop_front();
    }
    entries.push_back(entry);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::sink::AuditSinkError;

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn append(&self, _entry: &AuditEntry) -> Result<(), AuditSinkError> {
            Err(AuditSinkError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
        }
    }

    fn run(user: &str, command: &str) -> AuditEntry {
        AuditEntry::allowed(user, "dc", EXECUTE_COMMAND, command)
    }

    #[test]
    fn test_eviction_is_oldest_first() {
        let log = AuditLog::new(3);
        for i in 0..5 {
            log.record(run("u1", &format!("cmd{}", i)));
        }
        let resources: Vec<_> = log.query(&AuditFilter::default()).into_iter().map(|e| e.resource).collect();
        assert_eq!(resources, vec!["cmd2", "cmd3", "cmd4"]);
    }

    #[test]
    fn test_sink_failure_does_not_lose_entry() {
        let log = AuditLog::with_sink(10, Arc::new(FailingSink));
        log.record(run("u1", "pov_list"));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_usage_statistics_ignores_denials() {
        let log = AuditLog::default();
        log.record(run("u1", "pov_list"));
        log.record(run("u2", "pov_list"));
        log.record(run("u1", "trr_list"));
        log.record(AuditEntry::denied("u3", "analyst", EXECUTE_COMMAND, "pov_create", "insufficient role permissions"));
        log.record(AuditEntry::allowed("u1", "dc", "remote_execute", "terminal"));

        let stats = log.usage_statistics();
        assert_eq!(stats.get("pov_list"), Some(&2));
        assert_eq!(stats.get("trr_list"), Some(&1));
        assert!(!stats.contains_key("pov_create"));
        assert!(!stats.contains_key("terminal"));
    }

    #[test]
    fn test_execution_history_newest_first() {
        let log = AuditLog::default();
        log.record(run("u1", "a"));
        log.record(run("u2", "b"));
        log.record(run("u1", "c"));
        log.record(run("u1", "d"));

        let history: Vec<_> = log.execution_history("u1", 2).into_iter().map(|e| e.resource).collect();
        assert_eq!(history, vec!["d", "c"]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let log = AuditLog::new(0);
        log.record(run("u1", "a"));
        log.record(run("u1", "b"));
        assert_eq!(log.len(), 1);
        assert_eq!(log.capacity(), 1);
    }
}
