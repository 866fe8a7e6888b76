// ─────────────────────────────────────────────────────────────────────
// Truthal — Audit Sink Interface
// ─────────────────────────────────────────────────────────────────────
//! Persistence boundary for the audit log.
//!
//! The core never touches the filesystem. Deployments plug a durable
//! store in behind `AuditSink`; the in-memory sink covers tests and
//! single-process runs.

use parking_lot::Mutex;

use truthal_types::{GateResult, LogEntry};

/// Trait for audit persistence backends.
pub trait AuditSink: Send + Sync {
    /// Persist one entry. Entries arrive in chain order.
    fn append(&self, entry: &LogEntry) -> GateResult<()>;

    /// Load every persisted entry in chain order.
    fn read_all(&self) -> GateResult<Vec<LogEntry>>;
}

/// Volatile sink backed by a vector.
#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the sink with previously persisted entries.
    pub fn with_entries(entries: Vec<LogEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl AuditSink for MemorySink {
    fn append(&self, entry: &LogEntry) -> GateResult<()> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }

    fn read_all(&self) -> GateResult<Vec<LogEntry>> {
        Ok(self.entries.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use truthal_types::GENESIS_HASH;

    fn entry(index: usize) -> LogEntry {
        LogEntry {
            index,
            data: serde_json::json!({"n": index}),
            previous_hash: GENESIS_HASH.to_string(),
            hash: format!("{index:064}"),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_memory_sink_roundtrip_order() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());
        sink.append(&entry(0)).unwrap();
        sink.append(&entry(1)).unwrap();
        let all = sink.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].index, 0);
        assert_eq!(all[1].index, 1);
    }

    #[test]
    fn test_memory_sink_seeded() {
        let sink = MemorySink::with_entries(vec![entry(0)]);
        assert_eq!(sink.len(), 1);
    }
}
