// ─────────────────────────────────────────────────────────────────────
// Truthal — Tamper-Evident Audit Log
// ─────────────────────────────────────────────────────────────────────
//! Append-only, hash-chained record of every gate decision.
//!
//! `hash_i = SHA-256(hash_{i-1} as hex bytes || canonical_json(data_i))`
//! with 64 zero characters standing in for `hash_{-1}`. Canonical JSON
//! is the compact encoding of a `serde_json::Value`, whose object keys
//! are kept in sorted order.
//!
//! The chain detects after-the-fact edits; it does not prevent them and
//! carries no signatures.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use sha2::{Digest, Sha256};

use truthal_types::{GateError, GateResult, LogEntry, GENESIS_HASH};

use crate::sink::AuditSink;

/// Compute the chained hash for `data` following `previous_hash`.
pub fn chain_hash(previous_hash: &str, data: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(previous_hash.as_bytes());
    hasher.update(data.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Verify an exported chain. Returns the index of the first entry whose
/// link or hash does not match.
pub fn verify_entries(entries: &[LogEntry]) -> GateResult<()> {
    let mut expected_prev = GENESIS_HASH;
    for (idx, entry) in entries.iter().enumerate() {
        if entry.index != idx || entry.previous_hash != expected_prev {
            return Err(GateError::LogCorruption { index: idx });
        }
        if chain_hash(&entry.previous_hash, &entry.data) != entry.hash {
            return Err(GateError::LogCorruption { index: idx });
        }
        expected_prev = entry.hash.as_str();
    }
    Ok(())
}

/// Hash-chained append-only log.
///
/// Thread-safe: appends take the write lock, so chain order is the
/// order in which appends acquired it. Verification and snapshots share
/// the read lock and never observe a half-written entry.
pub struct TamperEvidentLog {
    entries: RwLock<Vec<LogEntry>>,
    sink: Option<Arc<dyn AuditSink>>,
}

impl Default for TamperEvidentLog {
    fn default() -> Self {
        Self::new()
    }
}

impl TamperEvidentLog {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            sink: None,
        }
    }

    /// Empty log that mirrors every append into `sink`.
    pub fn with_sink(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            sink: Some(sink),
        }
    }

    /// Rebuild a log from the entries already persisted in `sink`.
    ///
    /// The loaded chain is not verified here; call [`Self::verify`].
    pub fn from_sink(sink: Arc<dyn AuditSink>) -> GateResult<Self> {
        let entries = sink.read_all()?;
        log::info!("Audit log restored from sink: {} entries", entries.len());
        Ok(Self {
            entries: RwLock::new(entries),
            sink: Some(sink),
        })
    }

    /// Append a payload and return its hash.
    pub fn append(&self, data: Value) -> String {
        let mut entries = self.entries.write();
        let previous_hash = entries
            .last()
            .map(|e| e.hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        let hash = chain_hash(&previous_hash, &data);
        let entry = LogEntry {
            index: entries.len(),
            data,
            previous_hash,
            hash: hash.clone(),
            timestamp: Utc::now(),
        };

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.append(&entry) {
                log::error!("Audit sink rejected entry {}: {e}", entry.index);
            }
        }
        entries.push(entry);
        hash
    }

    pub fn last_hash(&self) -> String {
        self.entries
            .read()
            .last()
            .map(|e| e.hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Read-only snapshot of the whole chain.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.read().clone()
    }

    /// Entries whose payload names `evidence_id`, in chain order.
    pub fn entries_for(&self, evidence_id: &str) -> Vec<LogEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.evidence_id() == Some(evidence_id))
            .cloned()
            .collect()
    }

    /// Recompute every hash; report the first mismatching entry.
    pub fn verify(&self) -> GateResult<()> {
        verify_entries(&self.entries.read())
    }

    pub fn verify_chain(&self) -> bool {
        self.verify().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::sink::MemorySink;

    #[test]
    fn test_empty_log() {
        let log = TamperEvidentLog::new();
        assert!(log.is_empty());
        assert_eq!(log.last_hash(), GENESIS_HASH);
        assert!(log.verify_chain());
    }

    #[test]
    fn test_first_entry_links_to_genesis() {
        let log = TamperEvidentLog::new();
        let h = log.append(json!({"event": "x"}));
        let entries = log.entries();
        assert_eq!(entries[0].previous_hash, GENESIS_HASH);
        assert_eq!(entries[0].hash, h);
        assert_eq!(h.len(), 64);
        assert_eq!(log.last_hash(), h);
    }

    #[test]
    fn test_hash_formula() {
        let data = json!({"b": 2, "a": 1});
        let mut hasher = Sha256::new();
        hasher.update(GENESIS_HASH.as_bytes());
        hasher.update(br#"{"a":1,"b":2}"#);
        let expected = hex::encode(hasher.finalize());
        assert_eq!(chain_hash(GENESIS_HASH, &data), expected);
    }

    #[test]
    fn test_chain_links() {
        let log = TamperEvidentLog::new();
        for i in 0..5 {
            log.append(json!({"n": i}));
        }
        let entries = log.entries();
        for pair in entries.windows(2) {
            assert_eq!(pair[1].previous_hash, pair[0].hash);
        }
        assert!(log.verify_chain());
    }

    #[test]
    fn test_mutated_data_breaks_chain() {
        let log = TamperEvidentLog::new();
        for i in 0..4 {
            log.append(json!({"evidence_id": format!("e{i}"), "route": "auto_released"}));
        }
        log.entries.write()[2].data = json!({"evidence_id": "e2", "route": "withheld"});
        assert!(!log.verify_chain());
        assert_eq!(log.verify(), Err(GateError::LogCorruption { index: 2 }));
    }

    #[test]
    fn test_relinked_entry_detected() {
        let log = TamperEvidentLog::new();
        log.append(json!({"n": 0}));
        log.append(json!({"n": 1}));
        log.entries.write()[1].previous_hash = GENESIS_HASH.to_string();
        assert_eq!(log.verify(), Err(GateError::LogCorruption { index: 1 }));
    }

    #[test]
    fn test_entries_for_filters_by_evidence() {
        let log = TamperEvidentLog::new();
        log.append(json!({"evidence_id": "a"}));
        log.append(json!({"evidence_id": "b"}));
        log.append(json!({"evidence_id": "a", "approved": true}));
        let a = log.entries_for("a");
        assert_eq!(a.len(), 2);
        assert_eq!(a[1].index, 2);
    }

    #[test]
    fn test_sink_mirrors_and_restores() {
        let sink = Arc::new(MemorySink::new());
        let log = TamperEvidentLog::with_sink(sink.clone());
        log.append(json!({"n": 0}));
        log.append(json!({"n": 1.25}));
        assert_eq!(sink.len(), 2);

        let restored = TamperEvidentLog::from_sink(sink).unwrap();
        assert_eq!(restored.len(), 2);
        assert!(restored.verify_chain());
        assert_eq!(restored.last_hash(), log.last_hash());
    }

    #[test]
    fn test_exported_chain_verifies_through_json() {
        let log = TamperEvidentLog::new();
        log.append(json!({"capacity": 0.99, "route": "auto_released"}));
        log.append(json!({"capacity": 0.98, "route": "pending_human_approval"}));
        let text = serde_json::to_string(&log.entries()).unwrap();
        let exported: Vec<LogEntry> = serde_json::from_str(&text).unwrap();
        assert!(verify_entries(&exported).is_ok());
    }
}
