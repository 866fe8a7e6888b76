// ─────────────────────────────────────────────────────────────────────
// Truthal — Audit Log Entry
// ─────────────────────────────────────────────────────────────────────

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `previous_hash` of the first entry in every chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// One immutable record in the hash-chained audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Position in the chain, starting at 0.
    pub index: usize,
    /// Decision payload.
    pub data: Value,
    /// Hex SHA-256 of the preceding entry, or [`GENESIS_HASH`].
    pub previous_hash: String,
    /// Hex SHA-256 of `previous_hash || canonical_json(data)`.
    pub hash: String,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    /// Evidence id recorded in the payload, if any.
    pub fn evidence_id(&self) -> Option<&str> {
        self.data.get("evidence_id").and_then(Value::as_str)
    }

    /// Payload `event` tag, if any.
    pub fn event(&self) -> Option<&str> {
        self.data.get("event").and_then(Value::as_str)
    }
}
