// ─────────────────────────────────────────────────────────────────────
// Truthal — Dissemination Gate Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for all dissemination gate failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GateError {
    /// Unknown evidence id. Surfaced to the caller, never fatal.
    #[error("evidence not found: {0}")]
    NotFound(String),

    /// Verifier exceeded its deadline.
    #[error("timeout: evaluation exceeded {deadline_ms}ms deadline")]
    EvaluationTimeout { deadline_ms: u64 },

    /// Verifier failed, panicked or produced a non-finite result.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// Override requested with an empty budget or an engaged kill switch.
    #[error("override exhausted: {0}")]
    OverrideExhausted(String),

    /// Review decision on an item that is not, or is no longer, the
    /// pending version of its evidence.
    #[error("stale approval: {0}")]
    StaleApproval(String),

    /// Hash-chain verification mismatch at the given entry.
    #[error("audit log corrupted at entry {index}")]
    LogCorruption { index: usize },

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Audit sink could not store or load entries.
    #[error("audit sink error: {0}")]
    Sink(String),

    /// Payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl GateError {
    /// True for failures the engine absorbs with a conservative fallback.
    pub fn is_evaluation_failure(&self) -> bool {
        matches!(
            self,
            GateError::EvaluationTimeout { .. } | GateError::Evaluation(_)
        )
    }
}

impl From<serde_json::Error> for GateError {
    fn from(err: serde_json::Error) -> Self {
        GateError::Serialization(err.to_string())
    }
}

pub type GateResult<T> = Result<T, GateError>;
