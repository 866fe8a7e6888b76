// ─────────────────────────────────────────────────────────────────────
// Truthal — Routing Decisions and Operator Responses
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::score::EvaluationResult;

/// Lifecycle state of a stored evidence item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Received,
    AutoReleased,
    PendingHumanApproval,
    Withheld,
}

impl Route {
    /// True once the item has left `Received`.
    pub fn is_routed(self) -> bool {
        !matches!(self, Route::Received)
    }

    pub fn status(self) -> DisseminationStatus {
        match self {
            Route::AutoReleased => DisseminationStatus::Disseminated,
            Route::PendingHumanApproval | Route::Received => DisseminationStatus::ApprovalRequired,
            Route::Withheld => DisseminationStatus::Withheld,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Route::Received => "received",
            Route::AutoReleased => "auto_released",
            Route::PendingHumanApproval => "pending_human_approval",
            Route::Withheld => "withheld",
        }
    }
}

/// Caller-facing dissemination status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisseminationStatus {
    Disseminated,
    ApprovalRequired,
    Withheld,
    NotFound,
}

impl DisseminationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DisseminationStatus::Disseminated => "disseminated",
            DisseminationStatus::ApprovalRequired => "approval_required",
            DisseminationStatus::Withheld => "withheld",
            DisseminationStatus::NotFound => "not_found",
        }
    }
}

/// Summary released while persistent conservative mode blocks the full item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialDisclosure {
    pub summary: String,
    pub non_sensitive_evidence: Vec<String>,
}

/// Result of a dissemination request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dissemination {
    pub evidence_id: String,
    pub status: DisseminationStatus,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_disclosure: Option<PartialDisclosure>,
}

impl Dissemination {
    pub fn not_found(evidence_id: impl Into<String>) -> Self {
        let evidence_id = evidence_id.into();
        Self {
            detail: format!("evidence {evidence_id} is not in the store"),
            evidence_id,
            status: DisseminationStatus::NotFound,
            partial_disclosure: None,
        }
    }

    pub fn is_released(&self) -> bool {
        self.status == DisseminationStatus::Disseminated
    }
}

/// Two framings of one held item, shown side by side to the reviewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSummary {
    /// Facts and verifier output, stated without judgement.
    pub neutral_frame: String,
    /// The strongest case against releasing the item.
    pub adversarial_frame: String,
}

/// Item waiting for a human decision.
///
/// `generation` ties the item to the exact evidence version that was
/// routed. A decision on an item whose evidence has since been replaced,
/// re-routed or removed is discarded by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingApproval {
    pub evidence_id: String,
    pub generation: u64,
    pub question: String,
    pub summary: ReviewSummary,
    pub evaluation: EvaluationResult,
}

/// Outcome of one positional decision in a review batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalOutcome {
    pub evidence_id: String,
    pub approved: bool,
    pub released_answer: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlStatus {
    Success,
    Error,
}

/// Structured reply to an operator control action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub status: ControlStatus,
    pub message: String,
}

impl ControlResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ControlStatus::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ControlStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ControlStatus::Success
    }
}

/// Snapshot of engine metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemState {
    pub truth_capacity: f64,
    pub truth_quality: f64,
    pub material_evidence_count: usize,
    pub cycles_without_consensus: u32,
    pub conservative_mode: bool,
    pub audit_halted: bool,
    pub pending_approvals: usize,
}
