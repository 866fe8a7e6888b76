// ─────────────────────────────────────────────────────────────────────
// Truthal — Human Approval Gate
// ─────────────────────────────────────────────────────────────────────
//! FIFO of items waiting for a human decision, and the dual-framed
//! summary each reviewer sees.
//!
//! The gate only holds items; turning decisions into releases and audit
//! entries is the engine's job.

use std::collections::VecDeque;

use parking_lot::Mutex;

use truthal_types::{EvaluationResult, Evidence, PendingApproval, ReviewSummary};

use crate::constitution::Constitution;

/// Build the neutral and adversarial framings of a held item.
pub fn review_summary(
    constitution: &Constitution,
    evidence: &Evidence,
    evaluation: &EvaluationResult,
    reason: &str,
) -> ReviewSummary {
    let config = constitution.config();
    let qualifying = constitution.qualifying_deltas(&evidence.belief_changes);
    let reversibility = if evidence.irreversible {
        "irreversible"
    } else {
        "reversible"
    };

    let neutral_frame = format!(
        "Evidence {} held for {reason}. Reaches {} agents; {reversibility}. \
         {} evaluator deltas, {qualifying} at or above {}. \
         Verifier: quality {:+.4}, capacity {:+.4}, conservative {}.",
        evidence.id,
        evidence.affected_agents,
        evidence.belief_changes.len(),
        config.materiality_threshold,
        evaluation.quality_delta,
        evaluation.capacity_delta,
        evaluation.conservative_mode,
    );

    let mut concerns = Vec::new();
    if evidence.irreversible {
        concerns.push("release cannot be undone".to_string());
    }
    if evidence.affected_agents >= config.high_impact_threshold {
        concerns.push(format!(
            "reaches {} agents, past the {} high-impact line",
            evidence.affected_agents, config.high_impact_threshold
        ));
    }
    if qualifying < config.material_count {
        concerns.push(format!(
            "only {qualifying} of the required {} evaluators shifted by {} or more",
            config.material_count, config.materiality_threshold
        ));
    }
    if evaluation.conservative_mode {
        concerns.push("the verifier asked for conservative handling".to_string());
    }
    if evidence.branch_outputs.is_empty() {
        concerns.push("no independent branch outputs back the claim".to_string());
    }
    if evaluation.quality_delta < 0.0 {
        concerns.push(format!(
            "the verifier expects truth quality to fall by {:.4}",
            -evaluation.quality_delta
        ));
    }
    let adversarial_frame = if concerns.is_empty() {
        format!(
            "No specific weakness found in {}; it is held only for {reason}.",
            evidence.id
        )
    } else {
        format!("Case against releasing {}: {}.", evidence.id, concerns.join("; "))
    };

    ReviewSummary {
        neutral_frame,
        adversarial_frame,
    }
}

#[derive(Default)]
pub struct ApprovalGate {
    queue: Mutex<VecDeque<PendingApproval>>,
}

impl ApprovalGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, item: PendingApproval) {
        self.queue.lock().push_back(item);
    }

    pub fn pop_next(&self) -> Option<PendingApproval> {
        self.queue.lock().pop_front()
    }

    /// Remove up to `n` items from the front, in queue order.
    pub fn take_front(&self, n: usize) -> Vec<PendingApproval> {
        let mut queue = self.queue.lock();
        let take = n.min(queue.len());
        queue.drain(..take).collect()
    }

    /// Drop every queued item for `evidence_id`. Returns how many went.
    pub fn remove_evidence(&self, evidence_id: &str) -> usize {
        let mut queue = self.queue.lock();
        let before = queue.len();
        queue.retain(|item| item.evidence_id != evidence_id);
        before - queue.len()
    }

    /// Snapshot of the queue, front first.
    pub fn pending(&self) -> Vec<PendingApproval> {
        self.queue.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}
