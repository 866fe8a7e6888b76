// ─────────────────────────────────────────────────────────────────────
// Truthal — Constitution (Policy Table)
// ─────────────────────────────────────────────────────────────────────
//! Pure policy predicates over the gate thresholds.
//!
//! Nothing here mutates shared state; override accounting lives in
//! [`crate::overrides`].

use truthal_types::{clamp_score, Evidence, GateConfig, PartialDisclosure};

/// Policy thresholds and the predicates built on them.
#[derive(Debug, Clone)]
pub struct Constitution {
    config: GateConfig,
}

impl Constitution {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    /// True iff at least `material_count` deltas reach the threshold.
    ///
    /// The bar is an absolute count: three evaluators all reporting a
    /// large shift are still not material.
    pub fn is_material(&self, belief_changes: &[f64]) -> bool {
        self.qualifying_deltas(belief_changes) >= self.config.material_count
    }

    /// Number of deltas at or above `materiality_threshold`.
    pub fn qualifying_deltas(&self, belief_changes: &[f64]) -> usize {
        belief_changes
            .iter()
            .filter(|&&d| d >= self.config.materiality_threshold)
            .count()
    }

    pub fn is_high_impact(&self, affected_agents: u64, irreversible: bool) -> bool {
        irreversible || affected_agents >= self.config.high_impact_threshold
    }

    /// True once capacity has fallen below `1 - catastrophic_risk_threshold`.
    pub fn is_catastrophic(&self, capacity: f64) -> bool {
        capacity < self.config.catastrophic_capacity_floor()
    }

    pub fn triggers_conservative_mode(&self, cycles_without_consensus: u32) -> bool {
        cycles_without_consensus >= self.config.conservative_cycles
    }

    /// Triage priority: `irreversibility * scope`, each factor clamped
    /// to [0, 1] whatever the submitter sent.
    pub fn priority(&self, evidence: &Evidence) -> f64 {
        clamp_score(evidence.irreversibility, 0.0, 1.0) * clamp_score(evidence.scope, 0.0, 1.0)
    }

    /// Indices of `stream` in descending priority. Equal priorities keep
    /// their input order.
    pub fn rank(&self, stream: &[Evidence]) -> Vec<usize> {
        let scores: Vec<f64> = stream.iter().map(|e| self.priority(e)).collect();
        let mut order: Vec<usize> = (0..stream.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        order
    }

    /// Summary released in place of an item held by persistent
    /// conservative mode.
    pub fn forced_partial_disclosure(&self, evidence: &Evidence) -> PartialDisclosure {
        PartialDisclosure {
            summary: format!(
                "Partial disclosure of {}: persistent conservative mode after {} cycles of {}h without consensus",
                evidence.id, self.config.conservative_cycles, self.config.cycle_window_hours
            ),
            non_sensitive_evidence: evidence.non_sensitive.clone(),
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }
}
