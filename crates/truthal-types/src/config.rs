// ─────────────────────────────────────────────────────────────────────
// Truthal — Dissemination Gate Configuration
// (C) 2026 Truthal Contributors. All rights reserved.
// License: GNU AGPL v3
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::error::{GateError, GateResult};

/// Policy thresholds and resource limits for the dissemination gate.
///
/// Every field has a conservative default; `validate()` must pass
/// before a config is handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Minimum posterior shift for a single evaluator's delta to count
    /// towards materiality.
    /// Default: 0.10.
    pub materiality_threshold: f64,

    /// Absolute number of qualifying deltas needed for materiality.
    /// Default: 10. Not scaled to the number of evaluators.
    pub material_count: usize,

    /// Affected-agent population at which evidence becomes high impact.
    /// Default: 1,000,000.
    pub high_impact_threshold: u64,

    /// Relative capacity loss that counts as catastrophic.
    /// Default: 0.3 (capacity below 0.70).
    pub catastrophic_risk_threshold: f64,

    /// Consecutive cycles without consensus before conservative mode.
    /// Default: 3.
    pub conservative_cycles: u32,

    /// Length of one consensus cycle, in hours. Tracked by the scheduler;
    /// recorded here so operators see a single source of truth.
    /// Default: 72.
    pub cycle_window_hours: u64,

    /// Manual overrides available before the budget is exhausted.
    /// Default: 12.
    pub override_budget: u32,

    /// Upper bound on items drained from triage per cycle.
    /// Default: 5.
    pub max_concurrent: usize,

    /// Capacity lost per processed evidence item.
    /// Default: 0.01.
    pub capacity_penalty: f64,

    /// Branch agreement below which a verifier reports conservative mode.
    /// Default: 0.85.
    pub consensus_floor: f64,

    /// Deadline for a single verifier call in milliseconds.
    /// Default: 5000.
    pub evaluation_deadline_ms: u64,

    /// Verifier calls allowed in flight at once, counting calls that
    /// outlived their deadline. Further calls fail fast.
    /// Default: 32.
    pub max_pending_evaluations: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            materiality_threshold: 0.10,
            material_count: 10,
            high_impact_threshold: 1_000_000,
            catastrophic_risk_threshold: 0.3,
            conservative_cycles: 3,
            cycle_window_hours: 72,
            override_budget: 12,
            max_concurrent: 5,
            capacity_penalty: 0.01,
            consensus_floor: 0.85,
            evaluation_deadline_ms: 5_000,
            max_pending_evaluations: 32,
        }
    }
}

impl GateConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> GateResult<()> {
        if !(0.0..=1.0).contains(&self.materiality_threshold) {
            return Err(GateError::Config(format!(
                "materiality_threshold must be in [0, 1], got {}",
                self.materiality_threshold
            )));
        }
        if self.material_count == 0 {
            return Err(GateError::Config(
                "material_count must be >= 1".to_string(),
            ));
        }
        if !(self.catastrophic_risk_threshold > 0.0 && self.catastrophic_risk_threshold < 1.0) {
            return Err(GateError::Config(format!(
                "catastrophic_risk_threshold must be in (0, 1), got {}",
                self.catastrophic_risk_threshold
            )));
        }
        if self.conservative_cycles == 0 {
            return Err(GateError::Config(
                "conservative_cycles must be >= 1".to_string(),
            ));
        }
        if self.max_concurrent == 0 {
            return Err(GateError::Config(
                "max_concurrent must be >= 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.capacity_penalty) {
            return Err(GateError::Config(format!(
                "capacity_penalty must be in [0, 1], got {}",
                self.capacity_penalty
            )));
        }
        if !(0.0..=1.0).contains(&self.consensus_floor) {
            return Err(GateError::Config(format!(
                "consensus_floor must be in [0, 1], got {}",
                self.consensus_floor
            )));
        }
        if self.evaluation_deadline_ms == 0 {
            return Err(GateError::Config(
                "evaluation_deadline_ms must be > 0".to_string(),
            ));
        }
        if self.max_pending_evaluations == 0 {
            return Err(GateError::Config(
                "max_pending_evaluations must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load and validate from a JSON string. Missing fields take their
    /// defaults.
    pub fn from_json(json: &str) -> GateResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| GateError::Config(format!("JSON parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Capacity level below which the system is in catastrophic risk.
    pub fn catastrophic_capacity_floor(&self) -> f64 {
        1.0 - self.catastrophic_risk_threshold
    }
}
