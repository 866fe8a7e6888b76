// ─────────────────────────────────────────────────────────────────────
// Truthal — Evaluation Score Types
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

/// Clamp a value to [lo, hi], mapping NaN to lo and Inf to nearest bound.
#[inline]
pub fn clamp_score(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        log::warn!("clamp_score: NaN detected, clamping to {lo:.4}");
        return lo;
    }
    if value.is_infinite() {
        let boundary = if value > 0.0 { hi } else { lo };
        log::warn!("clamp_score: Inf detected, clamping to {boundary:.4}");
        return boundary;
    }
    value.clamp(lo, hi)
}

/// Output of a verifier for one evidence item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Effect on the global truth-quality metric.
    pub quality_delta: f64,
    /// Effect on the global truth-capacity metric.
    pub capacity_delta: f64,
    /// Verifier requests human review regardless of impact.
    pub conservative_mode: bool,
}

impl EvaluationResult {
    pub fn new(quality_delta: f64, capacity_delta: f64, conservative_mode: bool) -> Self {
        Self {
            quality_delta,
            capacity_delta,
            conservative_mode,
        }
    }

    /// Neutral result that forces human review. Used whenever a verifier
    /// times out or fails.
    pub fn conservative_fallback() -> Self {
        Self {
            quality_delta: 0.0,
            capacity_delta: 0.0,
            conservative_mode: true,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.quality_delta.is_finite() && self.capacity_delta.is_finite()
    }
}
