// ─────────────────────────────────────────────────────────────────────
// Truthal — Verification Capability
// ─────────────────────────────────────────────────────────────────────
//! Verifier trait and the built-in implementations.
//!
//! A verifier turns one evidence item into an `EvaluationResult`. Real
//! deployments put model-backed evaluators behind this trait; the engine
//! never inspects which implementation it holds. Calls may be slow and
//! need not be deterministic, but every returned delta must be finite.

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use truthal_types::{Evidence, EvaluationResult, GateResult};

/// Trait for verification backends.
pub trait Verifier: Send + Sync {
    fn evaluate(&self, evidence: &Evidence, high_impact: bool) -> GateResult<EvaluationResult>;
}

/// Multi-branch agreement scorer.
///
/// Each branch contributes `weight * U(0.8, 1.0)`; agreement is the
/// weighted mean. Quality moves by `(agreement - 0.9) * 0.1`, capacity
/// drops by 0.01 for high-impact items, and agreement under
/// `consensus_floor` asks for conservative handling.
pub struct BranchAgreementVerifier {
    consensus_floor: f64,
    rng: Mutex<ChaCha8Rng>,
}

impl BranchAgreementVerifier {
    pub const AGREEMENT_PIVOT: f64 = 0.9;
    pub const QUALITY_GAIN: f64 = 0.1;
    pub const HIGH_IMPACT_CAPACITY_COST: f64 = -0.01;

    pub fn new(consensus_floor: f64) -> Self {
        Self::with_seed(consensus_floor, rand::random())
    }

    /// Reproducible branch sampling.
    pub fn with_seed(consensus_floor: f64, seed: u64) -> Self {
        Self {
            consensus_floor,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    /// Weighted agreement over the branches, or `None` without usable weight.
    pub fn agreement(&self, evidence: &Evidence) -> Option<f64> {
        let total_weight: f64 = evidence
            .branch_outputs
            .iter()
            .map(|b| b.weight.max(0.0))
            .sum();
        if evidence.branch_outputs.is_empty() || total_weight <= 0.0 || !total_weight.is_finite() {
            return None;
        }

        let mut rng = self.rng.lock();
        let weighted: f64 = evidence
            .branch_outputs
            .iter()
            .map(|b| b.weight.max(0.0) * rng.gen_range(0.8..=1.0))
            .sum();
        Some(weighted / total_weight)
    }
}

impl Verifier for BranchAgreementVerifier {
    fn evaluate(&self, evidence: &Evidence, high_impact: bool) -> GateResult<EvaluationResult> {
        let Some(agreement) = self.agreement(evidence) else {
            return Ok(EvaluationResult::default());
        };

        let quality_delta = (agreement - Self::AGREEMENT_PIVOT) * Self::QUALITY_GAIN;
        let capacity_delta = if high_impact {
            Self::HIGH_IMPACT_CAPACITY_COST
        } else {
            0.0
        };
        let conservative_mode = agreement < self.consensus_floor;
        if conservative_mode {
            log::warn!(
                "Branch agreement {agreement:.4} below consensus floor {} for {}",
                self.consensus_floor,
                evidence.id
            );
        }
        Ok(EvaluationResult::new(
            quality_delta,
            capacity_delta,
            conservative_mode,
        ))
    }
}

/// Verifier that returns the same result for every item.
pub struct StaticVerifier {
    result: EvaluationResult,
}

impl StaticVerifier {
    pub fn new(result: EvaluationResult) -> Self {
        Self { result }
    }

    /// Zero deltas, never conservative.
    pub fn neutral() -> Self {
        Self::new(EvaluationResult::default())
    }
}

impl Verifier for StaticVerifier {
    fn evaluate(&self, _evidence: &Evidence, _high_impact: bool) -> GateResult<EvaluationResult> {
        Ok(self.result)
    }
}

/// External verifier that calls a function pointer.
///
/// Used to plug network-bound evaluators in without a dedicated type.
type EvaluateFn = Box<dyn Fn(&Evidence, bool) -> GateResult<EvaluationResult> + Send + Sync>;

pub struct ExternalVerifier {
    evaluate_fn: EvaluateFn,
}

impl ExternalVerifier {
    pub fn new(
        evaluate_fn: impl Fn(&Evidence, bool) -> GateResult<EvaluationResult> + Send + Sync + 'static,
    ) -> Self {
        Self {
            evaluate_fn: Box::new(evaluate_fn),
        }
    }
}

impl Verifier for ExternalVerifier {
    fn evaluate(&self, evidence: &Evidence, high_impact: bool) -> GateResult<EvaluationResult> {
        (self.evaluate_fn)(evidence, high_impact)
    }
}
