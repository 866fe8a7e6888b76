// ─────────────────────────────────────────────────────────────────────
// Truthal — Dissemination Engine
// ─────────────────────────────────────────────────────────────────────
//! Intake → evaluation → policy routing → audit.
//!
//! Each stored item moves `Received → {AutoReleased |
//! PendingHumanApproval | Withheld}`. Routing rules, first match wins:
//!
//! 1. capacity in catastrophic range → human approval
//! 2. audit chain found corrupted → human approval
//! 3. high impact without a consumed override → human approval
//! 4. high impact with an enabled, funded override explicitly invoked →
//!    release, one unit of budget spent
//! 5. conservative mode (verifier flag or persistent lack of consensus)
//!    → human approval
//! 6. otherwise → release
//!
//! Every terminal transition appends exactly one audit entry.
//!
//! Each `add_evidence` gives the id a new generation. A pending approval
//! carries the generation it was routed under, and a decision is applied
//! only while that generation is still the one awaiting review.
//!
//! # Locking
//!
//! The verifier runs on a worker thread while no engine lock is held;
//! its result is applied under the state write lock. Lock order is
//! state → overrides → approvals → log, and nothing acquires them in
//! the reverse direction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use parking_lot::RwLock;
use serde_json::{json, Value};

use truthal_types::{
    clamp_score, ApprovalOutcome, ControlResponse, Dissemination, Evidence, EvaluationResult,
    GateConfig, GateError, GateResult, LogEntry, PendingApproval, Route, SystemState,
};

use crate::approval::{review_summary, ApprovalGate};
use crate::constitution::Constitution;
use crate::ledger::TamperEvidentLog;
use crate::overrides::OverrideController;
use crate::sink::AuditSink;
use crate::triage::TriageQueue;
use crate::verification::Verifier;

/// Mutable metrics and evidence store, owned by one engine.
#[derive(Debug)]
struct EngineState {
    truth_capacity: f64,
    truth_quality: f64,
    material_evidence_store: HashMap<String, Evidence>,
    routes: HashMap<String, Route>,
    generations: HashMap<String, u64>,
    next_generation: u64,
    cycles_without_consensus: u32,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            truth_capacity: 1.0,
            truth_quality: 1.0,
            material_evidence_store: HashMap::new(),
            routes: HashMap::new(),
            generations: HashMap::new(),
            next_generation: 0,
            cycles_without_consensus: 0,
        }
    }
}

pub struct DisseminationEngine {
    config: GateConfig,
    constitution: Constitution,
    verifier: Arc<dyn Verifier>,
    state: RwLock<EngineState>,
    log: TamperEvidentLog,
    triage: TriageQueue,
    approvals: ApprovalGate,
    overrides: OverrideController,
    audit_halted: AtomicBool,
    intake_seq: AtomicU64,
    in_flight: Arc<AtomicUsize>,
}

/// Counts one running verifier call until dropped.
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl DisseminationEngine {
    pub fn new(config: GateConfig, verifier: Arc<dyn Verifier>) -> GateResult<Self> {
        config.validate()?;
        Ok(Self::assemble(config, verifier, TamperEvidentLog::new()))
    }

    /// Engine whose audit log is restored from, and mirrored into, `sink`.
    ///
    /// A restored chain that fails verification does not abort
    /// construction: the engine starts with automatic release halted
    /// until an operator acknowledges the corruption.
    pub fn with_sink(
        config: GateConfig,
        verifier: Arc<dyn Verifier>,
        sink: Arc<dyn AuditSink>,
    ) -> GateResult<Self> {
        config.validate()?;
        let log = TamperEvidentLog::from_sink(sink)?;
        let engine = Self::assemble(config, verifier, log);
        engine.verify_audit_chain();
        Ok(engine)
    }

    fn assemble(config: GateConfig, verifier: Arc<dyn Verifier>, log: TamperEvidentLog) -> Self {
        let constitution = Constitution::new(config.clone());
        Self {
            triage: TriageQueue::new(constitution.clone()),
            overrides: OverrideController::new(config.override_budget),
            constitution,
            config,
            verifier,
            state: RwLock::new(EngineState::default()),
            log,
            approvals: ApprovalGate::new(),
            audit_halted: AtomicBool::new(false),
            intake_seq: AtomicU64::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    // ── Intake ────────────────────────────────────────────────────

    /// Store evidence under `id`, replacing any previous item with that
    /// key and resetting it to `Received`. Review items queued for the
    /// replaced version are dropped.
    pub fn add_evidence(&self, id: &str, mut evidence: Evidence) {
        evidence.id = id.to_string();
        let mut state = self.state.write();
        let replaced = state
            .material_evidence_store
            .insert(id.to_string(), evidence)
            .is_some();
        state.next_generation += 1;
        let generation = state.next_generation;
        state.generations.insert(id.to_string(), generation);
        state.routes.insert(id.to_string(), Route::Received);
        if replaced {
            let dropped = self.approvals.remove_evidence(id);
            if dropped > 0 {
                log::warn!("Evidence {id} replaced; {dropped} pending review item(s) dropped");
            } else {
                log::info!("Evidence {id} replaced");
            }
        } else {
            log::debug!("Evidence {id} received");
        }
    }

    /// Queue evidence for triage instead of storing it directly.
    pub fn submit(&self, evidence: Evidence) {
        self.triage.enqueue(evidence);
    }

    /// Store the next bounded batch of triaged evidence. Returns the
    /// stored ids, highest priority first.
    pub fn process_triage_batch(&self) -> Vec<String> {
        self.triage
            .drain_batch()
            .into_iter()
            .map(|evidence| {
                let id = if evidence.id.is_empty() {
                    format!(
                        "evidence_{:06}",
                        self.intake_seq.fetch_add(1, Ordering::SeqCst) + 1
                    )
                } else {
                    evidence.id.clone()
                };
                self.add_evidence(&id, evidence);
                id
            })
            .collect()
    }

    // ── Dissemination ─────────────────────────────────────────────

    /// Route a stored item without invoking an override.
    pub fn disseminate(&self, id: &str) -> GateResult<Dissemination> {
        self.route(id, None)
    }

    /// Route a stored item, spending one override on `actor`'s behalf if
    /// the item is high impact and an override is enabled and funded.
    /// A refused override falls through to the next rule.
    pub fn disseminate_with_override(&self, id: &str, actor: &str) -> GateResult<Dissemination> {
        self.route(id, Some(actor))
    }

    fn route(&self, id: &str, override_actor: Option<&str>) -> GateResult<Dissemination> {
        let (evidence, generation) = {
            let state = self.state.read();
            let evidence = state
                .material_evidence_store
                .get(id)
                .ok_or_else(|| GateError::NotFound(id.to_string()))?;
            if let Some(done) = already_routed(id, state.routes.get(id)) {
                return Ok(done);
            }
            (evidence.clone(), state.generations.get(id).copied())
        };

        let high_impact = self
            .constitution
            .is_high_impact(evidence.affected_agents, evidence.irreversible);
        let (mut evaluation, mut failure) =
            match self.evaluate_with_deadline(evidence.clone(), high_impact) {
                Ok(result) => (result, None),
                Err(e) => {
                    if e.is_evaluation_failure() {
                        log::warn!("Evaluation of {id} failed, routing conservatively: {e}");
                    } else {
                        log::error!("Verifier for {id} returned {e}; routing conservatively");
                    }
                    (EvaluationResult::conservative_fallback(), Some(e.to_string()))
                }
            };

        let mut state = self.state.write();
        let Some(current) = state.material_evidence_store.get(id).cloned() else {
            return Err(GateError::NotFound(id.to_string()));
        };
        if let Some(done) = already_routed(id, state.routes.get(id)) {
            return Ok(done);
        }
        let current_generation = state.generations.get(id).copied().unwrap_or_default();
        if Some(current_generation) != generation || current != evidence {
            log::warn!("Evidence {id} replaced during evaluation; discarding result");
            evaluation = EvaluationResult::conservative_fallback();
            failure = Some("evidence replaced during evaluation".to_string());
        }
        let evidence = current;

        state.truth_quality = clamp_score(state.truth_quality + evaluation.quality_delta, 0.0, 1.0);
        state.truth_capacity = clamp_score(
            state.truth_capacity - self.config.capacity_penalty + evaluation.capacity_delta.min(0.0),
            0.0,
            1.0,
        );

        let catastrophic = self.constitution.is_catastrophic(state.truth_capacity);
        let material = self.constitution.is_material(&evidence.belief_changes);
        let persistent_conservative = self
            .constitution
            .triggers_conservative_mode(state.cycles_without_consensus);
        let audit_halted = self.audit_halted.load(Ordering::SeqCst);

        let mut override_used = false;
        let mut override_declined: Option<String> = None;
        let (route, reason) = if catastrophic {
            (Route::PendingHumanApproval, "catastrophic_risk")
        } else if audit_halted {
            (Route::PendingHumanApproval, "audit_log_corruption")
        } else if high_impact {
            match override_actor {
                Some(actor) if self.overrides.consume_enabled(actor) => {
                    override_used = true;
                    log::warn!("Override used by {actor} to release high-impact evidence {id}");
                    (Route::AutoReleased, "override")
                }
                Some(actor) => {
                    let declined = GateError::OverrideExhausted(format!(
                        "override for {id} requested by {actor} but none is available"
                    ));
                    log::warn!("{declined}");
                    override_declined = Some(declined.to_string());
                    (Route::PendingHumanApproval, "high_impact")
                }
                None => (Route::PendingHumanApproval, "high_impact"),
            }
        } else if evaluation.conservative_mode || persistent_conservative {
            (Route::PendingHumanApproval, "conservative_mode")
        } else {
            (Route::AutoReleased, "policy_clear")
        };

        state.routes.insert(id.to_string(), route);
        let partial_disclosure = (route == Route::PendingHumanApproval && persistent_conservative)
            .then(|| self.constitution.forced_partial_disclosure(&evidence));
        if route == Route::PendingHumanApproval {
            self.approvals.enqueue(PendingApproval {
                evidence_id: id.to_string(),
                generation: current_generation,
                question: format!("Release evidence {id} ({reason})?"),
                summary: review_summary(&self.constitution, &evidence, &evaluation, reason),
                evaluation,
            });
        }

        let status = route.status();
        self.log.append(json!({
            "event": "dissemination",
            "evidence_id": id,
            "route": route.as_str(),
            "status": status.as_str(),
            "reason": reason,
            "high_impact": high_impact,
            "material": material,
            "catastrophic": catastrophic,
            "override_used": override_used,
            "override_declined": override_declined,
            "evaluation": evaluation,
            "evaluation_failure": failure,
            "truth_capacity": state.truth_capacity,
            "truth_quality": state.truth_quality,
        }));
        log::info!("Evidence {id} routed to {} ({reason})", route.as_str());

        Ok(Dissemination {
            evidence_id: id.to_string(),
            status,
            detail: reason.to_string(),
            partial_disclosure,
        })
    }

    /// Run the verifier on a worker thread, bounded by the configured
    /// deadline. A late result is dropped with its channel.
    fn evaluate_with_deadline(
        &self,
        evidence: Evidence,
        high_impact: bool,
    ) -> GateResult<EvaluationResult> {
        let deadline_ms = self.config.evaluation_deadline_ms;
        let cap = self.config.max_pending_evaluations;
        if self.in_flight.fetch_add(1, Ordering::SeqCst) >= cap {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(GateError::Evaluation(format!(
                "verifier saturated: {cap} evaluations already in flight"
            )));
        }
        let guard = InFlightGuard(Arc::clone(&self.in_flight));

        let (tx, rx) = crossbeam_channel::bounded(1);
        let verifier = Arc::clone(&self.verifier);
        thread::Builder::new()
            .name("truthal-verify".to_string())
            .spawn(move || {
                let _guard = guard;
                let result = verifier.evaluate(&evidence, high_impact);
                let _ = tx.send(result);
            })
            .map_err(|e| GateError::Evaluation(format!("cannot spawn verifier: {e}")))?;

        match rx.recv_timeout(Duration::from_millis(deadline_ms)) {
            Ok(Ok(result)) if result.is_finite() => Ok(result),
            Ok(Ok(_)) => Err(GateError::Evaluation(
                "verifier returned non-finite deltas".to_string(),
            )),
            Ok(Err(e)) => Err(e),
            Err(RecvTimeoutError::Timeout) => Err(GateError::EvaluationTimeout { deadline_ms }),
            Err(RecvTimeoutError::Disconnected) => {
                Err(GateError::Evaluation("verifier panicked".to_string()))
            }
        }
    }

    // ── Human review ──────────────────────────────────────────────

    /// Apply decisions positionally to the front of the approval queue.
    ///
    /// Every taken item consumes one decision. Items whose evidence was
    /// replaced, re-routed or removed since they were queued are logged
    /// as discarded and produce no outcome.
    pub fn resolve_batch(&self, decisions: &[bool]) -> Vec<ApprovalOutcome> {
        let mut state = self.state.write();
        let items = self.approvals.take_front(decisions.len());
        items
            .into_iter()
            .zip(decisions.iter().copied())
            .filter_map(|(item, approved)| match check_pending(&state, &item) {
                Ok(()) => Some(self.apply_decision(&mut state, item, approved)),
                Err(e) => {
                    self.discard_decision(&item, approved, &e);
                    None
                }
            })
            .collect()
    }

    /// Take the oldest pending item for individual review.
    pub fn pop_next_for_review(&self) -> Option<PendingApproval> {
        self.approvals.pop_next()
    }

    /// Record a decision on an item obtained from `pop_next_for_review`.
    ///
    /// Fails with `NotFound` for an unknown id and `StaleApproval` unless
    /// the item's generation is the one currently awaiting review.
    pub fn resolve_reviewed(
        &self,
        item: PendingApproval,
        approved: bool,
    ) -> GateResult<ApprovalOutcome> {
        let mut state = self.state.write();
        if let Err(e) = check_pending(&state, &item) {
            self.discard_decision(&item, approved, &e);
            return Err(e);
        }
        self.approvals.remove_evidence(&item.evidence_id);
        Ok(self.apply_decision(&mut state, item, approved))
    }

    fn apply_decision(
        &self,
        state: &mut EngineState,
        item: PendingApproval,
        approved: bool,
    ) -> ApprovalOutcome {
        let route = if approved {
            Route::AutoReleased
        } else {
            Route::Withheld
        };
        let released_answer = if approved {
            state
                .material_evidence_store
                .get(&item.evidence_id)
                .map(Evidence::release_text)
        } else {
            None
        };
        state.routes.insert(item.evidence_id.clone(), route);
        self.log.append(json!({
            "event": "approval_resolution",
            "evidence_id": item.evidence_id,
            "generation": item.generation,
            "approved": approved,
            "route": route.as_str(),
            "status": route.status().as_str(),
        }));
        log::info!(
            "Human decision on {}: {}",
            item.evidence_id,
            if approved { "approved" } else { "denied" }
        );
        ApprovalOutcome {
            evidence_id: item.evidence_id,
            approved,
            released_answer,
        }
    }

    fn discard_decision(&self, item: &PendingApproval, approved: bool, reason: &GateError) {
        self.log.append(json!({
            "event": "approval_discarded",
            "evidence_id": item.evidence_id,
            "generation": item.generation,
            "approved": approved,
            "reason": reason.to_string(),
        }));
        log::warn!("Decision on {} discarded: {reason}", item.evidence_id);
    }

    pub fn pending_approvals(&self) -> Vec<PendingApproval> {
        self.approvals.pending()
    }

    // ── Override control ──────────────────────────────────────────

    pub fn enable_override(&self, reason: &str, actor: &str) -> ControlResponse {
        let resp = self.overrides.enable_override(reason, actor);
        self.log_control("enable_override", actor, Some(reason), &resp);
        resp
    }

    pub fn disable_override(&self, actor: &str) -> ControlResponse {
        let resp = self.overrides.disable_override(actor);
        self.log_control("disable_override", actor, None, &resp);
        resp
    }

    pub fn engage_kill_switch(&self, actor: &str) -> ControlResponse {
        let resp = self.overrides.engage_kill_switch(actor);
        self.log_control("kill_switch", actor, None, &resp);
        resp
    }

    pub fn reset_override_budget(&self, actor: &str) -> ControlResponse {
        let resp = self.overrides.reset_budget(actor);
        self.log_control("reset_override_budget", actor, None, &resp);
        resp
    }

    pub fn overrides(&self) -> &OverrideController {
        &self.overrides
    }

    fn log_control(&self, action: &str, actor: &str, reason: Option<&str>, resp: &ControlResponse) {
        self.log.append(json!({
            "event": "override_control",
            "action": action,
            "actor": actor,
            "reason": reason,
            "status": resp.status,
            "message": resp.message,
        }));
    }

    // ── Conservative mode ─────────────────────────────────────────

    /// Scheduler signal: one more consensus window closed without
    /// agreement. Returns the new count.
    pub fn record_cycle_without_consensus(&self) -> u32 {
        let mut state = self.state.write();
        state.cycles_without_consensus += 1;
        let cycles = state.cycles_without_consensus;
        self.log.append(json!({
            "event": "consensus_cycle",
            "cycles_without_consensus": cycles,
            "conservative_mode": self.constitution.triggers_conservative_mode(cycles),
        }));
        if self.constitution.triggers_conservative_mode(cycles) {
            log::warn!("{cycles} cycles without consensus: conservative mode active");
        }
        cycles
    }

    /// Operator reset of the consensus counter. Never automatic.
    pub fn reset_consensus_cycles(&self, actor: &str) -> ControlResponse {
        let mut state = self.state.write();
        let previous = state.cycles_without_consensus;
        state.cycles_without_consensus = 0;
        let resp = ControlResponse::success(format!(
            "Consensus cycle counter reset from {previous}"
        ));
        self.log.append(json!({
            "event": "consensus_reset",
            "actor": actor,
            "previous": previous,
        }));
        log::info!("Consensus cycles reset by {actor} (was {previous})");
        resp
    }

    // ── Audit ─────────────────────────────────────────────────────

    /// Read-only snapshot of the audit chain.
    pub fn get_audit_log(&self) -> Vec<LogEntry> {
        self.log.entries()
    }

    pub fn audit_entries_for(&self, evidence_id: &str) -> Vec<LogEntry> {
        self.log.entries_for(evidence_id)
    }

    pub fn last_audit_hash(&self) -> String {
        self.log.last_hash()
    }

    /// Verify the chain. On mismatch, halt automatic release until an
    /// operator calls [`Self::acknowledge_log_corruption`].
    pub fn verify_audit_chain(&self) -> bool {
        match self.log.verify() {
            Ok(()) => true,
            Err(e) => {
                self.audit_halted.store(true, Ordering::SeqCst);
                log::error!(">>> {e}: AUTOMATIC DISSEMINATION HALTED <<<");
                false
            }
        }
    }

    pub fn audit_halted(&self) -> bool {
        self.audit_halted.load(Ordering::SeqCst)
    }

    pub fn acknowledge_log_corruption(&self, actor: &str) -> ControlResponse {
        if !self.audit_halted.swap(false, Ordering::SeqCst) {
            return ControlResponse::error("No audit corruption recorded");
        }
        self.log.append(json!({
            "event": "audit_acknowledged",
            "actor": actor,
        }));
        log::warn!("Audit corruption acknowledged by {actor}; automatic release resumed");
        ControlResponse::success("Audit halt cleared")
    }

    // ── Introspection ─────────────────────────────────────────────

    pub fn get_system_state(&self) -> SystemState {
        let state = self.state.read();
        let audit_halted = self.audit_halted.load(Ordering::SeqCst);
        SystemState {
            truth_capacity: state.truth_capacity,
            truth_quality: state.truth_quality,
            material_evidence_count: state.material_evidence_store.len(),
            cycles_without_consensus: state.cycles_without_consensus,
            conservative_mode: audit_halted
                || self.constitution.is_catastrophic(state.truth_capacity)
                || self
                    .constitution
                    .triggers_conservative_mode(state.cycles_without_consensus),
            audit_halted,
            pending_approvals: self.approvals.len(),
        }
    }

    pub fn route_of(&self, id: &str) -> Option<Route> {
        self.state.read().routes.get(id).copied()
    }

    pub fn evidence(&self, id: &str) -> Option<Evidence> {
        self.state.read().material_evidence_store.get(id).cloned()
    }

    pub fn triage_len(&self) -> usize {
        self.triage.len()
    }

    pub fn constitution(&self) -> &Constitution {
        &self.constitution
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Serializable snapshot of metrics and routes, for external
    /// persistence of verifier state.
    pub fn snapshot(&self) -> Value {
        let state = self.state.read();
        let mut routes: Vec<(&String, &Route)> = state.routes.iter().collect();
        routes.sort_by(|a, b| a.0.cmp(b.0));
        json!({
            "truth_capacity": state.truth_capacity,
            "truth_quality": state.truth_quality,
            "cycles_without_consensus": state.cycles_without_consensus,
            "routes": routes
                .into_iter()
                .map(|(id, r)| (id.clone(), json!(r)))
                .collect::<serde_json::Map<String, Value>>(),
            "overrides": {
                "used": self.overrides.used(),
                "total": self.overrides.total(),
                "kill_switch_engaged": self.overrides.kill_switch_engaged(),
                "available": self.overrides.is_available(),
            },
            "audit_head": self.log.last_hash(),
        })
    }
}

/// The item is the stored version of its evidence and still awaits review.
fn check_pending(state: &EngineState, item: &PendingApproval) -> GateResult<()> {
    let id = &item.evidence_id;
    if !state.material_evidence_store.contains_key(id) {
        return Err(GateError::NotFound(id.clone()));
    }
    let awaiting = state.routes.get(id) == Some(&Route::PendingHumanApproval);
    if !awaiting || state.generations.get(id) != Some(&item.generation) {
        return Err(GateError::StaleApproval(format!(
            "{id} generation {} is not awaiting review",
            item.generation
        )));
    }
    Ok(())
}

fn already_routed(id: &str, route: Option<&Route>) -> Option<Dissemination> {
    let route = *route?;
    route.is_routed().then(|| Dissemination {
        evidence_id: id.to_string(),
        status: route.status(),
        detail: format!("already routed: {}", route.as_str()),
        partial_disclosure: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification::{ExternalVerifier, StaticVerifier};
    use truthal_types::{DisseminationStatus, ReviewSummary};

    fn engine() -> DisseminationEngine {
        DisseminationEngine::new(GateConfig::default(), Arc::new(StaticVerifier::neutral()))
            .unwrap()
    }

    fn engine_with(verifier: impl Verifier + 'static, config: GateConfig) -> DisseminationEngine {
        DisseminationEngine::new(config, Arc::new(verifier)).unwrap()
    }

    #[test]
    fn test_low_impact_released() {
        let e = engine();
        e.add_evidence("e1", Evidence::new("", "minor").with_affected_agents(500));
        let d = e.disseminate("e1").unwrap();
        assert_eq!(d.status, DisseminationStatus::Disseminated);
        assert_eq!(e.route_of("e1"), Some(Route::AutoReleased));
        assert_eq!(e.get_audit_log().len(), 1);
    }

    #[test]
    fn test_not_found() {
        let e = engine();
        assert_eq!(
            e.disseminate("missing"),
            Err(GateError::NotFound("missing".into()))
        );
        assert!(e.get_audit_log().is_empty());
    }

    #[test]
    fn test_high_impact_requires_approval() {
        let e = engine();
        e.add_evidence("big", Evidence::new("", "x").with_affected_agents(2_000_000));
        let d = e.disseminate("big").unwrap();
        assert_eq!(d.status, DisseminationStatus::ApprovalRequired);
        assert_eq!(d.detail, "high_impact");
        assert_eq!(e.pending_approvals().len(), 1);
    }

    #[test]
    fn test_irreversible_requires_approval() {
        let e = engine();
        e.add_evidence("irr", Evidence::new("", "x").with_irreversible(true));
        assert!(!e.disseminate("irr").unwrap().is_released());
    }

    #[test]
    fn test_override_must_be_enabled() {
        let e = engine();
        e.add_evidence("big", Evidence::new("", "x").with_affected_agents(5_000_000));
        let d = e.disseminate_with_override("big", "alice").unwrap();
        assert_eq!(d.status, DisseminationStatus::ApprovalRequired);
        assert_eq!(e.overrides().used(), 0);
        let entry = &e.audit_entries_for("big")[0];
        assert!(entry.data["override_declined"]
            .as_str()
            .unwrap()
            .contains("override exhausted"));
    }

    #[test]
    fn test_enabled_override_releases_and_spends() {
        let e = engine();
        assert!(e.enable_override("public safety bulletin", "alice").is_success());
        e.add_evidence("big", Evidence::new("", "x").with_affected_agents(5_000_000));
        let d = e.disseminate_with_override("big", "alice").unwrap();
        assert_eq!(d.status, DisseminationStatus::Disseminated);
        assert_eq!(d.detail, "override");
        assert_eq!(e.overrides().used(), 1);
        let entry = &e.audit_entries_for("big")[0];
        assert_eq!(entry.data["override_used"], true);
    }

    #[test]
    fn test_override_not_spent_on_low_impact() {
        let e = engine();
        e.enable_override("drill", "alice");
        e.add_evidence("small", Evidence::new("", "x"));
        assert!(e.disseminate_with_override("small", "alice").unwrap().is_released());
        assert_eq!(e.overrides().used(), 0);
    }

    #[test]
    fn test_conservative_flag_routes_to_human() {
        let e = engine_with(
            StaticVerifier::new(EvaluationResult::new(0.0, 0.0, true)),
            GateConfig::default(),
        );
        e.add_evidence("c", Evidence::new("", "x"));
        let d = e.disseminate("c").unwrap();
        assert_eq!(d.detail, "conservative_mode");
        assert!(d.partial_disclosure.is_none());
    }

    #[test]
    fn test_persistent_conservative_mode_attaches_partial_disclosure() {
        let e = engine();
        for _ in 0..3 {
            e.record_cycle_without_consensus();
        }
        assert!(e.get_system_state().conservative_mode);
        e.add_evidence(
            "p",
            Evidence::new("", "full").with_non_sensitive(vec!["headline".into()]),
        );
        let d = e.disseminate("p").unwrap();
        assert_eq!(d.status, DisseminationStatus::ApprovalRequired);
        let pd = d.partial_disclosure.unwrap();
        assert_eq!(pd.non_sensitive_evidence, vec!["headline".to_string()]);

        assert!(e.reset_consensus_cycles("ops").is_success());
        e.add_evidence("q", Evidence::new("", "x"));
        assert!(e.disseminate("q").unwrap().is_released());
    }

    #[test]
    fn test_metrics_update_and_clamp() {
        let e = engine_with(
            StaticVerifier::new(EvaluationResult::new(0.5, 0.3, false)),
            GateConfig::default(),
        );
        e.add_evidence("m", Evidence::new("", "x"));
        e.disseminate("m").unwrap();
        let s = e.get_system_state();
        assert_eq!(s.truth_quality, 1.0);
        // positive capacity deltas never raise capacity
        assert!((s.truth_capacity - 0.99).abs() < 1e-12);
    }

    #[test]
    fn test_evaluation_error_falls_back() {
        let e = engine_with(
            ExternalVerifier::new(|_, _| Err(GateError::Evaluation("upstream 503".into()))),
            GateConfig::default(),
        );
        e.add_evidence("f", Evidence::new("", "x"));
        let d = e.disseminate("f").unwrap();
        assert_eq!(d.status, DisseminationStatus::ApprovalRequired);
        let entry = &e.audit_entries_for("f")[0];
        assert!(entry.data["evaluation_failure"]
            .as_str()
            .unwrap()
            .contains("upstream 503"));
    }

    #[test]
    fn test_panicking_verifier_falls_back() {
        let e = engine_with(
            ExternalVerifier::new(|_, _| panic!("evaluator crashed")),
            GateConfig::default(),
        );
        e.add_evidence("p", Evidence::new("", "x"));
        let d = e.disseminate("p").unwrap();
        assert_eq!(d.status, DisseminationStatus::ApprovalRequired);
    }

    #[test]
    fn test_non_finite_result_falls_back() {
        let e = engine_with(
            StaticVerifier::new(EvaluationResult::new(f64::NAN, 0.0, false)),
            GateConfig::default(),
        );
        e.add_evidence("n", Evidence::new("", "x"));
        assert!(!e.disseminate("n").unwrap().is_released());
        assert_eq!(e.get_system_state().truth_quality, 1.0);
    }

    #[test]
    fn test_timeout_falls_back() {
        let config = GateConfig {
            evaluation_deadline_ms: 20,
            ..Default::default()
        };
        let e = engine_with(
            ExternalVerifier::new(|_, _| {
                thread::sleep(Duration::from_millis(300));
                Ok(EvaluationResult::new(-0.5, -0.5, false))
            }),
            config,
        );
        e.add_evidence("slow", Evidence::new("", "x"));
        let d = e.disseminate("slow").unwrap();
        assert_eq!(d.status, DisseminationStatus::ApprovalRequired);
        let entry = &e.audit_entries_for("slow")[0];
        assert!(entry.data["evaluation_failure"]
            .as_str()
            .unwrap()
            .contains("timeout"));
        // the abandoned result is never applied
        let s = e.get_system_state();
        assert_eq!(s.truth_quality, 1.0);
        assert!((s.truth_capacity - 0.99).abs() < 1e-12);
    }

    #[test]
    fn test_second_disseminate_is_idempotent() {
        let e = engine();
        e.add_evidence("e", Evidence::new("", "x"));
        e.disseminate("e").unwrap();
        let again = e.disseminate("e").unwrap();
        assert!(again.is_released());
        assert!(again.detail.starts_with("already routed"));
        assert_eq!(e.get_audit_log().len(), 1);
        assert!((e.get_system_state().truth_capacity - 0.99).abs() < 1e-12);
    }

    #[test]
    fn test_readd_resets_route() {
        let e = engine();
        e.add_evidence("e", Evidence::new("", "v1"));
        e.disseminate("e").unwrap();
        e.add_evidence("e", Evidence::new("", "v2"));
        assert_eq!(e.route_of("e"), Some(Route::Received));
        assert_eq!(e.get_system_state().material_evidence_count, 1);
        assert_eq!(e.evidence("e").unwrap().release_text(), "v2");
    }

    #[test]
    fn test_resolve_batch_approve_and_deny() {
        let e = engine();
        e.add_evidence("a", Evidence::new("", "alpha").with_irreversible(true));
        e.add_evidence("b", Evidence::new("", "beta").with_irreversible(true));
        e.disseminate("a").unwrap();
        e.disseminate("b").unwrap();

        let outcomes = e.resolve_batch(&[true, false, true]);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].released_answer.as_deref(), Some("alpha"));
        assert!(!outcomes[1].approved);
        assert!(outcomes[1].released_answer.is_none());
        assert_eq!(e.route_of("a"), Some(Route::AutoReleased));
        assert_eq!(e.route_of("b"), Some(Route::Withheld));
        assert_eq!(
            e.disseminate("b").unwrap().status,
            DisseminationStatus::Withheld
        );
        assert!(e.pending_approvals().is_empty());
    }

    #[test]
    fn test_pop_and_resolve_reviewed() {
        let e = engine();
        e.add_evidence("r", Evidence::new("", "x").with_irreversible(true));
        e.disseminate("r").unwrap();
        let item = e.pop_next_for_review().unwrap();
        assert!(e.pending_approvals().is_empty());
        let outcome = e.resolve_reviewed(item, false).unwrap();
        assert!(!outcome.approved);
        assert_eq!(e.audit_entries_for("r").len(), 2);
    }

    #[test]
    fn test_replacing_evidence_drops_its_pending_review() {
        let e = engine();
        e.add_evidence("x", Evidence::new("", "v1").with_affected_agents(2_000_000));
        assert_eq!(
            e.disseminate("x").unwrap().status,
            DisseminationStatus::ApprovalRequired
        );
        e.add_evidence("x", Evidence::new("", "v2 never evaluated").with_irreversible(true));
        assert!(e.pending_approvals().is_empty());

        assert!(e.resolve_batch(&[true]).is_empty());
        assert_eq!(e.route_of("x"), Some(Route::Received));

        let d = e.disseminate("x").unwrap();
        assert_eq!(d.status, DisseminationStatus::ApprovalRequired);
        assert_eq!(d.detail, "high_impact");
        let outcomes = e.resolve_batch(&[true]);
        assert_eq!(outcomes[0].released_answer.as_deref(), Some("v2 never evaluated"));
    }

    #[test]
    fn test_decision_on_superseded_generation_is_discarded() {
        let e = engine();
        e.add_evidence("x", Evidence::new("", "v1").with_irreversible(true));
        e.disseminate("x").unwrap();
        let old = e.pop_next_for_review().unwrap();

        e.add_evidence("x", Evidence::new("", "v2").with_irreversible(true));
        e.disseminate("x").unwrap();
        let current = e.pending_approvals()[0].clone();
        assert!(current.generation > old.generation);

        let err = e.resolve_reviewed(old, true).unwrap_err();
        assert!(matches!(err, GateError::StaleApproval(_)));
        assert_eq!(e.route_of("x"), Some(Route::PendingHumanApproval));
        assert_eq!(e.pending_approvals().len(), 1);
        let last = e.get_audit_log().pop().unwrap();
        assert_eq!(last.data["event"], "approval_discarded");

        let outcome = e.resolve_reviewed(current, true).unwrap();
        assert_eq!(outcome.released_answer.as_deref(), Some("v2"));
        assert!(e.pending_approvals().is_empty());
    }

    #[test]
    fn test_fabricated_review_items_rejected() {
        let e = engine();
        e.add_evidence("y", Evidence::new("", "secret").with_affected_agents(9_000_000));
        let generation = e.state.read().generations["y"];
        let fabricated = |id: &str, generation: u64| PendingApproval {
            evidence_id: id.to_string(),
            generation,
            question: String::new(),
            summary: ReviewSummary {
                neutral_frame: String::new(),
                adversarial_frame: String::new(),
            },
            evaluation: EvaluationResult::default(),
        };

        let err = e.resolve_reviewed(fabricated("y", generation), true).unwrap_err();
        assert!(matches!(err, GateError::StaleApproval(_)));
        assert_eq!(e.route_of("y"), Some(Route::Received));
        assert_ne!(
            e.disseminate("y").unwrap().status,
            DisseminationStatus::Disseminated
        );

        let err = e.resolve_reviewed(fabricated("ghost", 1), true).unwrap_err();
        assert_eq!(err, GateError::NotFound("ghost".into()));
        assert_eq!(e.route_of("ghost"), None);
    }

    #[test]
    fn test_pending_item_carries_review_summary() {
        let e = engine();
        e.add_evidence("h", Evidence::new("", "x").with_affected_agents(3_000_000));
        e.disseminate("h").unwrap();
        let item = &e.pending_approvals()[0];
        assert!(item.summary.neutral_frame.contains("held for high_impact"));
        assert!(item.summary.adversarial_frame.contains("3000000 agents"));
    }

    #[test]
    fn test_saturated_verifier_fails_fast() {
        let (release_tx, release_rx) = crossbeam_channel::unbounded::<()>();
        let config = GateConfig {
            evaluation_deadline_ms: 20,
            max_pending_evaluations: 1,
            ..Default::default()
        };
        let e = engine_with(
            ExternalVerifier::new(move |ev, _| {
                if ev.id == "hang" {
                    let _ = release_rx.recv();
                }
                Ok(EvaluationResult::default())
            }),
            config,
        );

        e.add_evidence("hang", Evidence::new("", "x"));
        e.disseminate("hang").unwrap();
        assert_eq!(e.in_flight.load(Ordering::SeqCst), 1);

        e.add_evidence("next", Evidence::new("", "y"));
        assert!(!e.disseminate("next").unwrap().is_released());
        let entry = &e.audit_entries_for("next")[0];
        assert!(entry.data["evaluation_failure"]
            .as_str()
            .unwrap()
            .contains("saturated"));

        release_tx.send(()).unwrap();
        for _ in 0..200 {
            if e.in_flight.load(Ordering::SeqCst) == 0 {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(e.in_flight.load(Ordering::SeqCst), 0);
        e.add_evidence("after", Evidence::new("", "z"));
        assert!(e.disseminate("after").unwrap().is_released());
    }

    #[test]
    fn test_control_actions_are_logged() {
        let e = engine();
        e.enable_override("incident 42", "alice");
        e.disable_override("alice");
        e.engage_kill_switch("bob");
        let resp = e.enable_override("again", "alice");
        assert!(!resp.is_success());
        let log = e.get_audit_log();
        assert_eq!(log.len(), 4);
        assert_eq!(log[2].data["action"], "kill_switch");
        assert_eq!(log[2].data["actor"], "bob");
        assert_eq!(log[3].data["status"], "error");
        assert!(!e.overrides().can_override());
    }

    #[test]
    fn test_triage_batch_intake() {
        let e = engine();
        for i in 0..7 {
            e.submit(Evidence::new("", format!("noise {i}")).with_priority_factors(0.1, 0.1));
        }
        e.submit(Evidence::new("urgent", "x").with_priority_factors(1.0, 1.0));
        let ids = e.process_triage_batch();
        assert_eq!(ids.len(), 5);
        assert_eq!(ids[0], "urgent");
        assert!(ids[1].starts_with("evidence_"));
        assert_eq!(e.triage_len(), 3);
        assert_eq!(e.get_system_state().material_evidence_count, 5);
    }

    #[test]
    fn test_acknowledge_without_corruption_is_error() {
        let e = engine();
        assert!(!e.acknowledge_log_corruption("ops").is_success());
    }

    #[test]
    fn test_snapshot_contents() {
        let e = engine();
        e.add_evidence("s", Evidence::new("", "x"));
        e.disseminate("s").unwrap();
        let snap = e.snapshot();
        assert_eq!(snap["routes"]["s"], "auto_released");
        assert_eq!(snap["overrides"]["total"], 12);
        assert_eq!(snap["overrides"]["available"], false);
        assert_eq!(snap["audit_head"], e.last_audit_hash());
    }
}
