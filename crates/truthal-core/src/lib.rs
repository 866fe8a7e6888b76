// ─────────────────────────────────────────────────────────────────────
// Truthal — Dissemination Gate Core
// (C) 2026 Truthal Contributors. All rights reserved.
// License: GNU AGPL v3
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Policy engine, triage, human approval gate, override budget, and
//! tamper-evident audit log for gating the release of evaluator claims.
//!
//! # Safety Invariants
//!
//! 1. **High impact never auto-releases**: evidence reaching a million
//!    agents, or flagged irreversible, is released only through a
//!    consumed override or a recorded human approval.
//!
//! 2. **The kill switch is terminal**: once engaged, no override can be
//!    enabled, consumed or replenished for the life of the process.
//!
//! 3. **Failures are conservative**: a verifier that times out, panics,
//!    errors, or returns NaN/Inf sends the item to human review. Its
//!    result, if it arrives late, is discarded.
//!
//! 4. **Every decision is chained**: each terminal transition appends
//!    exactly one entry to the hash-chained log. A chain that fails
//!    verification halts automatic release until acknowledged.

pub mod approval;
pub mod constitution;
pub mod engine;
pub mod ledger;
pub mod overrides;
pub mod sink;
pub mod triage;
pub mod verification;

pub use approval::{review_summary, ApprovalGate};
pub use constitution::Constitution;
pub use engine::DisseminationEngine;
pub use ledger::{chain_hash, verify_entries, TamperEvidentLog};
pub use overrides::{OverrideAction, OverrideActionKind, OverrideController};
pub use sink::{AuditSink, MemorySink};
pub use triage::TriageQueue;
pub use verification::{BranchAgreementVerifier, ExternalVerifier, StaticVerifier, Verifier};
