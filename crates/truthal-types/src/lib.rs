// ─────────────────────────────────────────────────────────────────────
// Truthal — Dissemination Gate Types
// (C) 2026 Truthal Contributors. All rights reserved.
// License: GNU AGPL v3
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Data model, configuration, and error hierarchy for the Truthal
//! dissemination gate.

pub mod audit;
pub mod config;
pub mod decision;
pub mod error;
pub mod evidence;
pub mod score;

pub use audit::{LogEntry, GENESIS_HASH};
pub use config::GateConfig;
pub use decision::{
    ApprovalOutcome, ControlResponse, ControlStatus, Dissemination, DisseminationStatus,
    PartialDisclosure, PendingApproval, ReviewSummary, Route, SystemState,
};
pub use error::{GateError, GateResult};
pub use evidence::{BranchOutput, Evidence};
pub use score::{clamp_score, EvaluationResult};
