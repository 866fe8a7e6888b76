// ─────────────────────────────────────────────────────────────────────
// Truthal — Override Budget + Kill Switch
// ─────────────────────────────────────────────────────────────────────
//! Budgeted manual bypass of automatic gating.
//!
//! # Invariants
//!
//! 1. **The kill switch is terminal**: once engaged no override can be
//!    enabled, consumed or replenished for the lifetime of the process.
//!    The flag is an `AtomicBool` with `SeqCst` ordering, checked again
//!    under the budget lock, so no consume can slip past an engage.
//!
//! 2. **The budget never overdraws**: `used <= total` at all times and a
//!    refused consume leaves `used` untouched.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use truthal_types::ControlResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideActionKind {
    Enable,
    Disable,
    Consume,
    KillSwitch,
    ResetBudget,
}

/// One entry in the controller's action history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideAction {
    pub action: OverrideActionKind,
    pub actor: String,
    pub reason: Option<String>,
    pub accepted: bool,
}

#[derive(Debug)]
struct Budget {
    used: u32,
    total: u32,
    enabled: bool,
    history: Vec<OverrideAction>,
}

pub struct OverrideController {
    kill_switch: AtomicBool,
    budget: Mutex<Budget>,
}

impl OverrideController {
    pub fn new(total: u32) -> Self {
        Self {
            kill_switch: AtomicBool::new(false),
            budget: Mutex::new(Budget {
                used: 0,
                total,
                enabled: false,
                history: Vec::new(),
            }),
        }
    }

    pub fn kill_switch_engaged(&self) -> bool {
        self.kill_switch.load(Ordering::SeqCst)
    }

    /// Budget remains and the kill switch is off.
    pub fn can_override(&self) -> bool {
        let budget = self.budget.lock();
        !self.kill_switch_engaged() && budget.used < budget.total
    }

    /// An operator has enabled overrides and one could be consumed now.
    pub fn is_available(&self) -> bool {
        let budget = self.budget.lock();
        !self.kill_switch_engaged() && budget.enabled && budget.used < budget.total
    }

    /// Spend one unit. Returns false, changing nothing, if refused.
    pub fn consume_override(&self) -> bool {
        let mut budget = self.budget.lock();
        if self.kill_switch_engaged() || budget.used >= budget.total {
            log::warn!(
                "Override refused: used {}/{} kill_switch={}",
                budget.used,
                budget.total,
                self.kill_switch_engaged()
            );
            return false;
        }
        budget.used += 1;
        log::info!("Override consumed: {}/{}", budget.used, budget.total);
        true
    }

    /// Consume one unit only if an operator has enabled overrides.
    pub(crate) fn consume_enabled(&self, actor: &str) -> bool {
        let mut budget = self.budget.lock();
        let accepted =
            !self.kill_switch_engaged() && budget.enabled && budget.used < budget.total;
        if accepted {
            budget.used += 1;
        }
        budget.history.push(OverrideAction {
            action: OverrideActionKind::Consume,
            actor: actor.to_string(),
            reason: None,
            accepted,
        });
        accepted
    }

    pub fn enable_override(&self, reason: &str, actor: &str) -> ControlResponse {
        let mut budget = self.budget.lock();
        let blocked = self.kill_switch_engaged();
        budget.history.push(OverrideAction {
            action: OverrideActionKind::Enable,
            actor: actor.to_string(),
            reason: Some(reason.to_string()),
            accepted: !blocked,
        });
        if blocked {
            log::warn!("Override enable by {actor} blocked: kill switch engaged");
            return ControlResponse::error("Kill switch engaged; override blocked");
        }
        budget.enabled = true;
        log::info!("Override enabled by {actor}: {reason}");
        ControlResponse::success("Override enabled")
    }

    pub fn disable_override(&self, actor: &str) -> ControlResponse {
        let mut budget = self.budget.lock();
        budget.enabled = false;
        budget.history.push(OverrideAction {
            action: OverrideActionKind::Disable,
            actor: actor.to_string(),
            reason: None,
            accepted: true,
        });
        log::info!("Override disabled by {actor}");
        ControlResponse::success("Override disabled")
    }

    /// Permanently block all overrides.
    pub fn engage_kill_switch(&self, actor: &str) -> ControlResponse {
        let mut budget = self.budget.lock();
        self.kill_switch.store(true, Ordering::SeqCst);
        budget.enabled = false;
        budget.used = budget.total;
        budget.history.push(OverrideAction {
            action: OverrideActionKind::KillSwitch,
            actor: actor.to_string(),
            reason: None,
            accepted: true,
        });
        log::error!(">>> KILL SWITCH ENGAGED BY {actor}: OVERRIDES DISABLED <<<");
        ControlResponse::success("Kill switch engaged")
    }

    /// Replenish the budget. Refused once the kill switch is engaged.
    pub fn reset_budget(&self, actor: &str) -> ControlResponse {
        let mut budget = self.budget.lock();
        let blocked = self.kill_switch_engaged();
        budget.history.push(OverrideAction {
            action: OverrideActionKind::ResetBudget,
            actor: actor.to_string(),
            reason: None,
            accepted: !blocked,
        });
        if blocked {
            return ControlResponse::error("Kill switch engaged; budget reset blocked");
        }
        budget.used = 0;
        log::info!("Override budget reset by {actor}");
        ControlResponse::success("Override budget reset")
    }

    pub fn is_enabled(&self) -> bool {
        self.budget.lock().enabled
    }

    pub fn used(&self) -> u32 {
        self.budget.lock().used
    }

    pub fn total(&self) -> u32 {
        self.budget.lock().total
    }

    pub fn remaining(&self) -> u32 {
        let budget = self.budget.lock();
        budget.total - budget.used
    }

    pub fn history(&self) -> Vec<OverrideAction> {
        self.budget.lock().history.clone()
    }
}
