// ─────────────────────────────────────────────────────────────────────
// Truthal — Evidence Model
// ─────────────────────────────────────────────────────────────────────
//! Evidence items as submitted by evaluators.
//!
//! Two independent notions of "importance" live on an item and must not
//! be merged:
//! - `affected_agents` / `irreversible` feed the high-impact policy check.
//! - `scope` / `irreversibility` are normalized factors used only for
//!   triage ordering.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::score::clamp_score;

fn default_factor() -> f64 {
    0.5
}

/// Output of a single evaluator branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchOutput {
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub response: String,
}

fn default_weight() -> f64 {
    1.0
}

impl BranchOutput {
    pub fn new(name: impl Into<String>, weight: f64, response: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weight,
            response: response.into(),
        }
    }
}

/// A unit of claim material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Store key. Overwritten with the intake id on `add_evidence`.
    #[serde(default)]
    pub id: String,
    /// Opaque payload.
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub branch_outputs: Vec<BranchOutput>,
    #[serde(default)]
    pub affected_agents: u64,
    #[serde(default)]
    pub irreversible: bool,
    /// Per-evaluator posterior deltas in [0, 1].
    #[serde(default)]
    pub belief_changes: Vec<f64>,
    /// Normalized population scope in [0, 1].
    #[serde(default = "default_factor")]
    pub scope: f64,
    /// Normalized irreversibility in [0, 1].
    #[serde(default = "default_factor")]
    pub irreversibility: f64,
    /// Fragments cleared for partial disclosure.
    #[serde(default)]
    pub non_sensitive: Vec<String>,
    /// Attached by triage; never set by callers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_score: Option<f64>,
}

impl Default for Evidence {
    fn default() -> Self {
        Self {
            id: String::new(),
            content: Value::Null,
            branch_outputs: Vec::new(),
            affected_agents: 0,
            irreversible: false,
            belief_changes: Vec::new(),
            scope: default_factor(),
            irreversibility: default_factor(),
            non_sensitive: Vec::new(),
            priority_score: None,
        }
    }
}

impl Evidence {
    pub fn new(id: impl Into<String>, content: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_affected_agents(mut self, affected_agents: u64) -> Self {
        self.affected_agents = affected_agents;
        self
    }

    pub fn with_irreversible(mut self, irreversible: bool) -> Self {
        self.irreversible = irreversible;
        self
    }

    pub fn with_belief_changes(mut self, belief_changes: Vec<f64>) -> Self {
        self.belief_changes = belief_changes;
        self
    }

    /// Set triage factors, clamped to [0, 1].
    pub fn with_priority_factors(mut self, scope: f64, irreversibility: f64) -> Self {
        self.scope = clamp_score(scope, 0.0, 1.0);
        self.irreversibility = clamp_score(irreversibility, 0.0, 1.0);
        self
    }

    pub fn with_branch(mut self, branch: BranchOutput) -> Self {
        self.branch_outputs.push(branch);
        self
    }

    pub fn with_non_sensitive(mut self, fragments: Vec<String>) -> Self {
        self.non_sensitive = fragments;
        self
    }

    /// Content rendered as release text. Strings are released verbatim,
    /// structured payloads as compact JSON.
    pub fn release_text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}
