//! Plan data model: the action set, validated steps, and the assembled plan.
//!
//! [`Step`] is the internal, validated unit that flows through the graph
//! stages. [`PlanStep`] and [`TaskPlan`] are the caller-facing shapes and
//! serialize with camelCase field names.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// The closed set of file-system actions a step may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Write,
    Run,
    Delete,
}

impl Action {
    /// Every action, in the order they are listed to the model.
    pub const ALL: [Action; 4] = [Self::Read, Self::Write, Self::Run, Self::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Run => "run",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ActionParseError;

    /// Case-sensitive exact match; `"Read"` and `" read"` are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "run" => Ok(Self::Run),
            "delete" => Ok(Self::Delete),
            other => Err(ActionParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Action`] string.
#[derive(Debug, Clone)]
pub struct ActionParseError(pub String);

impl fmt::Display for ActionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid action: {:?}", self.0)
    }
}

impl std::error::Error for ActionParseError {}

// ---------------------------------------------------------------------------
// Internal step
// ---------------------------------------------------------------------------

/// Identity string for the step at 1-based input position `sequence`.
pub fn step_id(sequence: usize) -> String {
    format!("step_{sequence}")
}

/// A validated step, owned by the graph that is being built for one plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// 1-based position in the original (unsorted) model output.
    pub sequence: usize,
    /// The `step` number the model wrote for this record.
    pub declared_number: u64,
    /// Stable identity, always `step_<sequence>`.
    pub id: String,
    pub action: Action,
    pub description: String,
    pub path: String,
    /// Sequences of the steps this one depends on. Filled in by the resolver.
    pub depends_on: BTreeSet<usize>,
}

// ---------------------------------------------------------------------------
// Caller-facing plan
// ---------------------------------------------------------------------------

/// One step of an assembled plan, in final execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    /// 1-based position in the ordered plan.
    pub step_number: usize,
    /// Always equal to `step_number`; kept for callers that read this name.
    pub step_id: usize,
    /// Stable identity derived from the original input position.
    pub id: String,
    pub action: Action,
    pub description: String,
    pub path: String,
    /// Identities of the steps that must complete first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

/// A validated, topologically ordered plan for one user request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPlan {
    /// Plan identity, always prefixed with `plan-`.
    pub task_id: String,
    /// The user request exactly as it was supplied.
    pub user_request: String,
    pub steps: Vec<PlanStep>,
    pub generated_at: DateTime<Utc>,
    /// The model's explanation. Empty only when the model supplied none.
    pub reasoning: String,
}

impl TaskPlan {
    /// Look up a step by its identity.
    pub fn step(&self, id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Step identities in execution order.
    pub fn order(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }

    /// Total number of dependency edges in the plan.
    pub fn edge_count(&self) -> usize {
        self.steps.iter().map(|s| s.depends_on.len()).sum()
    }
}
