//! Plan assembly: ordered steps plus metadata into a [`TaskPlan`].

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use super::error::PlanError;
use super::types::{PlanStep, Step, TaskPlan, step_id};

static PLAN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Allocate a process-unique plan identity: `plan-<unix millis>-<counter>`.
pub fn next_plan_id() -> String {
    let n = PLAN_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("plan-{}-{n}", Utc::now().timestamp_millis())
}

/// Wrap topologically ordered steps into the final plan.
///
/// `reasoning` is passed through untouched. When `require_reasoning` is set,
/// a missing or whitespace-only rationale is an error.
pub fn assemble_plan(
    user_request: &str,
    ordered: Vec<Step>,
    reasoning: Option<String>,
    require_reasoning: bool,
) -> Result<TaskPlan, PlanError> {
    if require_reasoning && reasoning.as_deref().is_none_or(|r| r.trim().is_empty()) {
        return Err(PlanError::MissingReasoning);
    }

    let steps = ordered
        .into_iter()
        .enumerate()
        .map(|(i, step)| PlanStep {
            step_number: i + 1,
            step_id: i + 1,
            id: step.id,
            action: step.action,
            description: step.description,
            path: step.path,
            // BTreeSet iteration is ascending by sequence.
            depends_on: step.depends_on.into_iter().map(step_id).collect(),
        })
        .collect();

    Ok(TaskPlan {
        task_id: next_plan_id(),
        user_request: user_request.to_owned(),
        steps,
        generated_at: Utc::now(),
        reasoning: reasoning.unwrap_or_default(),
    })
}
