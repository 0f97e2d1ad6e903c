//! The planning pipeline: raw model text to an ordered [`TaskPlan`].
//!
//! Pure and synchronous. The only shared state is the plan-id counter, so
//! concurrent calls need no locking.

use tracing::{debug, info};

use super::assemble::assemble_plan;
use super::error::{PlanError, ValidationError};
use super::extract::extract_response;
use super::graph::StepGraph;
use super::normalize::normalize_record;
use super::resolve::resolve_dependencies;
use super::types::TaskPlan;

/// Largest step count accepted by default.
pub const DEFAULT_MAX_STEPS: usize = 200;

/// Caller-selected rules applied while building a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanPolicy {
    /// Fail with [`PlanError::MissingReasoning`] when the model gave none.
    pub require_reasoning: bool,
    /// Reject responses with more records than this.
    pub max_steps: usize,
}

impl Default for PlanPolicy {
    fn default() -> Self {
        Self {
            require_reasoning: false,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/// Turn one model response into a validated, ordered plan.
///
/// Stages run in order and the first failure aborts the call.
pub fn build_plan(
    user_request: &str,
    response_text: &str,
    policy: &PlanPolicy,
) -> Result<TaskPlan, PlanError> {
    let extracted = extract_response(response_text)?;

    let count = extracted.records.len();
    if count == 0 {
        return Err(ValidationError::NoSteps.into());
    }
    if count > policy.max_steps {
        return Err(ValidationError::TooManySteps {
            count,
            limit: policy.max_steps,
        }
        .into());
    }

    let normalized = extracted
        .records
        .iter()
        .map(normalize_record)
        .collect::<Result<Vec<_>, _>>()?;
    debug!(steps = normalized.len(), "normalized step records");

    let steps = resolve_dependencies(normalized)?;
    let ordered = StepGraph::new(steps)?.check_acyclic()?.into_ordered_steps();

    let plan = assemble_plan(
        user_request,
        ordered,
        extracted.reasoning,
        policy.require_reasoning,
    )?;

    info!(
        task_id = %plan.task_id,
        steps = plan.steps.len(),
        edges = plan.edge_count(),
        "assembled plan"
    );
    Ok(plan)
}
