//! Ties a model source to the planning pipeline.

use tracing::{info, warn};

use crate::plan::{PlanError, PlanPolicy, PromptContext, TaskPlan, build_plan, build_prompt};
use crate::source::ModelSource;

/// Generates plans by prompting a [`ModelSource`] and validating its answer.
pub struct Planner {
    source: Box<dyn ModelSource>,
    policy: PlanPolicy,
    workspace: Option<String>,
}

impl Planner {
    pub fn new(source: Box<dyn ModelSource>, policy: PlanPolicy) -> Self {
        Self {
            source,
            policy,
            workspace: None,
        }
    }

    /// Tell the model which directory its relative paths refer to.
    pub fn with_workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    pub fn policy(&self) -> &PlanPolicy {
        &self.policy
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// The prompt [`Self::generate_plan`] would send for `request`.
    pub fn prompt_for(&self, request: &str) -> String {
        build_prompt(&PromptContext {
            request: request.to_owned(),
            workspace: self.workspace.clone(),
            max_steps: self.policy.max_steps,
            require_reasoning: self.policy.require_reasoning,
        })
    }

    pub async fn is_available(&self) -> bool {
        self.source.is_available().await
    }

    /// Prompt the source and turn its response into a plan.
    ///
    /// A source failure is returned before any parsing happens.
    pub async fn generate_plan(&self, request: &str) -> Result<TaskPlan, PlanError> {
        let prompt = self.prompt_for(request);
        info!(source = self.source.name(), "requesting plan");

        let response = self.source.complete(&prompt).await.map_err(|e| {
            warn!(source = self.source.name(), error = %e, "model source failed");
            PlanError::Source(e)
        })?;

        build_plan(request, &response, &self.policy).inspect_err(|e| {
            warn!(error = %e, "rejected model response");
        })
    }
}
