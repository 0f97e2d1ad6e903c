//! Core library for stepgraph.
//!
//! Turns a model's free-form answer to "how would you do this?" into a
//! validated, dependency-ordered list of file-system steps.

pub mod plan;
pub mod planner;
pub mod source;

pub use plan::{PlanError, PlanPolicy, TaskPlan, build_plan};
pub use planner::Planner;
pub use source::{ModelSource, OllamaSource, SourceConfig, SourceError};
