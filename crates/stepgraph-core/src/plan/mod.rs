//! Plan construction: response extraction, validation, ordering, assembly.

pub mod assemble;
pub mod error;
pub mod extract;
pub mod graph;
pub mod normalize;
pub mod pipeline;
pub mod prompt;
pub mod resolve;
pub mod types;

pub use assemble::{assemble_plan, next_plan_id};
pub use error::{EXCERPT_LIMIT, PlanError, ValidationError};
pub use extract::{DependencyRef, ExtractedResponse, RawStepRecord, extract_response};
pub use graph::{AcyclicGraph, StepGraph};
pub use normalize::{NormalizedRecord, normalize_record, validate_path};
pub use pipeline::{DEFAULT_MAX_STEPS, PlanPolicy, build_plan};
pub use prompt::{PromptContext, build_prompt};
pub use resolve::resolve_dependencies;
pub use types::{Action, ActionParseError, PlanStep, Step, TaskPlan, step_id};
