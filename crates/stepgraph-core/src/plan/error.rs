//! Error types for the planning pipeline.

use thiserror::Error;

use crate::source::SourceError;

/// Maximum number of bytes of response text quoted in a parse error.
pub const EXCERPT_LIMIT: usize = 200;

/// Any failure that aborts plan generation. No partial plan accompanies it.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("could not parse model response: {reason} (excerpt: {excerpt:?})")]
    Parse { reason: String, excerpt: String },

    #[error("invalid plan: {0}")]
    Validation(#[from] ValidationError),

    #[error("dependency cycle detected: {step} depends on {dependency}, which leads back to {step}")]
    Cycle { step: String, dependency: String },

    #[error("model response supplied no reasoning and reasoning is required")]
    MissingReasoning,

    #[error("model source failed: {0}")]
    Source(#[from] SourceError),
}

impl PlanError {
    /// Build a parse error, quoting at most [`EXCERPT_LIMIT`] bytes of `text`.
    pub fn parse(reason: impl Into<String>, text: &str) -> Self {
        Self::Parse {
            reason: reason.into(),
            excerpt: excerpt(text, EXCERPT_LIMIT).to_owned(),
        }
    }
}

/// A record failed normalization or dependency resolution.
///
/// `record` fields are 1-based positions in the input; `step` fields are the
/// step numbers the model declared.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("response contains no steps")]
    NoSteps,

    #[error("response contains {count} steps, more than the limit of {limit}")]
    TooManySteps { count: usize, limit: usize },

    #[error("record {record}: field {field:?} {reason}")]
    InvalidField {
        record: usize,
        field: &'static str,
        reason: String,
    },

    #[error("step {step}: invalid action {action:?} (expected read, write, run, or delete)")]
    InvalidAction { step: u64, action: String },

    #[error("step {step}: field {field:?} must not be empty")]
    EmptyField { step: u64, field: &'static str },

    #[error("step {step}: path {path:?} contains illegal character {character:?}")]
    IllegalPathCharacter {
        step: u64,
        path: String,
        character: char,
    },

    #[error("step {step}: path {path:?} must be relative")]
    AbsolutePath { step: u64, path: String },

    #[error("step {step}: path {path:?} escapes the workspace")]
    PathEscapesWorkspace { step: u64, path: String },

    #[error("step {step} ({id}) depends on unknown step {reference}")]
    UnknownDependency {
        step: u64,
        id: String,
        reference: String,
    },

    #[error("step {step} ({id}) depends on step number {reference}, which {count} records share")]
    AmbiguousDependency {
        step: u64,
        id: String,
        reference: u64,
        count: usize,
    },

    #[error("step {step} ({id}) depends on itself")]
    SelfDependency { step: u64, id: String },
}

/// Truncate `s` to at most `max_len` bytes on a char boundary.
pub fn excerpt(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
