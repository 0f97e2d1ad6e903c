//! Model sources: the collaborators that turn a prompt into raw text.
//!
//! The planning core never talks to a model directly. [`crate::Planner`]
//! holds a `Box<dyn ModelSource>` and hands whatever text comes back to
//! [`crate::plan::build_plan`].

pub mod config;
pub mod ollama;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use config::SourceConfig;
pub use ollama::OllamaSource;

/// Failure talking to a model backend.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("model request timed out after {0:?}")]
    Timeout(Duration),

    #[error("could not reach model backend: {0}")]
    Transport(String),

    #[error("model backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model backend sent an invalid response: {0}")]
    InvalidResponse(String),
}

/// A backend that completes prompts.
///
/// Object-safe so it can be stored as `Box<dyn ModelSource>`.
#[async_trait]
pub trait ModelSource: Send + Sync {
    /// Short name for logs and the CLI (e.g. "ollama").
    fn name(&self) -> &str;

    /// Send `prompt` and return the model's raw text.
    async fn complete(&self, prompt: &str) -> Result<String, SourceError>;

    /// Whether the backend currently answers health checks.
    async fn is_available(&self) -> bool;
}

// Compile-time assertion: ModelSource must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn ModelSource) {}
};

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoSource;

    #[async_trait]
    impl ModelSource for EchoSource {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, prompt: &str) -> Result<String, SourceError> {
            Ok(prompt.to_owned())
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn source_is_usable_as_trait_object() {
        let source: Box<dyn ModelSource> = Box::new(EchoSource);
        assert_eq!(source.name(), "echo");
        assert!(source.is_available().await);
        assert_eq!(source.complete("hi").await.unwrap(), "hi");
    }

    #[test]
    fn status_error_message() {
        let err = SourceError::Status {
            status: 404,
            body: "model not found".to_owned(),
        };
        assert_eq!(err.to_string(), "model backend returned 404: model not found");
    }
}
