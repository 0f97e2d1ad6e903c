use std::env;
use std::time::Duration;

/// Connection settings for a model backend.
///
/// Reads `STEPGRAPH_MODEL_URL`, `STEPGRAPH_MODEL` and
/// `STEPGRAPH_TIMEOUT_SECS`, falling back to a local Ollama server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// Base URL of the backend, without a trailing slash.
    pub base_url: String,
    /// Model name passed with every request.
    pub model: String,
    /// Upper bound on a single request.
    pub timeout: Duration,
}

impl SourceConfig {
    /// The default backend URL used when no environment variable is set.
    pub const DEFAULT_URL: &str = "http://localhost:11434";

    /// The default model name.
    pub const DEFAULT_MODEL: &str = "llama3.1";

    /// The default request timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    /// Build a config from the environment.
    ///
    /// Unset variables, and a timeout that is not a whole number of seconds,
    /// fall back to the compile-time defaults.
    pub fn from_env() -> Self {
        let base_url =
            env::var("STEPGRAPH_MODEL_URL").unwrap_or_else(|_| Self::DEFAULT_URL.to_owned());
        let model = env::var("STEPGRAPH_MODEL").unwrap_or_else(|_| Self::DEFAULT_MODEL.to_owned());
        let timeout_secs = env::var("STEPGRAPH_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(Self::DEFAULT_TIMEOUT_SECS);
        Self::new(base_url, model).with_timeout(Duration::from_secs(timeout_secs))
    }

    /// Build a config from explicit values (useful for tests and CLI flags).
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            model: model.into(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Join `path` onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
