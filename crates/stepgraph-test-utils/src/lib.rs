//! Shared test utilities for stepgraph tests.
//!
//! Three kinds of helpers:
//! - **Fixtures**: JSON builders for model responses (`record`, `chain`,
//!   `diamond`, `independent`).
//! - **[`ScriptedSource`]**: an in-process [`ModelSource`] that replays canned
//!   responses and records every prompt it receives.
//! - **[`FakeBackend`]**: an axum server on a random local port that speaks
//!   the Ollama `api/generate` and `api/tags` endpoints.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use stepgraph_core::source::{ModelSource, SourceError};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// One raw step record. `dependsOn` is omitted when `depends_on` is empty.
pub fn record(step: u64, action: &str, path: &str, depends_on: &[u64]) -> Value {
    let mut value = json!({
        "step": step,
        "action": action,
        "description": format!("{action} {path}"),
        "path": path,
    });
    if !depends_on.is_empty() {
        value["dependsOn"] = json!(depends_on);
    }
    value
}

/// `n` steps where each one depends on the step before it.
pub fn chain(n: u64) -> Vec<Value> {
    (1..=n)
        .map(|i| {
            let deps: Vec<u64> = if i == 1 { vec![] } else { vec![i - 1] };
            record(i, "write", &format!("src/part{i}.rs"), &deps)
        })
        .collect()
}

/// Step 1 first, steps 2 and 3 both after it, step 4 after both.
pub fn diamond() -> Vec<Value> {
    vec![
        record(1, "read", "Cargo.toml", &[]),
        record(2, "write", "src/a.rs", &[1]),
        record(3, "write", "src/b.rs", &[1]),
        record(4, "run", "tests", &[2, 3]),
    ]
}

/// `n` steps with no dependencies at all.
pub fn independent(n: u64) -> Vec<Value> {
    (1..=n)
        .map(|i| record(i, "read", &format!("docs/page{i}.md"), &[]))
        .collect()
}

/// Render records as a bare JSON array, the simplest response shape.
pub fn response(records: &[Value]) -> String {
    Value::Array(records.to_vec()).to_string()
}

/// Render records inside a `{"reasoning": ..., "steps": [...]}` wrapper.
pub fn wrapped_response(reasoning: &str, records: &[Value]) -> String {
    json!({"reasoning": reasoning, "steps": records}).to_string()
}

// ---------------------------------------------------------------------------
// Scripted source
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Script {
    replies: VecDeque<Result<String, SourceError>>,
    prompts: Vec<String>,
    unavailable: bool,
}

/// A [`ModelSource`] that answers from a script.
///
/// Clones share the same script, so a test can keep one handle to inspect
/// prompts after boxing another into a planner. An exhausted script answers
/// with [`SourceError::InvalidResponse`].
#[derive(Clone, Default)]
pub struct ScriptedSource {
    inner: Arc<Mutex<Script>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful completion.
    pub fn respond(self, text: impl Into<String>) -> Self {
        self.lock().replies.push_back(Ok(text.into()));
        self
    }

    /// Queue a failed completion.
    pub fn fail(self, error: SourceError) -> Self {
        self.lock().replies.push_back(Err(error));
        self
    }

    /// Report the backend as down in health checks.
    pub fn unavailable(self) -> Self {
        self.lock().unavailable = true;
        self
    }

    /// Every prompt received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.lock().prompts.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.inner.lock().expect("scripted source mutex poisoned")
    }
}

#[async_trait]
impl ModelSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String, SourceError> {
        let mut script = self.lock();
        script.prompts.push(prompt.to_owned());
        script
            .replies
            .pop_front()
            .unwrap_or_else(|| Err(SourceError::InvalidResponse("script exhausted".to_owned())))
    }

    async fn is_available(&self) -> bool {
        !self.lock().unavailable
    }
}

// ---------------------------------------------------------------------------
// Fake HTTP backend
// ---------------------------------------------------------------------------

/// How the fake backend answers `POST /api/generate`.
#[derive(Debug, Clone)]
pub enum FakeReply {
    /// 200 with `{"response": text}`.
    Text(String),
    /// The given status code and plain-text body.
    Status(u16, String),
    /// 200 with a body that is not the expected JSON.
    Malformed,
    /// Wait before answering with `text`.
    Slow(Duration, String),
}

#[derive(Clone)]
struct BackendState {
    reply: Arc<Mutex<FakeReply>>,
    requests: Arc<Mutex<Vec<Value>>>,
}

/// A local HTTP server imitating an Ollama backend. Stops when dropped.
pub struct FakeBackend {
    addr: SocketAddr,
    state: BackendState,
    handle: JoinHandle<()>,
}

impl FakeBackend {
    /// Bind a random local port and start serving.
    pub async fn start(reply: FakeReply) -> Self {
        let state = BackendState {
            reply: Arc::new(Mutex::new(reply)),
            requests: Arc::new(Mutex::new(Vec::new())),
        };
        let app = Router::new()
            .route("/api/generate", post(generate))
            .route("/api/tags", get(tags))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind fake backend");
        let addr = listener.local_addr().expect("fake backend has no address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("fake backend server failed");
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Base URL to hand to a `SourceConfig`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Change the answer for subsequent requests.
    pub fn set_reply(&self, reply: FakeReply) {
        *self.state.reply.lock().expect("reply mutex poisoned") = reply;
    }

    /// JSON bodies of every `api/generate` request received so far.
    pub fn requests(&self) -> Vec<Value> {
        self.state
            .requests
            .lock()
            .expect("request mutex poisoned")
            .clone()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn generate(State(state): State<BackendState>, Json(body): Json<Value>) -> Response {
    state
        .requests
        .lock()
        .expect("request mutex poisoned")
        .push(body);
    let reply = state.reply.lock().expect("reply mutex poisoned").clone();

    match reply {
        FakeReply::Text(text) => generated(text),
        FakeReply::Status(code, body) => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, body).into_response()
        }
        FakeReply::Malformed => (StatusCode::OK, "this is not json").into_response(),
        FakeReply::Slow(delay, text) => {
            tokio::time::sleep(delay).await;
            generated(text)
        }
    }
}

fn generated(text: String) -> Response {
    Json(json!({"model": "fake", "response": text, "done": true})).into_response()
}

async fn tags() -> Json<Value> {
    Json(json!({"models": [{"name": "fake"}]}))
}
