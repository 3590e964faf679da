//! Mock upstream servers for the three provider wire formats
//!
//! Each mock returns canned success payloads and can be scripted to fail
//! upcoming requests with a given status and body.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing};
use tokio_util::sync::CancellationToken;

/// Which provider wire format the mock speaks
#[derive(Debug, Clone, Copy)]
enum Shape {
    OpenAi,
    Gemini,
    Tavily,
}

/// One mock upstream provider server on an ephemeral port
pub struct MockUpstream {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

struct MockState {
    shape: Shape,
    response_text: String,
    hits: AtomicU32,
    /// Scripted failures consumed in request order: (status, body)
    failures: Mutex<VecDeque<(u16, String)>>,
    last_body: Mutex<Option<serde_json::Value>>,
}

impl MockUpstream {
    /// Start an OpenAI-shaped mock (groq adapter)
    pub async fn openai(response_text: &str) -> anyhow::Result<Self> {
        Self::start(Shape::OpenAi, response_text).await
    }

    /// Start a Gemini-shaped mock
    pub async fn gemini(response_text: &str) -> anyhow::Result<Self> {
        Self::start(Shape::Gemini, response_text).await
    }

    /// Start a Tavily-shaped mock returning a direct answer
    pub async fn tavily(answer: &str) -> anyhow::Result<Self> {
        Self::start(Shape::Tavily, answer).await
    }

    async fn start(shape: Shape, response_text: &str) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            shape,
            response_text: response_text.to_owned(),
            hits: AtomicU32::new(0),
            failures: Mutex::new(VecDeque::new()),
            last_body: Mutex::new(None),
        });

        let app = Router::new()
            .route("/chat/completions", routing::post(handle))
            .route("/models/{model_action}", routing::post(handle))
            .route("/search", routing::post(handle))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for configuring this mock as a provider
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Script the next request to fail with the given status and body
    pub fn fail_next(&self, status: u16, body: &str) {
        self.state
            .failures
            .lock()
            .unwrap()
            .push_back((status, body.to_owned()));
    }

    /// Number of requests received
    pub fn hits(&self) -> u32 {
        self.state.hits.load(Ordering::SeqCst)
    }

    /// JSON body of the most recent request
    pub fn last_body(&self) -> Option<serde_json::Value> {
        self.state.last_body.lock().unwrap().clone()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle(
    State(state): State<Arc<MockState>>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);
    *state.last_body.lock().unwrap() = Some(body);

    if let Some((status, body)) = state.failures.lock().unwrap().pop_front() {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, body).into_response();
    }

    let text = state.response_text.clone();
    let payload = match state.shape {
        Shape::OpenAi => serde_json::json!({
            "id": "chatcmpl-test-123",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": "llama-3.3-70b-versatile",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": text},
                "finish_reason": "stop",
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15},
        }),
        Shape::Gemini => serde_json::json!({
            "candidates": [{
                "content": {"parts": [{"text": text}], "role": "model"},
                "finishReason": "STOP",
            }],
        }),
        Shape::Tavily => serde_json::json!({
            "query": "test",
            "answer": text,
            "results": [],
        }),
    };

    Json(payload).into_response()
}
