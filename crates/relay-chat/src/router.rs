//! Axum route handlers for the chat and monitoring surface
//!
//! Identity is an external collaborator: handlers trust the
//! `x-user-id` header placed by the authenticating proxy in front of
//! this service.

use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, extract::State, routing};
use futures_util::{Stream, StreamExt};
use relay_core::{HttpError, now_ms};
use relay_quota::ProviderSnapshot;
use serde::{Deserialize, Serialize};

use crate::error::TurnError;
use crate::orchestrator::{Orchestrator, TurnOutcome};

const USER_HEADER: &str = "x-user-id";

/// Characters per SSE chunk for the typing effect
const STREAM_CHUNK_CHARS: usize = 3;

/// Delay between SSE chunks
const STREAM_CHUNK_DELAY: Duration = Duration::from_millis(20);

/// Shared state for chat route handlers
#[derive(Clone)]
pub struct ChatState {
    pub orchestrator: Orchestrator,
    /// Attach quota/usage debug payloads to chat responses
    pub expose_debug: bool,
}

/// Build the chat router with all endpoints
pub fn chat_router(state: ChatState) -> Router {
    Router::new()
        .route("/api/chat", routing::post(chat))
        .route("/api/stream", routing::post(stream))
        .route("/api/ai/status", routing::get(status))
        .route("/api/ai/usage", routing::get(usage))
        .route("/api/ai/switch-model", routing::post(switch_model))
        .with_state(state)
}

// -- Wire types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    prompt: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponse {
    success: bool,
    message: String,
    session_id: String,
    model: String,
    model_info: ModelInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    debug: Option<DebugInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
    name: String,
    switched: bool,
    switched_from: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DebugInfo {
    usage: Vec<ProviderSnapshot>,
    timestamp_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwitchModelRequest {
    target_model: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    success: bool,
    current_model: String,
    available_models: Vec<String>,
    providers: Vec<ProviderSnapshot>,
    timestamp_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UsageResponse {
    success: bool,
    usage: Vec<ProviderSnapshot>,
    timestamp_ms: u64,
}

// -- Handlers --

/// Handle `POST /api/chat`
async fn chat(
    State(state): State<ChatState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Response {
    let user_id = match require_user(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    match state
        .orchestrator
        .run_turn(&user_id, request.session_id.as_deref(), &request.prompt)
        .await
    {
        Ok(outcome) => {
            let debug = state.expose_debug.then(|| DebugInfo {
                usage: state.orchestrator.status().providers,
                timestamp_ms: now_ms(),
            });

            Json(ChatResponse {
                success: true,
                message: outcome.text.clone(),
                session_id: outcome.session_id.clone(),
                model: outcome.provider.clone(),
                model_info: ModelInfo {
                    name: outcome.provider,
                    switched: outcome.switched,
                    switched_from: outcome.switched_from,
                },
                debug,
            })
            .into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// Handle `POST /api/stream`
///
/// The turn completes and persists before any bytes are emitted, so a
/// client abort mid-stream stops emission only — recorded usage and the
/// stored turn are untouched.
async fn stream(
    State(state): State<ChatState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Response {
    let user_id = match require_user(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    match state
        .orchestrator
        .run_turn(&user_id, request.session_id.as_deref(), &request.prompt)
        .await
    {
        Ok(outcome) => sse_response(outcome).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Handle `GET /api/ai/status`
async fn status(State(state): State<ChatState>) -> Response {
    let engine = state.orchestrator.status();

    Json(StatusResponse {
        success: true,
        current_model: engine.current_provider,
        available_models: engine.providers.iter().map(|p| p.name.clone()).collect(),
        providers: engine.providers,
        timestamp_ms: now_ms(),
    })
    .into_response()
}

/// Handle `GET /api/ai/usage`
async fn usage(State(state): State<ChatState>) -> Response {
    Json(UsageResponse {
        success: true,
        usage: state.orchestrator.status().providers,
        timestamp_ms: now_ms(),
    })
    .into_response()
}

/// Handle `POST /api/ai/switch-model`
async fn switch_model(
    State(state): State<ChatState>,
    headers: HeaderMap,
    Json(request): Json<SwitchModelRequest>,
) -> Response {
    if let Err(response) = require_user(&headers) {
        return response;
    }

    match state.orchestrator.switch_to(&request.target_model) {
        Ok(()) => Json(serde_json::json!({
            "success": true,
            "message": format!("current model switched to {}", request.target_model),
            "currentModel": request.target_model,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

// -- Helpers --

/// Replay a completed turn as an SSE stream with a typing effect
fn sse_response(outcome: TurnOutcome) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let mut events: Vec<Event> = chunk_chars(&outcome.text, STREAM_CHUNK_CHARS)
        .into_iter()
        .map(|chunk| Event::default().data(chunk))
        .collect();

    let metadata = serde_json::json!({
        "model": outcome.provider,
        "sessionId": outcome.session_id,
        "switched": outcome.switched,
        "switchedFrom": outcome.switched_from,
    });
    events.push(Event::default().event("metadata").data(metadata.to_string()));
    events.push(Event::default().event("done").data("[DONE]"));

    let stream = futures_util::stream::iter(events).then(|event| async move {
        tokio::time::sleep(STREAM_CHUNK_DELAY).await;
        Ok(event)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Split text into fixed-size chunks on char boundaries
fn chunk_chars(text: &str, size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;

    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count >= size {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Extract the externally-authenticated user id
fn require_user(headers: &HeaderMap) -> Result<String, Response> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            let body = serde_json::json!({
                "success": false,
                "error": "authenticated user id required",
                "type": "authentication_error",
            });
            (StatusCode::UNAUTHORIZED, Json(body)).into_response()
        })
}

/// Convert a turn error to a JSON error response
fn error_response(error: &TurnError) -> Response {
    let body = serde_json::json!({
        "success": false,
        "error": error.client_message(),
        "type": error.error_type(),
    });
    (error.status_code(), Json(body)).into_response()
}
