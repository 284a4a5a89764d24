//! HTTP server exposing the query pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/ask` | One-shot answer as a single JSON object |
//! | `POST` | `/api/ask_stream` | Answer as newline-delimited JSON events |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Both ask endpoints take `{agent, question, k?, session_id?}`. The agent
//! must be one of `writer`, `code`, `reviewer`; anything else is a client
//! error. Both require a non-empty persisted index and report a
//! descriptive "index not built" failure otherwise.
//!
//! The streaming body is a sequence of [`StreamEvent`] lines: zero or more
//! `delta` events (140-character slices by default), then exactly one
//! terminal `done` (success) or `error` (failure) event. The emitter
//! yields back to the scheduler after each line so the transport can
//! flush it before the next is produced.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser-based
//! presentation layer can call from anywhere.

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::agent::AgentId;
use crate::config::Config;
use crate::error::QueryError;
use crate::query::QueryEngine;
use crate::stream::{answer_events, StreamEvent};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    engine: Arc<QueryEngine>,
}

/// Starts the HTTP server. Runs until the process is terminated.
pub async fn run_server(config: Arc<Config>, engine: Arc<QueryEngine>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState { config, engine };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/ask", post(handle_ask))
        .route("/api/ask_stream", post(handle_ask_stream))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    info!("listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Request/response shapes ============

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub agent: String,
    pub question: String,
    #[serde(default)]
    pub k: Option<usize>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct AskResponse {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sources: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl AskResponse {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            answer: None,
            sources: None,
            error: Some(error.into()),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/ask ============

/// Non-streaming fallback. Failures (unknown agent, missing index,
/// generation errors) come back as `{ok: false, error}` with HTTP 200,
/// matching the wire contract the presentation layer expects.
async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Json<AskResponse> {
    let agent = match AgentId::from_str(&req.agent) {
        Ok(agent) => agent,
        Err(e) => return Json(AskResponse::failure(e.to_string())),
    };

    match state.engine.index_ready().await {
        Ok(true) => {}
        Ok(false) => {
            return Json(AskResponse::failure(QueryError::IndexNotReady.to_string()))
        }
        Err(e) => return Json(AskResponse::failure(e.to_string())),
    }

    let k = req.k.or(Some(state.config.retrieval.chat_k));
    match state
        .engine
        .ask(agent, &req.question, req.session_id.as_deref(), k)
        .await
    {
        Ok(outcome) => Json(AskResponse {
            ok: true,
            answer: Some(outcome.answer),
            sources: Some(outcome.sources),
            error: None,
        }),
        Err(e) => Json(AskResponse::failure(e.to_string())),
    }
}

// ============ POST /api/ask_stream ============

/// Streaming delivery as NDJSON. An invalid agent is rejected with 400
/// before any streaming begins; all later failures terminate the stream
/// with a single `error` event.
async fn handle_ask_stream(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Response {
    let agent = match AgentId::from_str(&req.agent) {
        Ok(agent) => agent,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(AskResponse::failure(e.to_string())),
            )
                .into_response();
        }
    };

    let engine = Arc::clone(&state.engine);
    let stride = state.config.server.stream_stride;
    let chat_k = state.config.retrieval.chat_k;
    let question = req.question;
    let session_id = req.session_id;
    let k = req.k.or(Some(chat_k));

    // The answer is fully computed inside the stream so the response
    // headers go out immediately; events follow once generation finishes.
    let events = futures_util::stream::once(async move {
        let ready = match engine.index_ready().await {
            Ok(ready) => ready,
            Err(e) => {
                return futures_util::stream::iter(vec![StreamEvent::Error {
                    error: e.to_string(),
                }])
            }
        };
        if !ready {
            return futures_util::stream::iter(vec![StreamEvent::Error {
                error: QueryError::IndexNotReady.to_string(),
            }]);
        }

        match engine.ask(agent, &question, session_id.as_deref(), k).await {
            Ok(outcome) => futures_util::stream::iter(answer_events(
                &outcome.answer,
                &outcome.sources,
                stride,
            )),
            Err(e) => futures_util::stream::iter(vec![StreamEvent::Error {
                error: e.to_string(),
            }]),
        }
    })
    .flatten();

    let lines = events.then(|event| async move {
        let line = event.to_ndjson();
        // Cooperative suspension so the transport can flush each event.
        tokio::task::yield_now().await;
        Ok::<_, std::convert::Infallible>(line)
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(Body::from_stream(lines))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
