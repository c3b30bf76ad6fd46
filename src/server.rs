//! HTTP surface for the orchestrator.
//!
//! `POST /api/chat` answers with the buffered reply, `POST /api/chat/stream`
//! with server-sent events (`delta`, `done`, `error`), and `GET /api/health`
//! reports database health. The bearer credential is resolved through a
//! [`SessionProvider`]; an unresolved credential reaches the orchestrator as
//! no session at all and is rejected there.

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use crate::agent::{
    CallControl, ChatRequest, OrchestrationError, OrchestrationOutcome, Orchestrator, StreamEvent,
    Termination,
};
use crate::config::QuillConfig;
use crate::db;
use crate::filter::CategoryFilter;
use crate::journal::SqliteEntryStore;
use crate::model::openai::OpenAiClient;
use crate::model::Turn;
use crate::session::{bearer_token, Session, SessionProvider, StaticTokenSessions};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub sessions: Arc<dyn SessionProvider>,
    pub db: Arc<Mutex<rusqlite::Connection>>,
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub messages: Vec<Turn>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub turns: Vec<Turn>,
    pub rounds: usize,
    pub step_budget_reached: bool,
}

impl From<OrchestrationOutcome> for ChatResponse {
    fn from(outcome: OrchestrationOutcome) -> Self {
        Self {
            message: outcome.reply,
            turns: outcome.history,
            rounds: outcome.rounds,
            step_budget_reached: outcome.termination == Termination::StepBudget,
        }
    }
}

/// Error body returned by every route: `{"error": "..."}`.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<OrchestrationError> for ApiError {
    fn from(e: OrchestrationError) -> Self {
        let status = match &e {
            OrchestrationError::Unauthorized => StatusCode::UNAUTHORIZED,
            OrchestrationError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            OrchestrationError::ModelTransport { .. } => StatusCode::BAD_GATEWAY,
            OrchestrationError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
            OrchestrationError::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
        };
        if status.is_server_error() {
            tracing::error!(error = %e, completed = e.completed().len(), "chat request failed");
        }
        Self {
            status,
            message: e.user_message().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/chat/stream", post(chat_stream))
        .route("/api/health", get(health))
        .with_state(state)
}

async fn resolve_session(state: &AppState, headers: &HeaderMap) -> Option<Session> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    state.sessions.resolve(bearer_token(header)).await
}

fn chat_request(body: ChatBody) -> Result<ChatRequest, ApiError> {
    let filter = CategoryFilter::parse(body.category.as_deref()).map_err(ApiError::bad_request)?;
    Ok(ChatRequest::new(body.messages).with_filter(filter))
}

async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatResponse>, ApiError> {
    let session = resolve_session(&state, &headers).await;
    if session.is_none() {
        return Err(OrchestrationError::Unauthorized.into());
    }
    let request = chat_request(body)?;

    // Dropping this future on client disconnect aborts the call at its next await.
    let outcome = state
        .orchestrator
        .orchestrate(session.as_ref(), request, CallControl::new())
        .await?;
    Ok(Json(outcome.into()))
}

async fn chat_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ChatBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let session = resolve_session(&state, &headers).await;
    if session.is_none() {
        return Err(OrchestrationError::Unauthorized.into());
    }
    let request = chat_request(body)?;

    let events = Arc::clone(&state.orchestrator)
        .stream(session, request, CallControl::new())
        .map(|event| Ok::<_, Infallible>(sse_event(event)));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn sse_event(event: StreamEvent) -> Event {
    match event {
        StreamEvent::Delta(text) => Event::default().event("delta").data(text),
        StreamEvent::Done(outcome) => {
            let body = ChatResponse::from(outcome);
            let data = serde_json::to_string(&body).unwrap_or_else(|_| "{}".to_string());
            Event::default().event("done").data(data)
        }
        StreamEvent::Failed(e) => {
            tracing::error!(error = %e, "streaming chat failed");
            let data = json!({ "error": e.user_message() }).to_string();
            Event::default().event("error").data(data)
        }
    }
}

async fn health(State(state): State<AppState>) -> Result<Json<db::HealthReport>, ApiError> {
    let db = Arc::clone(&state.db);
    let report = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
        db::check_database_health(&conn)
    })
    .await
    .map_err(|e| anyhow::anyhow!(e))
    .and_then(|r| r)
    .map_err(|e| {
        tracing::error!(error = %e, "health check failed");
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "health check failed".into(),
        }
    })?;
    Ok(Json(report))
}

/// Open the database and model client and assemble the shared state.
pub fn build_state(config: &QuillConfig) -> Result<AppState> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");
    let db = Arc::new(Mutex::new(conn));

    let store = Arc::new(SqliteEntryStore::new(Arc::clone(&db)));
    let model = Arc::new(OpenAiClient::from_config(&config.model).context("failed to build model client")?);
    tracing::info!(model = %config.model.model, endpoint = %config.model.endpoint, "model client ready");

    let sessions = StaticTokenSessions::from_config(&config.auth);
    if sessions.is_empty() {
        tracing::warn!("no auth tokens configured; every chat request will be rejected");
    }

    Ok(AppState {
        orchestrator: Arc::new(Orchestrator::new(model, store, config.agent.clone())),
        sessions: Arc::new(sessions),
        db,
    })
}

/// Bind and serve until ctrl-c.
pub async fn serve(config: QuillConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = build_state(&config)?;

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "quill listening at http://{bind_addr}/api/chat");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
