//! HTTP request handlers

use super::types::{
    ChatRequest, ChatResponse, CreateSessionResponse, ErrorResponse, GreetingResponse,
    HistoryResponse, LoginRequest, SuccessResponse,
};
use super::AppState;
use crate::engine::{EngineError, StepInput};
use crate::engine::state::UserIdentity;
use crate::session::SessionError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_history))
        .route("/api/sessions/:id/chat", post(chat))
        .route("/api/sessions/:id/book/confirm", post(confirm_booking))
        .route("/api/sessions/:id/book/decline", post(decline_booking))
        .route("/api/sessions/:id/login", post(login))
        .route("/api/sessions/:id/signout", post(sign_out))
        .route("/api/sessions/:id/reset", post(reset))
        .with_state(state)
}

async fn health() -> &'static str {
    concat!("airdesk ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Session lifecycle
// ============================================================

async fn create_session(State(state): State<AppState>) -> Json<CreateSessionResponse> {
    let (session_id, greeting) = state.store.create().await;
    Json(CreateSessionResponse {
        session_id,
        greeting,
    })
}

async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, AppError> {
    let history = state.store.history(&id).await?;
    Ok(Json(HistoryResponse { history }))
}

async fn reset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<GreetingResponse>, AppError> {
    let greeting = state.store.reset(&id).await?;
    Ok(Json(GreetingResponse { greeting }))
}

async fn login(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<GreetingResponse>, AppError> {
    if req.token.is_empty() {
        return Err(AppError::BadRequest("No user credentials found".to_string()));
    }
    let greeting = state
        .store
        .login(
            &id,
            UserIdentity {
                token: req.token,
                name: req.name,
            },
        )
        .await?;
    Ok(Json(GreetingResponse { greeting }))
}

async fn sign_out(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.store.sign_out(&id).await?;
    Ok(Json(SuccessResponse::ok()))
}

// ============================================================
// Conversation steps
// ============================================================

async fn chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if req.prompt.trim().is_empty() {
        return Err(AppError::BadRequest("Error: No user query".to_string()));
    }
    step_session(&state, &id, StepInput::User(req.prompt)).await
}

async fn confirm_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ChatResponse>, AppError> {
    step_session(&state, &id, StepInput::Confirm).await
}

async fn decline_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ChatResponse>, AppError> {
    step_session(&state, &id, StepInput::Decline).await
}

/// Run one engine step under the session's lock, committing the successor
/// state only on success.
async fn step_session(
    state: &AppState,
    session_id: &str,
    input: StepInput,
) -> Result<Json<ChatResponse>, AppError> {
    let entry = state.store.entry(session_id).await?;
    let mut conversation = entry.lock().await;

    let result = state.engine.step(&conversation, input).await?;
    *conversation = result.state;

    Ok(Json(ChatResponse {
        reply: result.reply,
        trace: result.trace,
        pending_confirmation: result.pending_confirmation,
    }))
}

// ============================================================
// Error Handling
// ============================================================

pub(super) enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Upstream(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(_) => AppError::NotFound(e.to_string()),
        }
    }
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::ModelUnavailable(_) => AppError::Upstream(e.to_string()),
            EngineError::NoPendingAction => AppError::Conflict(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
