//! Request/response types for the HTTP API

use crate::engine::state::Message;
use crate::engine::{PendingConfirmation, TraceEntry};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub greeting: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub trace: Vec<TraceEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_confirmation: Option<PendingConfirmation>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub token: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GreetingResponse {
    pub greeting: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
