//! Model provider abstraction
//!
//! Isolates the engine from any specific model provider's request/response
//! shape: the engine hands over conversation history plus tool definitions
//! and gets the next assistant message back.

mod anthropic;
mod error;

pub use anthropic::AnthropicChat;
pub use error::{ModelError, ModelErrorKind};

use crate::engine::state::Message;
use async_trait::async_trait;
use std::sync::Arc;

/// A tool made available to the model
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Common interface for chat model providers
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Produce the next assistant message for the given history.
    async fn generate(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Message, ModelError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

#[async_trait]
impl<T: ChatModel + ?Sized> ChatModel for Arc<T> {
    async fn generate(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Message, ModelError> {
        (**self).generate(history, tools).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

/// Logging wrapper for chat models
pub struct LoggingChat<M> {
    inner: M,
}

impl<M: ChatModel> LoggingChat<M> {
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<M: ChatModel> ChatModel for LoggingChat<M> {
    async fn generate(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Message, ModelError> {
        let start = std::time::Instant::now();
        let result = self.inner.generate(history, tools).await;
        let duration = start.elapsed();

        match &result {
            Ok(message) => {
                tracing::info!(
                    model = %self.inner.model_id(),
                    duration_ms = %duration.as_millis(),
                    history_len = history.len(),
                    tool_calls = message.tool_calls.len(),
                    "model request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.inner.model_id(),
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "model request failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}
