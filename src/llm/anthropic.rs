//! Anthropic Claude provider implementation

use super::{ModelError, ToolDefinition};
use crate::engine::state::{Message, Role, ToolCall, ToolArgs};
use crate::llm::ChatModel;
use crate::system_prompt;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic service implementation
pub struct AnthropicChat {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
}

impl AnthropicChat {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://api.anthropic.com/v1/messages".to_string(),
            max_tokens,
        }
    }

    fn translate_request(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> AnthropicRequest {
        let tools: Vec<AnthropicTool> = tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.input_schema.clone(),
            })
            .collect();

        AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: system_prompt::build(),
            messages: translate_history(history),
            tools: if tools.is_empty() { None } else { Some(tools) },
        }
    }

    fn classify_error(status: reqwest::StatusCode, body: &str) -> ModelError {
        let message = body.to_string();
        match status.as_u16() {
            401 | 403 => ModelError::auth(format!("Authentication failed: {message}")),
            429 => {
                let mut err = ModelError::rate_limit(format!("Rate limited: {message}"));
                if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(body) {
                    if let Some(retry_after) = parsed
                        .get("error")
                        .and_then(|e| e.get("retry_after"))
                        .and_then(serde_json::Value::as_f64)
                    {
                        err = err.with_retry_after(Duration::from_secs_f64(retry_after));
                    }
                }
                err
            }
            400 => ModelError::invalid_request(format!("Invalid request: {message}")),
            500..=599 => ModelError::server_error(format!("Server error: {message}")),
            _ => ModelError::unknown(format!("HTTP {status}: {message}")),
        }
    }
}

/// Translate conversation history to the Anthropic message shape.
///
/// Tool messages become `tool_result` blocks inside a user-role message, and
/// consecutive same-role messages are coalesced because the API requires
/// strictly alternating roles. Within a coalesced user message, tool results
/// are ordered before text (another API requirement). Leading assistant
/// messages (the greeting) are dropped: the wire conversation must open with
/// a user turn.
fn translate_history(history: &[Message]) -> Vec<AnthropicMessage> {
    let mut messages: Vec<AnthropicMessage> = Vec::new();

    let start = history
        .iter()
        .position(|m| m.role != Role::Assistant)
        .unwrap_or(history.len());

    for message in &history[start..] {
        let (role, blocks) = match message.role {
            Role::User => (
                "user",
                vec![AnthropicContentBlock::Text {
                    text: message.text.clone(),
                }],
            ),
            Role::Assistant => {
                let mut blocks = Vec::new();
                if !message.text.is_empty() {
                    blocks.push(AnthropicContentBlock::Text {
                        text: message.text.clone(),
                    });
                }
                for call in &message.tool_calls {
                    blocks.push(AnthropicContentBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.name().to_string(),
                        input: call.args.to_value(),
                    });
                }
                ("assistant", blocks)
            }
            Role::Tool => (
                "user",
                vec![AnthropicContentBlock::ToolResult {
                    tool_use_id: message.tool_call_id.clone().unwrap_or_default(),
                    content: message.text.clone(),
                }],
            ),
        };

        match messages.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => messages.push(AnthropicMessage {
                role: role.to_string(),
                content: blocks,
            }),
        }
    }

    for message in &mut messages {
        if message.role == "user" {
            message
                .content
                .sort_by_key(|b| !matches!(b, AnthropicContentBlock::ToolResult { .. }));
        }
    }

    messages
}

fn normalize_response(resp: AnthropicResponse) -> Message {
    let mut text_parts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    for block in resp.content {
        match block {
            AnthropicContentBlock::Text { text } => text_parts.push(text),
            AnthropicContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(ToolCall::new(id, ToolArgs::from_name_and_value(&name, input)));
            }
            AnthropicContentBlock::ToolResult { .. } => {}
        }
    }

    Message::assistant_with_calls(text_parts.join("\n"), tool_calls)
}

#[async_trait]
impl ChatModel for AnthropicChat {
    async fn generate(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Message, ModelError> {
        let request = self.translate_request(history, tools);

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    ModelError::network(format!("Connection failed: {e}"))
                } else {
                    ModelError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(Self::classify_error(status, &body));
        }

        let parsed: AnthropicResponse = serde_json::from_str(&body).map_err(|e| {
            ModelError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        Ok(normalize_response(parsed))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn history_starts_with_user_turn() {
        let history = vec![
            Message::assistant("Welcome to Cymbal Air! How may I assist you?"),
            Message::user("hi"),
        ];
        let messages = translate_history(&history);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
    }

    #[test]
    fn tool_results_coalesce_before_text() {
        let call = ToolCall::new(
            "call-1",
            ToolArgs::from_name_and_value("list_tickets", json!({})),
        );
        let history = vec![
            Message::user("what are my tickets?"),
            Message::assistant_with_calls("checking", vec![call]),
            Message::tool("call-1", "list_tickets", "[]"),
            Message::user("thanks"),
        ];

        let messages = translate_history(&history);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].role, "user");
        assert!(matches!(
            messages[2].content[0],
            AnthropicContentBlock::ToolResult { .. }
        ));
        assert!(matches!(
            messages[2].content[1],
            AnthropicContentBlock::Text { .. }
        ));
    }

    #[test]
    fn normalizes_tool_use_blocks() {
        let resp = AnthropicResponse {
            content: vec![
                AnthropicContentBlock::Text {
                    text: "Let me look that up.".to_string(),
                },
                AnthropicContentBlock::ToolUse {
                    id: "toolu_1".to_string(),
                    name: "search_flights_by_number".to_string(),
                    input: json!({"airline": "CY", "flight_number": "888"}),
                },
            ],
        };

        let message = normalize_response(resp);
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.text, "Let me look that up.");
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].name(), "search_flights_by_number");
    }

    #[test]
    fn classifies_auth_errors_as_fatal() {
        let err = AnthropicChat::classify_error(
            reqwest::StatusCode::UNAUTHORIZED,
            "{\"error\":{\"type\":\"authentication_error\"}}",
        );
        assert!(!err.kind.is_retryable());

        let err = AnthropicChat::classify_error(
            reqwest::StatusCode::SERVICE_UNAVAILABLE,
            "overloaded",
        );
        assert!(err.kind.is_retryable());
    }
}
