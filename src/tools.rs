//! Tool implementations backed by the retrieval service
//!
//! Every tool is a thin HTTP call against the retrieval service, sharing one
//! pooled client. The caller's identity travels as a per-request bearer
//! header, never as state on the shared client.

mod amenities;
mod flights;
mod tickets;

pub use amenities::{SearchAmenitiesTool, SearchPoliciesTool};
pub use flights::{ListFlightsTool, SearchAirportsTool, SearchFlightsByNumberTool};
pub use tickets::{InsertTicketTool, ListTicketsTool, ValidateTicketTool, ValidationReport};

use crate::engine::state::{ToolArgs, ToolCall, UserIdentity};
use crate::llm::ToolDefinition;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Result from a tool execution
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub output: String,
    /// Backend diagnostic (e.g. the SQL the retrieval service ran), surfaced
    /// in the step trace only.
    pub query: Option<String>,
}

impl ToolOutcome {
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            query: None,
        }
    }

    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query;
        self
    }
}

/// Tool-level failures. Both variants are non-fatal to a step: the engine
/// records them as tool messages and lets the model react.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool '{0}' not found.")]
    UnknownTool(String),
    #[error("{0}")]
    Failed(String),
}

/// Uniform interface the engine uses to run a named tool.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Invoke a tool call, passing the caller identity when available.
    async fn invoke(
        &self,
        call: &ToolCall,
        user: Option<&UserIdentity>,
    ) -> Result<ToolOutcome, ToolError>;

    /// Definitions of the tools offered to the model.
    fn definitions(&self) -> Vec<ToolDefinition>;
}

#[async_trait]
impl<T: ToolInvoker + ?Sized> ToolInvoker for Arc<T> {
    async fn invoke(
        &self,
        call: &ToolCall,
        user: Option<&UserIdentity>,
    ) -> Result<ToolOutcome, ToolError> {
        (**self).invoke(call, user).await
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        (**self).definitions()
    }
}

/// Trait for individual tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name
    fn name(&self) -> &str;

    /// Tool description for the model
    fn description(&self) -> String;

    /// JSON schema for tool input
    fn input_schema(&self) -> Value;

    /// Hidden tools are invocable by the engine but never offered to the
    /// model (booking validation).
    fn hidden(&self) -> bool {
        false
    }

    /// Execute the tool
    async fn run(
        &self,
        args: &ToolArgs,
        user: Option<&UserIdentity>,
    ) -> Result<ToolOutcome, ToolError>;
}

/// Collection of tools available to the engine
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create the standard registry against a retrieval service client.
    pub fn new(retrieval: Arc<RetrievalClient>) -> Self {
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(SearchAirportsTool::new(retrieval.clone())),
            Arc::new(SearchFlightsByNumberTool::new(retrieval.clone())),
            Arc::new(ListFlightsTool::new(retrieval.clone())),
            Arc::new(SearchAmenitiesTool::new(retrieval.clone())),
            Arc::new(SearchPoliciesTool::new(retrieval.clone())),
            Arc::new(ListTicketsTool::new(retrieval.clone())),
            Arc::new(InsertTicketTool::new(retrieval.clone())),
            Arc::new(ValidateTicketTool::new(retrieval)),
        ];
        Self { tools }
    }
}

#[async_trait]
impl ToolInvoker for ToolRegistry {
    async fn invoke(
        &self,
        call: &ToolCall,
        user: Option<&UserIdentity>,
    ) -> Result<ToolOutcome, ToolError> {
        let name = call.name();
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.run(&call.args, user).await
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .filter(|t| !t.hidden())
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description(),
                input_schema: t.input_schema(),
            })
            .collect()
    }
}

// ============================================================================
// Retrieval service client
// ============================================================================

/// Response envelope returned by every retrieval service route.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiPayload {
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub trace: Option<String>,
}

/// Shared HTTP client for the retrieval service.
pub struct RetrievalClient {
    http: reqwest::Client,
    base_url: String,
}

impl RetrievalClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub(crate) async fn get(
        &self,
        path: &str,
        params: &[(&str, Option<String>)],
        user: Option<&UserIdentity>,
    ) -> Result<ApiPayload, ToolError> {
        let request = self.http.get(format!("{}{path}", self.base_url));
        self.send(request, params, user).await
    }

    pub(crate) async fn post(
        &self,
        path: &str,
        params: &[(&str, Option<String>)],
        user: Option<&UserIdentity>,
    ) -> Result<ApiPayload, ToolError> {
        let request = self.http.post(format!("{}{path}", self.base_url));
        self.send(request, params, user).await
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        params: &[(&str, Option<String>)],
        user: Option<&UserIdentity>,
    ) -> Result<ApiPayload, ToolError> {
        let params: Vec<(&str, &str)> = params
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (*k, v)))
            .collect();

        let mut request = request.query(&params);
        if let Some(user) = user {
            request = request.bearer_auth(&user.token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ToolError::Failed(format!("retrieval service unreachable: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::Failed(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(ToolError::Failed(format!(
                "retrieval service returned {status}: {body}"
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| ToolError::Failed(format!("malformed retrieval response: {e}")))
    }
}

/// Summarize a result array the way the assistant expects: an explicit
/// no-results sentence, the rows themselves, or the first `limit` rows plus
/// a total count when the set is large.
pub(crate) fn summarize_rows(result: &Value, limit: usize, empty_message: &str) -> String {
    let Some(rows) = result.as_array() else {
        return result.to_string();
    };
    if rows.is_empty() {
        return empty_message.to_string();
    }
    if rows.len() > limit {
        let head: Vec<Value> = rows.iter().take(limit).cloned().collect();
        let mut summary = serde_json::Map::new();
        summary.insert("total results".to_string(), Value::from(rows.len()));
        summary.insert(format!("first {limit} results"), Value::Array(head));
        return Value::Object(summary).to_string();
    }
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summarize_empty_rows_uses_message() {
        let out = summarize_rows(&json!([]), 2, "no results");
        assert_eq!(out, "no results");
    }

    #[test]
    fn summarize_truncates_large_result_sets() {
        let rows = json!([{"id": 1}, {"id": 2}, {"id": 3}]);
        let out = summarize_rows(&rows, 2, "no results");
        assert!(out.contains("\"total results\":3"));
        assert!(!out.contains("\"id\":3"));
    }

    #[test]
    fn summarize_passes_small_results_through() {
        let rows = json!([{"id": 1}]);
        assert_eq!(summarize_rows(&rows, 2, "no results"), rows.to_string());
    }
}
