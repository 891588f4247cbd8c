//! Step trace
//!
//! Every tool invocation performed during a step is recorded here and
//! returned alongside the final answer. Observability output only; it never
//! feeds back into the conversation.

use serde::Serialize;

/// One tool invocation observed during a step.
#[derive(Debug, Clone, Serialize)]
pub struct TraceEntry {
    pub tool: String,
    pub result: String,
    /// Backend diagnostic, e.g. the SQL the retrieval service executed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl TraceEntry {
    pub fn new(tool: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            result: result.into(),
            query: None,
        }
    }

    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query;
        self
    }
}
