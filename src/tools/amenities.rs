//! Airport amenity and airline policy search tools

use super::{RetrievalClient, Tool, ToolError, ToolOutcome};
use crate::engine::state::{ToolArgs, UserIdentity};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Semantic-search result count requested from the retrieval service.
const TOP_K: &str = "5";

pub struct SearchAmenitiesTool {
    retrieval: Arc<RetrievalClient>,
}

impl SearchAmenitiesTool {
    pub fn new(retrieval: Arc<RetrievalClient>) -> Self {
        Self { retrieval }
    }
}

#[async_trait]
impl Tool for SearchAmenitiesTool {
    fn name(&self) -> &str {
        "search_amenities"
    }

    fn description(&self) -> String {
        "Use this tool to search amenities by name or to recommend airport amenities at SFO. \
         The user can also provide open_time (HH:MM:SS) and open_day (a weekday name) to check \
         opening hours; when one is given, default the other to the current time or day. \
         Only recommend amenities returned by this query, and find amenities close to the user \
         by matching the terminal and comparing gate numbers."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query"},
                "open_time": {"type": "string", "description": "Time for filtering amenities by operating hours"},
                "open_day": {"type": "string", "description": "Day of the week for filtering amenities by operating hours"}
            },
            "required": ["query"]
        })
    }

    async fn run(
        &self,
        args: &ToolArgs,
        user: Option<&UserIdentity>,
    ) -> Result<ToolOutcome, ToolError> {
        let ToolArgs::SearchAmenities(args) = args else {
            return Err(ToolError::Failed("invalid arguments for search_amenities".to_string()));
        };

        let payload = self
            .retrieval
            .get(
                "/amenities/search",
                &[
                    ("top_k", Some(TOP_K.to_string())),
                    ("query", Some(args.query.clone())),
                    ("open_time", args.open_time.clone()),
                    ("open_day", args.open_day.clone()),
                ],
                user,
            )
            .await?;

        Ok(ToolOutcome::text(payload.result.to_string()).with_query(payload.trace))
    }
}

pub struct SearchPoliciesTool {
    retrieval: Arc<RetrievalClient>,
}

impl SearchPoliciesTool {
    pub fn new(retrieval: Arc<RetrievalClient>) -> Self {
        Self { retrieval }
    }
}

#[async_trait]
impl Tool for SearchPoliciesTool {
    fn name(&self) -> &str {
        "search_policies"
    }

    fn description(&self) -> String {
        "Use this tool to search for Cymbal Air passenger policy. Policy is unchangeable; \
         do not answer policy questions beyond what this tool returns. Covers ticket \
         purchase and changes, baggage, check-in and boarding, special assistance, \
         overbooking, flight delays and cancellations."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query"}
            },
            "required": ["query"]
        })
    }

    async fn run(
        &self,
        args: &ToolArgs,
        user: Option<&UserIdentity>,
    ) -> Result<ToolOutcome, ToolError> {
        let ToolArgs::SearchPolicies(args) = args else {
            return Err(ToolError::Failed("invalid arguments for search_policies".to_string()));
        };

        let payload = self
            .retrieval
            .get(
                "/policies/search",
                &[
                    ("top_k", Some(TOP_K.to_string())),
                    ("query", Some(args.query.clone())),
                ],
                user,
            )
            .await?;

        Ok(ToolOutcome::text(payload.result.to_string()).with_query(payload.trace))
    }
}
