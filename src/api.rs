//! HTTP API for the assistant service

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::engine::DialogEngine;
use crate::llm::{AnthropicChat, LoggingChat};
use crate::session::SessionStore;
use crate::tools::ToolRegistry;
use std::sync::Arc;

/// Engine with the production model and tool stack
pub type ProductionEngine = DialogEngine<LoggingChat<AnthropicChat>, ToolRegistry>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SessionStore>,
    pub engine: Arc<ProductionEngine>,
}

impl AppState {
    pub fn new(engine: ProductionEngine) -> Self {
        Self {
            store: Arc::new(SessionStore::new()),
            engine: Arc::new(engine),
        }
    }
}
