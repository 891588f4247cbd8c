//! Cymbal Air assistant service
//!
//! An HTTP service that answers airline-travel questions and books flight
//! tickets by driving a tool-calling conversation state machine with a
//! human confirmation gate in front of bookings.

mod api;
mod config;
mod engine;
mod llm;
mod policy;
mod session;
mod system_prompt;
mod tools;

use api::{create_router, AppState};
use config::Config;
use engine::{DialogEngine, EngineConfig};
use llm::{AnthropicChat, LoggingChat};
use std::net::SocketAddr;
use std::sync::Arc;
use tools::{RetrievalClient, ToolRegistry};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "airdesk=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = Config::from_env();

    if config.anthropic_api_key.is_none() {
        tracing::warn!("No model API key configured. Set ANTHROPIC_API_KEY.");
    }

    // Shared HTTP client for the retrieval service; identity is passed
    // per-request, never stored on the client.
    let http = reqwest::Client::builder()
        .timeout(config.tool_timeout)
        .build()?;
    let retrieval = Arc::new(RetrievalClient::new(http, config.retrieval_base_url.clone()));
    let registry = ToolRegistry::new(retrieval);

    let model = LoggingChat::new(AnthropicChat::new(
        config.anthropic_api_key.clone().unwrap_or_default(),
        config.anthropic_model.clone(),
        config.max_tokens,
        config.model_timeout,
    ));

    let engine = DialogEngine::new(
        model,
        registry,
        EngineConfig {
            max_turns: config.max_turns,
            model_retries: config.model_retries,
            retry_delay: config.model_retry_delay,
            tool_timeout: config.tool_timeout,
        },
    );

    let state = AppState::new(engine);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(
        model = %config.anthropic_model,
        retrieval = %config.retrieval_base_url,
        "airdesk listening on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
