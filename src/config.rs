//! Process configuration
//!
//! All tunables come from the environment so deployments can adjust
//! timeouts and retry budgets without a rebuild.

use std::time::Duration;

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP API listens on
    pub port: u16,
    /// Base URL of the retrieval service backing the tools
    pub retrieval_base_url: String,
    /// Anthropic API key (requests fail with an auth error when unset)
    pub anthropic_api_key: Option<String>,
    /// Anthropic model name sent on the wire
    pub anthropic_model: String,
    /// Max tokens per model response
    pub max_tokens: u32,
    /// Upper bound on model-turn/tool-dispatch cycles within one step
    pub max_turns: u32,
    /// Attempts for retryable model errors
    pub model_retries: u32,
    /// Base delay for model retry backoff (doubles per attempt)
    pub model_retry_delay: Duration,
    /// Timeout applied to each model request
    pub model_timeout: Duration,
    /// Timeout applied to each tool invocation
    pub tool_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env_parse("AIRDESK_PORT", 8081),
            retrieval_base_url: std::env::var("RETRIEVAL_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string()),
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            anthropic_model: std::env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| "claude-3-5-sonnet-20241022".to_string()),
            max_tokens: env_parse("AIRDESK_MAX_TOKENS", 1024),
            max_turns: env_parse("AIRDESK_MAX_TURNS", 10),
            model_retries: env_parse("AIRDESK_MODEL_RETRIES", 3),
            model_retry_delay: Duration::from_millis(env_parse(
                "AIRDESK_MODEL_RETRY_DELAY_MS",
                1000,
            )),
            model_timeout: Duration::from_secs(env_parse("AIRDESK_MODEL_TIMEOUT_SECS", 120)),
            tool_timeout: Duration::from_secs(env_parse("AIRDESK_TOOL_TIMEOUT_SECS", 30)),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_env_unset() {
        let config = Config::from_env();
        assert!(config.max_turns >= 1);
        assert!(config.tool_timeout > Duration::ZERO);
    }
}
