//! Error types for the trading agent.
//!
//! Uses `thiserror` for typed errors that surface through the agent: HTTP
//! transport, marketplace responses, LLM calls, prompt rendering, response
//! parsing and configuration.

use trueque_core::{ConfigError, StateError};

/// Errors that can occur while running the agent.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The HTTP request could not be sent or its body not read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The marketplace answered with a non-success status.
    #[error("marketplace error on {endpoint}: {status}: {body}")]
    Marketplace {
        /// Method and path of the call.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnosis.
        body: String,
    },

    /// An LLM backend returned an error or was unreachable.
    #[error("LLM backend error: {0}")]
    LlmBackend(String),

    /// Failed to load or render a prompt template.
    #[error("template render error: {0}")]
    Template(String),

    /// An LLM response could not be parsed.
    #[error("response parse error: {0}")]
    Parse(String),

    /// Environment configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// The policy YAML file is invalid.
    #[error("policy config error: {0}")]
    Policy(#[from] ConfigError),

    /// The account view could not be turned into a state snapshot.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Serialization or deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
