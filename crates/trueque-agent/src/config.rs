//! Configuration types for the trading agent.
//!
//! Connection settings are loaded from environment variables. The policy
//! knobs (scarce resource, throttle, backoff) live in an optional YAML file
//! named by `TRUEQUE_CONFIG` and are loaded by
//! [`trueque_core::NegotiationConfig`].

use std::path::PathBuf;
use std::time::Duration;

use trueque_core::NegotiationConfig;

use crate::error::AgentError;

/// Complete agent configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Marketplace base URL (e.g. `http://127.0.0.1:7719`).
    pub marketplace_url: String,
    /// Display name registered at startup, if any.
    pub display_name: Option<String>,
    /// Per-call timeout for marketplace requests.
    pub http_timeout: Duration,
    /// LLM backend behind the reasoning oracle.
    pub llm: LlmBackendConfig,
    /// Path to the templates directory.
    pub templates_dir: String,
    /// Optional policy YAML file.
    pub policy_path: Option<PathBuf>,
    /// Optional trade ledger JSON file.
    pub ledger_path: Option<PathBuf>,
    /// Emit logs as JSON lines instead of human-readable text.
    pub json_logs: bool,
}

/// Configuration for the LLM backend.
#[derive(Debug, Clone)]
pub struct LlmBackendConfig {
    /// The backend type (openai, anthropic, ollama).
    pub backend_type: BackendType,
    /// Base API URL (e.g. `http://localhost:11434`).
    pub api_url: String,
    /// API key. Empty for a local Ollama.
    pub api_key: String,
    /// Model identifier (e.g. `qwen3-vl:8b`).
    pub model: String,
    /// Per-call timeout. Local models can be slow.
    pub timeout: Duration,
}

/// Supported LLM backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// `OpenAI`-compatible chat completions API.
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
    /// Ollama native `/api/generate`.
    Ollama,
}

impl BackendType {
    /// Parse a backend name.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] for an unknown name.
    pub fn parse(name: &str) -> Result<Self, AgentError> {
        match name.trim().to_lowercase().as_str() {
            "openai" | "deepseek" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(AgentError::Config(format!("unknown backend type: {other}"))),
        }
    }

    const fn default_api_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::Ollama => "http://localhost:11434",
        }
    }
}

impl RunnerConfig {
    /// Load configuration from environment variables.
    ///
    /// Required variables:
    /// - `MARKETPLACE_URL` -- marketplace base URL
    ///
    /// Optional variables:
    /// - `AGENT_DISPLAY_NAME` -- name registered via `POST /alias/{name}`
    /// - `HTTP_TIMEOUT_MS` -- marketplace call timeout (default 10000)
    /// - `LLM_BACKEND` -- `ollama` (default), `openai` or `anthropic`
    /// - `LLM_API_URL` -- backend base URL (default per backend)
    /// - `LLM_API_KEY` -- API key, required unless the backend is `ollama`
    /// - `LLM_MODEL` -- model name (default `qwen3-vl:8b`)
    /// - `LLM_TIMEOUT_MS` -- LLM call timeout (default 120000)
    /// - `TEMPLATES_DIR` -- path to prompt templates (default `templates`)
    /// - `TRUEQUE_CONFIG` -- policy YAML file
    /// - `LEDGER_PATH` -- trade ledger JSON file
    /// - `LOG_FORMAT` -- `json` for JSON log lines
    pub fn from_env() -> Result<Self, AgentError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AgentError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let marketplace_url = var("MARKETPLACE_URL")
            .ok_or_else(|| AgentError::Config("missing required env var MARKETPLACE_URL".to_owned()))?
            .trim_end_matches('/')
            .to_owned();

        let http_timeout_ms = parse_or(var("HTTP_TIMEOUT_MS"), "HTTP_TIMEOUT_MS", 10_000)?;
        let llm_timeout_ms = parse_or(var("LLM_TIMEOUT_MS"), "LLM_TIMEOUT_MS", 120_000)?;

        let backend_type = BackendType::parse(&var("LLM_BACKEND").unwrap_or_else(|| "ollama".to_owned()))?;
        let api_key = var("LLM_API_KEY").unwrap_or_default();
        if api_key.is_empty() && backend_type != BackendType::Ollama {
            return Err(AgentError::Config(
                "LLM_API_KEY is required unless LLM_BACKEND is ollama".to_owned(),
            ));
        }

        let llm = LlmBackendConfig {
            backend_type,
            api_url: var("LLM_API_URL")
                .unwrap_or_else(|| backend_type.default_api_url().to_owned())
                .trim_end_matches('/')
                .to_owned(),
            api_key,
            model: var("LLM_MODEL").unwrap_or_else(|| "qwen3-vl:8b".to_owned()),
            timeout: Duration::from_millis(llm_timeout_ms),
        };

        Ok(Self {
            marketplace_url,
            display_name: var("AGENT_DISPLAY_NAME"),
            http_timeout: Duration::from_millis(http_timeout_ms),
            llm,
            templates_dir: var("TEMPLATES_DIR").unwrap_or_else(|| "templates".to_owned()),
            policy_path: var("TRUEQUE_CONFIG").map(PathBuf::from),
            ledger_path: var("LEDGER_PATH").map(PathBuf::from),
            json_logs: var("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
        })
    }

    /// Load the policy file, or the default policy when none is configured.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Policy`] if the file is unreadable or invalid.
    pub fn load_policy(&self) -> Result<NegotiationConfig, AgentError> {
        match &self.policy_path {
            Some(path) => Ok(NegotiationConfig::from_file(path)?),
            None => Ok(NegotiationConfig::default()),
        }
    }
}

fn parse_or(raw: Option<String>, name: &str, default: u64) -> Result<u64, AgentError> {
    raw.map_or(Ok(default), |v| {
        v.trim()
            .parse()
            .map_err(|e| AgentError::Config(format!("invalid {name}: {e}")))
    })
}
