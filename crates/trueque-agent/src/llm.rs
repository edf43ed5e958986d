//! Chat-model client behind the reasoning oracle.
//!
//! One [`LlmBackend`] speaks one of three wire dialects, picked by
//! [`BackendType`]: OpenAI-compatible chat completions, the Anthropic
//! Messages API, or Ollama's native `/api/generate`. The dialect decides the
//! endpoint, the auth headers, the request body and where the reply text
//! sits in the response. Everything else (timeouts, status handling, error
//! mapping) is shared.
//!
//! The oracle only sees text in and text out; it expects that text to hold
//! a JSON object.

use serde_json::Value;

use crate::config::{BackendType, LlmBackendConfig};
use crate::error::AgentError;
use crate::prompt::RenderedPrompt;

/// Upper bound on generated tokens. Replies are small JSON objects.
const MAX_REPLY_TOKENS: u32 = 512;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A configured chat-model endpoint.
pub struct LlmBackend {
    client: reqwest::Client,
    kind: BackendType,
    api_url: String,
    api_key: String,
    model: String,
}

impl LlmBackend {
    /// Send a prompt and return the model's reply text.
    ///
    /// `schema` constrains the reply on Ollama, which accepts a JSON schema
    /// as its `format`. The hosted dialects are only asked for JSON.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::LlmBackend`] when the call fails, the status is
    /// not a success, or the reply text is missing.
    pub async fn complete(
        &self,
        prompt: &RenderedPrompt,
        schema: Option<&Value>,
    ) -> Result<String, AgentError> {
        let body = self.request_body(prompt, schema);
        let request = self.authorize(self.client.post(self.endpoint()));

        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| self.failure(&format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_owned());
            return Err(self.failure(&format!("returned {status}: {detail}")));
        }

        let reply: Value = response
            .json()
            .await
            .map_err(|e| self.failure(&format!("reply is not JSON: {e}")))?;
        reply_text(self.kind, &reply).ok_or_else(|| {
            self.failure(&format!("reply has no text at {}", reply_pointer(self.kind)))
        })
    }

    /// Dialect name, for logging.
    pub const fn name(&self) -> &'static str {
        match self.kind {
            BackendType::OpenAi => "openai-compatible",
            BackendType::Anthropic => "anthropic",
            BackendType::Ollama => "ollama",
        }
    }

    fn endpoint(&self) -> String {
        let path = match self.kind {
            BackendType::OpenAi => "/chat/completions",
            BackendType::Anthropic => "/messages",
            BackendType::Ollama => "/api/generate",
        };
        format!("{}{path}", self.api_url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.kind {
            BackendType::OpenAi => request.bearer_auth(&self.api_key),
            BackendType::Anthropic => request
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            BackendType::Ollama => request,
        }
    }

    fn request_body(&self, prompt: &RenderedPrompt, schema: Option<&Value>) -> Value {
        match self.kind {
            BackendType::OpenAi => serde_json::json!({
                "model": self.model,
                "temperature": 0.0,
                "max_tokens": MAX_REPLY_TOKENS,
                "response_format": {"type": "json_object"},
                "messages": [
                    {"role": "system", "content": prompt.system},
                    {"role": "user", "content": prompt.user},
                ],
            }),
            BackendType::Anthropic => serde_json::json!({
                "model": self.model,
                "max_tokens": MAX_REPLY_TOKENS,
                "system": prompt.system,
                "messages": [{"role": "user", "content": prompt.user}],
            }),
            BackendType::Ollama => serde_json::json!({
                "model": self.model,
                "system": prompt.system,
                "prompt": prompt.user,
                "stream": false,
                "format": schema.cloned().unwrap_or_else(|| Value::from("json")),
            }),
        }
    }

    fn failure(&self, detail: &str) -> AgentError {
        AgentError::LlmBackend(format!("{}: {detail}", self.name()))
    }
}

/// JSON pointer to the reply text in each dialect's response.
const fn reply_pointer(kind: BackendType) -> &'static str {
    match kind {
        BackendType::OpenAi => "/choices/0/message/content",
        BackendType::Anthropic => "/content/0/text",
        BackendType::Ollama => "/response",
    }
}

fn reply_text(kind: BackendType, reply: &Value) -> Option<String> {
    reply
        .pointer(reply_pointer(kind))
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}

/// Build a backend from configuration.
///
/// # Errors
///
/// Returns [`AgentError::Http`] if the HTTP client cannot be built.
pub fn create_backend(config: &LlmBackendConfig) -> Result<LlmBackend, AgentError> {
    let client = reqwest::Client::builder().timeout(config.timeout).build()?;
    Ok(LlmBackend {
        client,
        kind: config.backend_type,
        api_url: config.api_url.clone(),
        api_key: config.api_key.clone(),
        model: config.model.clone(),
    })
}
