//! Marketplace API client.
//!
//! [`Marketplace`] is the narrow interface the negotiation loop talks to.
//! [`HttpMarketplace`] implements it over `reqwest` against the marketplace
//! REST endpoints; tests substitute an in-memory implementation.
//!
//! | Operation          | Endpoint                      |
//! |--------------------|-------------------------------|
//! | account view       | `GET /info`                   |
//! | peer list          | `GET /people`                 |
//! | register name      | `POST /alias/{name}`          |
//! | send letter        | `POST /letter`                |
//! | delete letter      | `DELETE /mail/{id}`           |
//! | transfer resources | `POST /package/{recipient}`   |
//!
//! Aliases and letter ids are percent-encoded as single path segments.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;
use trueque_types::{Alias, LetterId, OutgoingLetter, ResourceMap};

use crate::error::AgentError;

/// Operations the agent performs against the marketplace.
///
/// Every call is a single request with no retry.
pub trait Marketplace {
    /// Fetch the raw account view (alias, inventory, objective, mailbox).
    fn account(&self) -> impl Future<Output = Result<Value, AgentError>>;

    /// List the aliases of every known agent, possibly including ours.
    fn people(&self) -> impl Future<Output = Result<Vec<Alias>, AgentError>>;

    /// Register our display name.
    fn register_alias(&self, name: &str) -> impl Future<Output = Result<(), AgentError>>;

    /// Deliver a letter to a peer's mailbox.
    fn send_letter(&self, letter: &OutgoingLetter) -> impl Future<Output = Result<(), AgentError>>;

    /// Remove a processed letter from our mailbox.
    fn delete_letter(&self, id: &LetterId) -> impl Future<Output = Result<(), AgentError>>;

    /// Transfer resources to a peer.
    fn send_package(
        &self,
        recipient: &Alias,
        resources: &ResourceMap,
    ) -> impl Future<Output = Result<(), AgentError>>;
}

/// Marketplace client over HTTP.
pub struct HttpMarketplace {
    client: reqwest::Client,
    base: reqwest::Url,
}

impl HttpMarketplace {
    /// Create a client for `base_url` with a per-call `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if `base_url` is not a URL that can
    /// take a path, or [`AgentError::Http`] if the HTTP client cannot be
    /// built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AgentError> {
        let base = reqwest::Url::parse(base_url)
            .map_err(|e| AgentError::Config(format!("invalid marketplace URL {base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(AgentError::Config(format!("marketplace URL {base_url} cannot take a path")));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    /// Base URL with `segments` appended, each one percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<reqwest::Url, AgentError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| AgentError::Config(format!("marketplace URL {} cannot take a path", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and fail on a non-success status.
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &str,
    ) -> Result<reqwest::Response, AgentError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(AgentError::Marketplace {
                endpoint: endpoint.to_owned(),
                status: status.as_u16(),
                body,
            });
        }
        debug!(endpoint, status = status.as_u16(), "marketplace call ok");
        Ok(response)
    }
}

impl Marketplace for HttpMarketplace {
    async fn account(&self) -> Result<Value, AgentError> {
        let response = self.execute(self.client.get(self.url(&["info"])?), "GET /info").await?;
        Ok(response.json().await?)
    }

    async fn people(&self) -> Result<Vec<Alias>, AgentError> {
        let response = self.execute(self.client.get(self.url(&["people"])?), "GET /people").await?;
        let raw: Value = response.json().await?;
        Ok(parse_people(&raw))
    }

    async fn register_alias(&self, name: &str) -> Result<(), AgentError> {
        let request = self.client.post(self.url(&["alias", name])?);
        self.execute(request, "POST /alias").await?;
        Ok(())
    }

    async fn send_letter(&self, letter: &OutgoingLetter) -> Result<(), AgentError> {
        let request = self.client.post(self.url(&["letter"])?).json(letter);
        self.execute(request, "POST /letter").await?;
        Ok(())
    }

    async fn delete_letter(&self, id: &LetterId) -> Result<(), AgentError> {
        let request = self.client.delete(self.url(&["mail", id.as_str()])?);
        self.execute(request, "DELETE /mail").await?;
        Ok(())
    }

    async fn send_package(&self, recipient: &Alias, resources: &ResourceMap) -> Result<(), AgentError> {
        let request = self
            .client
            .post(self.url(&["package", recipient.as_str()])?)
            .json(resources);
        self.execute(request, "POST /package").await?;
        Ok(())
    }
}

/// Read the peer list.
///
/// Entries may be plain strings, one-element lists, or objects carrying an
/// `alias` field. Anything else is skipped.
pub fn parse_people(raw: &Value) -> Vec<Alias> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.as_str()),
            Value::Array(inner) => inner.first().and_then(Value::as_str),
            Value::Object(object) => object
                .get("alias")
                .or_else(|| object.get("Alias"))
                .and_then(Value::as_str),
            _ => None,
        })
        .map(str::trim)
        .filter(|alias| !alias.is_empty())
        .map(Alias::from)
        .collect()
}
