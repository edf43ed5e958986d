//! Trading agent for the Trueque marketplace.
//!
//! Wires the negotiation policy from `trueque-core` to the outside world:
//! the marketplace REST API and a language model acting as reasoning
//! oracle.
//!
//! # Architecture
//!
//! ```text
//! Marketplace (/info) --> StateStore --> Oracle (classify) --> re-sync
//!     --> evaluate_offer | handle_confirmation --> package + letter --> delete
//! ```
//!
//! # Modules
//!
//! - [`config`] -- Environment configuration.
//! - [`error`] -- [`AgentError`](error::AgentError).
//! - [`marketplace`] -- [`Marketplace`](marketplace::Marketplace) trait and HTTP client.
//! - [`llm`] -- LLM backends (OpenAI-compatible, Anthropic, Ollama).
//! - [`prompt`] -- Prompt templates.
//! - [`parse`] -- Tolerant parsing of LLM replies.
//! - [`oracle`] -- [`Oracle`](oracle::Oracle) trait and the LLM-backed oracle.
//! - [`runner`] -- The negotiation loop.

pub mod config;
pub mod error;
pub mod llm;
pub mod marketplace;
pub mod oracle;
pub mod parse;
pub mod prompt;
pub mod runner;

pub use error::AgentError;
pub use marketplace::{HttpMarketplace, Marketplace};
pub use oracle::{LlmOracle, Oracle};
pub use runner::{NegotiationRunner, RunSummary, StateStore};
