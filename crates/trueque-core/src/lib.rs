//! Negotiation policy for the Trueque trading agent.
//!
//! Everything in this crate is free of I/O apart from the optional ledger
//! file: the agent crate fetches the account view and mailbox, and hands
//! borrowed views to the pure decision functions here.
//!
//! # Modules
//!
//! - [`config`] -- Policy knobs loaded from an optional YAML file.
//! - [`state`] -- [`NegotiationState`] snapshot with derived needs and surplus.
//! - [`gates`] -- Export gates shared by both decision functions.
//! - [`evaluator`] -- Offer evaluation, request adjustment and scaling.
//! - [`confirmation`] -- Handling of "I already sent you" claims.
//! - [`outbound`] -- Micro-offer queue and its letter-count throttle.
//! - [`ledger`] -- Per-peer record of accepted trades.
//! - [`letters`] -- Letter bodies and subjects sent to peers.
//!
//! [`NegotiationState`]: state::NegotiationState

pub mod config;
pub mod confirmation;
pub mod error;
pub mod evaluator;
pub mod gates;
pub mod ledger;
pub mod letters;
pub mod outbound;
pub mod state;

pub use config::{ConfigError, NegotiationConfig};
pub use confirmation::{ConfirmationVerdict, handle_confirmation};
pub use error::StateError;
pub use evaluator::{OfferRejection, OfferVerdict, evaluate_offer};
pub use ledger::{LedgerError, TradeLedger};
pub use outbound::{OfferQueue, Throttle};
pub use state::{NegotiationState, PolicyView};
