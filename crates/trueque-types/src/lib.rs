//! Shared type definitions for the Trueque negotiation agent.
//!
//! This crate is the single source of truth for the data model exchanged
//! between the negotiation policy (`trueque-core`) and the I/O layer
//! (`trueque-agent`).
//!
//! # Modules
//!
//! - [`ids`] -- String newtypes for letter ids and agent aliases
//! - [`enums`] -- Letter classification and adjudication verdicts
//! - [`resources`] -- Resource quantity maps and strict quantity parsing
//! - [`letter`] -- Incoming letters, outgoing letters, queued micro-offers
//! - [`analysis`] -- Structured judgments returned by the reasoning oracle

pub mod analysis;
pub mod enums;
pub mod ids;
pub mod letter;
pub mod resources;

// Re-export all public types at crate root for convenience.
pub use analysis::{Adjudication, OfferAnalysis};
pub use enums::{LetterKind, Verdict};
pub use ids::{Alias, LetterId};
pub use letter::{Letter, OutgoingLetter, PendingOffer};
pub use resources::{QuantityError, ResourceMap};
