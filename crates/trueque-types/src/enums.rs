//! Enumeration types shared by the policy and the oracle adapters.
//!
//! The oracle is a language model prompted in Spanish, so the serde aliases
//! accept both the Spanish and the English spelling of each variant.

use serde::{Deserialize, Serialize};

/// Classification of an incoming letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LetterKind {
    /// The peer proposes an exchange (they give X, we give Y).
    #[serde(alias = "oferta")]
    Offer,
    /// The peer claims to have already sent us resources.
    #[serde(alias = "confirmacion", alias = "confirmación")]
    Confirmation,
    /// Anything else. No automatic action is taken.
    #[default]
    #[serde(alias = "otro")]
    Other,
}

impl LetterKind {
    /// Parse a free-form kind label, case-insensitively.
    ///
    /// Unknown labels map to [`LetterKind::Other`].
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "offer" | "oferta" => Self::Offer,
            "confirmation" | "confirmacion" | "confirmación" => Self::Confirmation,
            _ => Self::Other,
        }
    }

    /// Stable lowercase name for logging.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Confirmation => "confirmation",
            Self::Other => "other",
        }
    }
}

impl core::fmt::Display for LetterKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict of an offer adjudication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The offer (possibly narrowed) is acceptable.
    #[serde(alias = "aceptada")]
    Accepted,
    /// The offer is rejected.
    #[default]
    #[serde(alias = "rechazada")]
    Rejected,
}

impl Verdict {
    /// Parse a free-form verdict label, case-insensitively.
    ///
    /// Anything that is not clearly an acceptance is a rejection.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "accepted" | "accept" | "aceptada" | "aceptar" => Self::Accepted,
            _ => Self::Rejected,
        }
    }

    /// Stable lowercase name for logging.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl core::fmt::Display for Verdict {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
