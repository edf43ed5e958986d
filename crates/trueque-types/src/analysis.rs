//! Structured judgments returned by the reasoning oracle.
//!
//! Both types default to the safe outcome (`other` / `rejected`, empty maps)
//! so that any failure upstream degrades to inaction.

use serde::{Deserialize, Serialize};

use crate::enums::{LetterKind, Verdict};
use crate::resources::ResourceMap;

/// Classification of a letter plus the resource maps it mentions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferAnalysis {
    /// What kind of letter this is.
    pub kind: LetterKind,
    /// What the peer proposes to give us.
    pub offered: ResourceMap,
    /// What the peer wants from us.
    pub requested: ResourceMap,
    /// What the peer claims to have already sent us.
    pub received: ResourceMap,
}

impl OfferAnalysis {
    /// The safe default: a letter we take no action on.
    pub fn other() -> Self {
        Self::default()
    }

    /// Convenience constructor for an offer.
    pub fn offer(offered: ResourceMap, requested: ResourceMap) -> Self {
        Self {
            kind: LetterKind::Offer,
            offered,
            requested,
            received: ResourceMap::new(),
        }
    }

    /// Convenience constructor for a confirmation.
    pub fn confirmation(received: ResourceMap, requested: ResourceMap) -> Self {
        Self {
            kind: LetterKind::Confirmation,
            offered: ResourceMap::new(),
            requested,
            received,
        }
    }
}

/// The oracle's adjudication of an offer.
///
/// The maps are the terms the oracle suggests honoring. The evaluator checks
/// they never expand the raw offer before using them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjudication {
    /// Accept or reject.
    pub verdict: Verdict,
    /// Adjusted map of what we receive.
    pub offered: ResourceMap,
    /// Adjusted map of what we send.
    pub requested: ResourceMap,
}

impl Adjudication {
    /// The safe default: rejected, no terms.
    pub fn rejected() -> Self {
        Self::default()
    }

    /// An acceptance with the given terms.
    pub const fn accepted(offered: ResourceMap, requested: ResourceMap) -> Self {
        Self {
            verdict: Verdict::Accepted,
            offered,
            requested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_safe() {
        let analysis = OfferAnalysis::other();
        assert_eq!(analysis.kind, LetterKind::Other);
        assert!(analysis.offered.is_empty() && analysis.requested.is_empty() && analysis.received.is_empty());

        let adjudication = Adjudication::rejected();
        assert_eq!(adjudication.verdict, Verdict::Rejected);
    }
}
