//! Confirmation handling.
//!
//! A confirmation is a peer's claim that it already sent us resources,
//! possibly asking for something in return. The claim is taken at face
//! value: the received amounts are not cross-checked against an inventory
//! delta.
//!
//! The reciprocal send uses the last-resort gate, so a peer who paid for a
//! micro-offer in the scarce resource gets it.

use trueque_types::{OfferAnalysis, ResourceMap};

use crate::gates::{GateFailure, check_reciprocal_export};
use crate::state::PolicyView;

/// Outcome of handling one confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationVerdict {
    /// The letter claims resources were sent to us.
    pub has_received: bool,
    /// Resources were received and nothing is asked in return.
    pub is_gift: bool,
    /// A reciprocal package is authorised.
    pub can_send: bool,
    /// Our holdings changed or are about to change.
    pub resources_changed: bool,
    /// What the peer claims to have sent.
    pub received: ResourceMap,
    /// What the peer asks for in return.
    pub requested: ResourceMap,
    /// Package to send back. Non-empty iff `can_send`.
    pub to_send: ResourceMap,
    /// Gate that blocked the reciprocal send, if any.
    pub blocked_by: Option<GateFailure>,
}

impl ConfirmationVerdict {
    /// Human-readable reason, for logging.
    pub fn reason(&self) -> String {
        if !self.has_received {
            return "confirmation without clear received resources".to_owned();
        }
        if self.is_gift {
            return "nothing asked in return, treated as a gift".to_owned();
        }
        match &self.blocked_by {
            Some(gate) => gate.to_string(),
            None => "reciprocal package authorised".to_owned(),
        }
    }
}

/// Decide whether and what to send back for a confirmation.
pub fn handle_confirmation(analysis: &OfferAnalysis, view: &PolicyView<'_>) -> ConfirmationVerdict {
    let received = analysis.received.clone();
    let requested = analysis.requested.clone();

    if received.is_empty() {
        return ConfirmationVerdict {
            has_received: false,
            is_gift: false,
            can_send: false,
            resources_changed: false,
            received,
            requested,
            to_send: ResourceMap::new(),
            blocked_by: None,
        };
    }

    if requested.is_empty() {
        return ConfirmationVerdict {
            has_received: true,
            is_gift: true,
            can_send: false,
            resources_changed: true,
            received,
            requested,
            to_send: ResourceMap::new(),
            blocked_by: None,
        };
    }

    match check_reciprocal_export(&requested, view) {
        Ok(()) => ConfirmationVerdict {
            has_received: true,
            is_gift: false,
            can_send: true,
            resources_changed: true,
            received,
            to_send: requested.clone(),
            requested,
            blocked_by: None,
        },
        Err(gate) => ConfirmationVerdict {
            has_received: true,
            is_gift: false,
            can_send: false,
            resources_changed: false,
            received,
            requested,
            to_send: ResourceMap::new(),
            blocked_by: Some(gate),
        },
    }
}

#[cfg(test)]
mod tests {
    use trueque_types::Alias;
    use trueque_types::resources::quantity_of;

    use super::*;
    use crate::outbound::OfferQueue;
    use crate::state::NegotiationState;

    fn map(entries: &[(&str, u32)]) -> ResourceMap {
        entries.iter().map(|(k, v)| ((*k).to_owned(), *v)).collect()
    }

    fn view<'a>(needs: &'a ResourceMap, inventory: &'a ResourceMap) -> PolicyView<'a> {
        PolicyView {
            needs,
            surplus: inventory,
            inventory,
            scarce_resource: "oro",
            tradeable_scarce: quantity_of(inventory, "oro"),
        }
    }

    #[test]
    fn empty_received_is_a_no_op() {
        let (needs, inventory) = (ResourceMap::new(), map(&[("piedra", 3)]));
        let analysis = OfferAnalysis::confirmation(ResourceMap::new(), map(&[("piedra", 1)]));
        let verdict = handle_confirmation(&analysis, &view(&needs, &inventory));
        assert!(!verdict.has_received);
        assert!(!verdict.can_send && !verdict.resources_changed);
        assert!(verdict.to_send.is_empty());
    }

    #[test]
    fn received_without_request_is_a_gift() {
        let (needs, inventory) = (map(&[("madera", 5)]), ResourceMap::new());
        let analysis = OfferAnalysis::confirmation(map(&[("madera", 2)]), ResourceMap::new());
        let verdict = handle_confirmation(&analysis, &view(&needs, &inventory));
        assert!(verdict.has_received);
        assert!(verdict.is_gift);
        assert!(!verdict.can_send);
        assert!(verdict.resources_changed);
        assert!(verdict.to_send.is_empty());
    }

    #[test]
    fn reciprocal_send_is_authorised_when_gates_pass() {
        let (needs, inventory) = (map(&[("madera", 5)]), map(&[("piedra", 4)]));
        let analysis = OfferAnalysis::confirmation(map(&[("madera", 2)]), map(&[("piedra", 2)]));
        let verdict = handle_confirmation(&analysis, &view(&needs, &inventory));
        assert!(verdict.can_send);
        assert_eq!(verdict.to_send, map(&[("piedra", 2)]));
        assert_eq!(verdict.blocked_by, None);
    }

    #[test]
    fn gates_block_the_reciprocal_send() {
        let needs = map(&[("madera", 5)]);
        let inventory = map(&[("piedra", 1), ("oro", 3), ("madera", 1)]);
        let v = view(&needs, &inventory);

        let scarce = OfferAnalysis::confirmation(map(&[("madera", 2)]), map(&[("oro", 1)]));
        let verdict = handle_confirmation(&scarce, &v);
        assert!(!verdict.can_send);
        assert_eq!(verdict.blocked_by, Some(GateFailure::ScarceResource("oro".to_owned())));

        let needed = OfferAnalysis::confirmation(map(&[("lana", 2)]), map(&[("madera", 1)]));
        let verdict = handle_confirmation(&needed, &v);
        assert_eq!(verdict.blocked_by, Some(GateFailure::NeededResource("madera".to_owned())));

        let short = OfferAnalysis::confirmation(map(&[("madera", 2)]), map(&[("piedra", 2)]));
        let verdict = handle_confirmation(&short, &v);
        assert!(matches!(verdict.blocked_by, Some(GateFailure::InsufficientStock { .. })));
        assert!(verdict.reason().contains("piedra"));
    }

    #[test]
    fn scarce_micro_offer_is_paid_back_on_confirmation() {
        let state = NegotiationState::from_parts(
            Alias::from("ana"),
            map(&[("oro", 5)]),
            map(&[("oro", 1), ("madera", 1)]),
            Vec::new(),
            "oro",
        );
        assert!(state.surplus().is_empty());

        let mut queue = OfferQueue::build(
            &[Alias::from("bea")],
            state.needs(),
            state.surplus(),
            state.scarce_resource(),
            state.tradeable_scarce(),
            1,
        );
        let offer = queue.pop().map(|o| o.body).unwrap_or_default();
        assert!(offer.contains("1 de oro a cambio de 1 de madera"));

        let paid = OfferAnalysis::confirmation(map(&[("madera", 1)]), map(&[("oro", 1)]));
        let verdict = handle_confirmation(&paid, &state.view());
        assert!(verdict.can_send, "{}", verdict.reason());
        assert_eq!(verdict.to_send, map(&[("oro", 1)]));

        let greedy = OfferAnalysis::confirmation(map(&[("madera", 1)]), map(&[("oro", 5)]));
        let verdict = handle_confirmation(&greedy, &state.view());
        assert_eq!(verdict.blocked_by, Some(GateFailure::ScarceResource("oro".to_owned())));
    }
}
