//! Outbound micro-offer queue and its throttle.
//!
//! At every sync the queue is rebuilt from the cross-product
//! peers × needs × surplus: one letter per (peer, needed resource, surplus
//! resource) proposing a small one-for-one exchange. The loop does not send
//! them all at once; [`Throttle`] releases one offer per
//! `offers_every_n_letters` letters processed.

use std::collections::VecDeque;

use trueque_types::{Alias, PendingOffer, ResourceMap};

use crate::letters::{MICRO_OFFER_SUBJECT, micro_offer_letter};

/// FIFO queue of micro-offers awaiting dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferQueue {
    pending: VecDeque<PendingOffer>,
}

impl OfferQueue {
    /// Build the queue for one sync.
    ///
    /// `surplus` must already exclude the scarce resource. When it is empty
    /// and `tradeable_scarce` units of the scarce resource are held beyond
    /// the objective, the scarce resource is proposed instead as a last
    /// resort. Each side of an offer is `quantity` units, capped by what is
    /// actually needed or spare.
    pub fn build(
        peers: &[Alias],
        needs: &ResourceMap,
        surplus: &ResourceMap,
        scarce_resource: &str,
        tradeable_scarce: u32,
        quantity: u32,
    ) -> Self {
        let fallback: ResourceMap;
        let give_side = if surplus.is_empty() && tradeable_scarce > 0 {
            fallback = [(scarce_resource.to_owned(), tradeable_scarce)].into_iter().collect();
            &fallback
        } else {
            surplus
        };

        let mut pending = VecDeque::new();
        for peer in peers {
            for (want, &short) in needs {
                for (give, &spare) in give_side {
                    let want_qty = quantity.min(short);
                    let give_qty = quantity.min(spare);
                    pending.push_back(PendingOffer {
                        peer: peer.clone(),
                        subject: MICRO_OFFER_SUBJECT.to_owned(),
                        body: micro_offer_letter(give, give_qty, want, want_qty),
                    });
                }
            }
        }
        Self { pending }
    }

    /// Take the next offer to send.
    pub fn pop(&mut self) -> Option<PendingOffer> {
        self.pending.pop_front()
    }

    /// Offers still queued.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Counts processed letters and fires once every `every` of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Throttle {
    every: u32,
    processed: u32,
}

impl Throttle {
    /// A throttle firing every `every` letters. Zero is treated as one.
    pub const fn new(every: u32) -> Self {
        Self {
            every: if every == 0 { 1 } else { every },
            processed: 0,
        }
    }

    /// Record one fully processed letter. Returns true when an offer is due.
    pub const fn record_processed(&mut self) -> bool {
        self.processed = self.processed.saturating_add(1);
        if self.processed >= self.every {
            self.processed = 0;
            true
        } else {
            false
        }
    }
}
