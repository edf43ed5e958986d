//! Offer evaluation.
//!
//! [`evaluate_offer`] turns a classified offer and the oracle's adjudication
//! into a verdict. The oracle's output is advisory: every rule below is
//! re-checked here against the current snapshot.
//!
//! 1. The raw offer must name both sides (`offered` and `requested`).
//! 2. The adjudication must accept, and may only narrow the raw terms.
//! 3. The request is adjusted: resources we need are stripped (unless we
//!    hold surplus of them), then the request is scaled down to the offered
//!    total.
//! 4. Acceptance rules: everything offered is needed, nothing requested is
//!    needed, stock covers the request, no scarce resource, and we send no
//!    more than we receive (waived when the offer completes the objective).
//!
//! There is no partial rejection: the adjustment in step 3 is the only way
//! a subset of an offer gets accepted.

use trueque_types::resources::{is_subset, quantity_of, total};
use trueque_types::{Adjudication, OfferAnalysis, ResourceMap, Verdict};

use crate::gates::{GateFailure, check_export};
use crate::state::PolicyView;

/// Why an offer was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OfferRejection {
    /// The letter does not say both what is offered and what is requested.
    #[error("offer without clear terms (offered or requested is empty)")]
    NoClearTerms,

    /// The oracle rejected the offer.
    #[error("offer rejected by adjudication")]
    Adjudicated,

    /// The adjudication named resources or quantities beyond the raw offer.
    #[error("adjudication expanded the original offer")]
    Expanded,

    /// Something offered is not something we need.
    #[error("'{0}' is offered but not needed")]
    NotNeeded(String),

    /// Nothing is left to send after adjustment.
    #[error("nothing left to send after adjusting the request")]
    NothingToSend,

    /// An export gate failed.
    #[error(transparent)]
    Gate(#[from] GateFailure),

    /// We would send more units than we receive.
    #[error("would send {send} units for {receive} received")]
    Unbalanced {
        /// Units we would send.
        send: u64,
        /// Units we would receive.
        receive: u64,
    },
}

/// Outcome of evaluating one offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferVerdict {
    /// Accepted or rejected; on rejection, the reason.
    pub outcome: Result<(), OfferRejection>,
    /// Terms we expect to receive.
    pub offered: ResourceMap,
    /// Terms as adjusted (what the peer gets if accepted).
    pub requested: ResourceMap,
    /// Concrete package to send. Non-empty iff accepted.
    pub to_send: ResourceMap,
}

impl OfferVerdict {
    /// True when the offer is accepted.
    pub const fn is_accepted(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Verdict as the shared enum.
    pub const fn verdict(&self) -> Verdict {
        if self.is_accepted() { Verdict::Accepted } else { Verdict::Rejected }
    }

    /// Human-readable reason, for logging.
    pub fn reason(&self) -> String {
        match &self.outcome {
            Ok(()) => "offer accepted".to_owned(),
            Err(rejection) => rejection.to_string(),
        }
    }

    fn rejected(rejection: OfferRejection, offered: ResourceMap, requested: ResourceMap) -> Self {
        Self {
            outcome: Err(rejection),
            offered,
            requested,
            to_send: ResourceMap::new(),
        }
    }
}

/// True when an offer names both what it gives and what it wants.
///
/// Offers without clear terms are rejected before the oracle is asked to
/// adjudicate them.
pub fn has_clear_terms(analysis: &OfferAnalysis) -> bool {
    !analysis.offered.is_empty() && !analysis.requested.is_empty()
}

/// Evaluate an offer against the current snapshot.
pub fn evaluate_offer(
    analysis: &OfferAnalysis,
    adjudication: &Adjudication,
    view: &PolicyView<'_>,
) -> OfferVerdict {
    if !has_clear_terms(analysis) {
        return OfferVerdict::rejected(
            OfferRejection::NoClearTerms,
            analysis.offered.clone(),
            analysis.requested.clone(),
        );
    }

    let offered = non_empty_or(&adjudication.offered, &analysis.offered);
    let requested = non_empty_or(&adjudication.requested, &analysis.requested);

    if adjudication.verdict != Verdict::Accepted {
        return OfferVerdict::rejected(OfferRejection::Adjudicated, offered, requested);
    }

    if !is_subset(&offered, &analysis.offered) || !is_subset(&requested, &analysis.requested) {
        return OfferVerdict::rejected(OfferRejection::Expanded, offered, requested);
    }

    // `adjusted` never exceeds the offered total, so the waiver cannot change
    // the outcome here; it is still passed so the balance rule reads whole.
    let completes = completes_objective(&offered, view.needs);
    let adjusted = adjust_request(&offered, &requested, view);

    match check_rules(&offered, &adjusted, view, completes) {
        Ok(()) => OfferVerdict {
            outcome: Ok(()),
            offered,
            to_send: adjusted.clone(),
            requested: adjusted,
        },
        Err(rejection) => OfferVerdict::rejected(rejection, offered, adjusted),
    }
}

/// True when receiving `offered` would leave no outstanding need.
pub fn completes_objective(offered: &ResourceMap, needs: &ResourceMap) -> bool {
    needs
        .iter()
        .all(|(resource, &short)| quantity_of(offered, resource) >= short)
}

/// Narrow a request before the acceptance rules are checked.
///
/// Resources we need are dropped unless surplus covers them. A request
/// whose total exceeds the offered total is then scaled down to match it.
/// The request is never scaled up.
pub fn adjust_request(
    offered: &ResourceMap,
    requested: &ResourceMap,
    view: &PolicyView<'_>,
) -> ResourceMap {
    let stripped: ResourceMap = requested
        .iter()
        .filter(|(resource, _)| {
            quantity_of(view.needs, resource) == 0 || quantity_of(view.surplus, resource) > 0
        })
        .map(|(resource, &q)| (resource.clone(), q))
        .collect();

    let offered_total = total(offered);
    if total(&stripped) <= offered_total {
        stripped
    } else {
        scale_down(&stripped, offered_total)
    }
}

/// Scale `map` down so its total equals `target`.
///
/// Each quantity is scaled proportionally and floored; the units lost to
/// flooring are handed back one at a time in key order, never exceeding a
/// resource's original quantity. Zero entries are dropped.
pub fn scale_down(map: &ResourceMap, target: u64) -> ResourceMap {
    let current = total(map);
    if current <= target {
        return map.clone();
    }

    let mut scaled: Vec<(String, u64, u64)> = map
        .iter()
        .map(|(resource, &q)| {
            let q = u64::from(q);
            let share = q
                .checked_mul(target)
                .and_then(|product| product.checked_div(current))
                .unwrap_or(0);
            (resource.clone(), share, q)
        })
        .collect();

    let assigned: u64 = scaled.iter().map(|(_, share, _)| *share).sum();
    let mut remainder = target.saturating_sub(assigned);
    while remainder > 0 {
        let mut progressed = false;
        for (_, share, cap) in &mut scaled {
            if remainder == 0 {
                break;
            }
            if *share < *cap {
                *share = share.saturating_add(1);
                remainder = remainder.saturating_sub(1);
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    scaled
        .into_iter()
        .filter_map(|(resource, share, _)| {
            let share = u32::try_from(share).ok()?;
            (share > 0).then_some((resource, share))
        })
        .collect()
}

/// Acceptance rules on an already adjusted request.
///
/// `completes` waives the balance rule. Only a request that was not scaled
/// down can trip that rule, so the waiver matters to callers passing an
/// unadjusted `to_send`.
fn check_rules(
    offered: &ResourceMap,
    to_send: &ResourceMap,
    view: &PolicyView<'_>,
    completes: bool,
) -> Result<(), OfferRejection> {
    if let Some(resource) = offered.keys().find(|r| quantity_of(view.needs, r) == 0) {
        return Err(OfferRejection::NotNeeded(resource.clone()));
    }

    if to_send.is_empty() {
        return Err(OfferRejection::NothingToSend);
    }

    check_export(to_send, view)?;

    let send = total(to_send);
    let receive = total(offered);
    if send > receive && !completes {
        return Err(OfferRejection::Unbalanced { send, receive });
    }

    Ok(())
}

fn non_empty_or(preferred: &ResourceMap, fallback: &ResourceMap) -> ResourceMap {
    if preferred.is_empty() { fallback.clone() } else { preferred.clone() }
}
