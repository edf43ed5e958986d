//! Export gates shared by the offer evaluator and the confirmation handler.
//!
//! Before any resource leaves our inventory, the map to send must pass three
//! checks: the scarce resource is withheld, nothing we still need is sent,
//! and we hold enough of each resource.
//!
//! The scarce resource has one exception. When we hold no other surplus, the
//! micro-offer queue proposes it as a last resort, and a peer who pays for
//! that proposal must be paid back. [`check_reciprocal_export`] allows it in
//! exactly that case, up to the units held beyond its own objective. Offers
//! go through the strict [`check_export`].

use trueque_types::ResourceMap;
use trueque_types::resources::quantity_of;

use crate::state::PolicyView;

/// Why a map of resources may not be sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateFailure {
    /// The scarce resource was requested outside the last-resort case.
    #[error("the scarce resource '{0}' is only sent as a last resort")]
    ScarceResource(String),

    /// A resource we still need for the objective was requested.
    #[error("'{0}' is needed for our own objective")]
    NeededResource(String),

    /// Not enough stock to cover the request.
    #[error("not enough '{resource}' (held {held}, requested {requested})")]
    InsufficientStock {
        /// Resource that is short.
        resource: String,
        /// Units held.
        held: u32,
        /// Units requested.
        requested: u32,
    },
}

/// Check `to_send` against the scarce, needed and stock gates. The scarce
/// resource is never allowed.
///
/// # Errors
///
/// Returns the first [`GateFailure`] found. The scarce resource is checked
/// across the whole map before the per-resource gates.
pub fn check_export(to_send: &ResourceMap, view: &PolicyView<'_>) -> Result<(), GateFailure> {
    check_with_scarce_allowance(to_send, view, 0)
}

/// Like [`check_export`], but lets up to `view.tradeable_scarce` units of the
/// scarce resource through when `view.surplus` is empty.
///
/// # Errors
///
/// Returns the first [`GateFailure`] found.
pub fn check_reciprocal_export(
    to_send: &ResourceMap,
    view: &PolicyView<'_>,
) -> Result<(), GateFailure> {
    let allowance = if view.surplus.is_empty() { view.tradeable_scarce } else { 0 };
    check_with_scarce_allowance(to_send, view, allowance)
}

fn check_with_scarce_allowance(
    to_send: &ResourceMap,
    view: &PolicyView<'_>,
    scarce_allowance: u32,
) -> Result<(), GateFailure> {
    if quantity_of(to_send, view.scarce_resource) > scarce_allowance {
        return Err(GateFailure::ScarceResource(view.scarce_resource.to_owned()));
    }

    for (resource, &requested) in to_send {
        if quantity_of(view.needs, resource) > 0 {
            return Err(GateFailure::NeededResource(resource.clone()));
        }
        let held = quantity_of(view.inventory, resource);
        if held < requested {
            return Err(GateFailure::InsufficientStock {
                resource: resource.clone(),
                held,
                requested,
            });
        }
    }

    Ok(())
}
