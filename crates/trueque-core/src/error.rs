//! Error types for the negotiation core.

use trueque_types::QuantityError;

/// Errors raised while building a state snapshot from the account view.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The account view carried no usable alias. Fatal to the run.
    #[error("missing alias in account view")]
    MissingAlias,

    /// The account view is not a JSON object.
    #[error("account view is not a JSON object")]
    NotAnObject,

    /// An inventory or objective quantity is not a non-negative integer.
    #[error("invalid {field} map: {source}")]
    InvalidQuantity {
        /// Which map failed (`inventory` or `objective`).
        field: &'static str,
        /// The underlying quantity error.
        source: QuantityError,
    },
}
