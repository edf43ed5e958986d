//! Resource quantity maps.
//!
//! Every inventory, objective, offer and package is a map from resource name
//! to a non-negative integer quantity. A [`BTreeMap`] keeps iteration order
//! stable, which makes logging, letter text and request scaling deterministic.
//!
//! Quantities arrive as loosely typed JSON (from the marketplace and from the
//! oracle). [`parse_resource_map`] is the single strict entry point: it
//! accepts non-negative integers and integer strings, drops zero entries, and
//! rejects anything else as a whole.

use std::collections::BTreeMap;

use serde_json::Value;

/// Resource name to quantity.
pub type ResourceMap = BTreeMap<String, u32>;

/// A quantity that could not be interpreted as a non-negative integer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuantityError {
    /// The value for `resource` is not a non-negative integer.
    #[error("invalid quantity for '{resource}': {raw}")]
    Invalid {
        /// Resource whose quantity was rejected.
        resource: String,
        /// The raw JSON value as text.
        raw: String,
    },

    /// The container is not a JSON object.
    #[error("expected a resource map object, found: {0}")]
    NotAnObject(String),
}

/// Parse a single JSON quantity.
///
/// Accepts unsigned integers, integral floats (`3.0`) and integer strings
/// (`"3"`). Returns `None` for negatives, fractions, overflow and any other
/// JSON type.
pub fn parse_quantity(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return u32::try_from(u).ok();
            }
            let f = n.as_f64()?;
            if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX) {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                return Some(f as u32);
            }
            None
        }
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

/// Parse a JSON object into a [`ResourceMap`].
///
/// `null` is treated as an empty map. Entries with quantity zero are dropped.
///
/// # Errors
///
/// Returns [`QuantityError`] if the value is not an object or any quantity is
/// not a non-negative integer. A single bad entry invalidates the whole map.
pub fn parse_resource_map(value: &Value) -> Result<ResourceMap, QuantityError> {
    let object = match value {
        Value::Null => return Ok(ResourceMap::new()),
        Value::Object(object) => object,
        other => return Err(QuantityError::NotAnObject(other.to_string())),
    };

    let mut map = ResourceMap::new();
    for (resource, raw) in object {
        let quantity = parse_quantity(raw).ok_or_else(|| QuantityError::Invalid {
            resource: resource.clone(),
            raw: raw.to_string(),
        })?;
        if quantity > 0 {
            map.insert(resource.clone(), quantity);
        }
    }
    Ok(map)
}

/// Sum of all quantities in a map, widened so it cannot overflow.
pub fn total(map: &ResourceMap) -> u64 {
    map.values().map(|&q| u64::from(q)).sum()
}

/// Quantity of `resource` in `map`, zero when absent.
pub fn quantity_of(map: &ResourceMap, resource: &str) -> u32 {
    map.get(resource).copied().unwrap_or(0)
}

/// True when `narrow` never names a resource absent from `wide` and never
/// asks for more than `wide` holds.
pub fn is_subset(narrow: &ResourceMap, wide: &ResourceMap) -> bool {
    narrow
        .iter()
        .all(|(resource, &q)| q <= quantity_of(wide, resource))
}
