//! Negotiation state snapshot.
//!
//! A [`NegotiationState`] is built wholesale from one marketplace account view
//! (`GET /info`). Needs and surplus are derived at construction time and are
//! never updated independently of inventory and objective: a new account view
//! means a new snapshot.
//!
//! The marketplace has used several spellings for the same keys, so lookup
//! tolerates both the capitalised Spanish keys and lowercase or English
//! variants, and an alias encoded either as a string or as a one-element list.

use serde_json::{Map, Value};
use tracing::warn;
use trueque_types::resources::{self, parse_resource_map, quantity_of};
use trueque_types::{Alias, Letter, LetterId, ResourceMap};

use crate::error::StateError;

const ALIAS_KEYS: &[&str] = &["Alias", "alias"];
const INVENTORY_KEYS: &[&str] = &["Recursos", "recursos", "Inventory", "inventory"];
const OBJECTIVE_KEYS: &[&str] = &["Objetivo", "objetivo", "Objective", "objective"];
const MAILBOX_KEYS: &[&str] = &["Buzon", "buzon", "Buzón", "Mailbox", "mailbox"];

/// Point-in-time view of our account in the marketplace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationState {
    alias: Alias,
    inventory: ResourceMap,
    objective: ResourceMap,
    needs: ResourceMap,
    surplus: ResourceMap,
    mailbox: Vec<Letter>,
    scarce_resource: String,
}

/// Borrowed view of the quantities the policy functions decide on.
#[derive(Debug, Clone, Copy)]
pub struct PolicyView<'a> {
    /// Resources still short of the objective.
    pub needs: &'a ResourceMap,
    /// Resources held beyond the objective, scarce resource excluded.
    pub surplus: &'a ResourceMap,
    /// Current holdings.
    pub inventory: &'a ResourceMap,
    /// Name of the scarce resource.
    pub scarce_resource: &'a str,
    /// Units of the scarce resource held beyond its objective.
    pub tradeable_scarce: u32,
}

impl NegotiationState {
    /// Build a snapshot from a raw `/info` response.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::MissingAlias`] when no alias is present,
    /// [`StateError::NotAnObject`] when the response is not an object, and
    /// [`StateError::InvalidQuantity`] when inventory or objective holds a
    /// quantity that is not a non-negative integer.
    pub fn from_account(info: &Value, scarce_resource: &str) -> Result<Self, StateError> {
        let object = info.as_object().ok_or(StateError::NotAnObject)?;

        let alias = extract_alias(object).ok_or(StateError::MissingAlias)?;

        let inventory = parse_resource_map(lookup(object, INVENTORY_KEYS))
            .map_err(|source| StateError::InvalidQuantity { field: "inventory", source })?;
        let objective = parse_resource_map(lookup(object, OBJECTIVE_KEYS))
            .map_err(|source| StateError::InvalidQuantity { field: "objective", source })?;

        let mailbox = extract_mailbox(lookup(object, MAILBOX_KEYS));

        Ok(Self::from_parts(alias, inventory, objective, mailbox, scarce_resource))
    }

    /// Build a snapshot from already-typed parts, deriving needs and surplus.
    pub fn from_parts(
        alias: Alias,
        inventory: ResourceMap,
        objective: ResourceMap,
        mut mailbox: Vec<Letter>,
        scarce_resource: &str,
    ) -> Self {
        let needs = compute_needs(&inventory, &objective);
        let surplus = compute_surplus(&inventory, &objective, scarce_resource);
        sort_oldest_first(&mut mailbox);
        Self {
            alias,
            inventory,
            objective,
            needs,
            surplus,
            mailbox,
            scarce_resource: scarce_resource.to_owned(),
        }
    }

    /// Our alias.
    pub const fn alias(&self) -> &Alias {
        &self.alias
    }

    /// Current holdings.
    pub const fn inventory(&self) -> &ResourceMap {
        &self.inventory
    }

    /// Target holdings.
    pub const fn objective(&self) -> &ResourceMap {
        &self.objective
    }

    /// Resources short of the objective.
    pub const fn needs(&self) -> &ResourceMap {
        &self.needs
    }

    /// Resources we can offer (never contains the scarce resource).
    pub const fn surplus(&self) -> &ResourceMap {
        &self.surplus
    }

    /// Mailbox contents, oldest first.
    pub fn mailbox(&self) -> &[Letter] {
        &self.mailbox
    }

    /// Name of the scarce resource.
    pub fn scarce_resource(&self) -> &str {
        &self.scarce_resource
    }

    /// Borrow the quantities the policy decides on.
    pub fn view(&self) -> PolicyView<'_> {
        PolicyView {
            needs: &self.needs,
            surplus: &self.surplus,
            inventory: &self.inventory,
            scarce_resource: &self.scarce_resource,
            tradeable_scarce: self.tradeable_scarce(),
        }
    }

    /// True iff every objective resource is held in at least the target
    /// quantity. Resources outside the objective are irrelevant.
    pub fn has_reached_objective(&self) -> bool {
        has_reached_objective(&self.inventory, &self.objective)
    }

    /// Units of the scarce resource held beyond its own objective.
    ///
    /// Only used when no other surplus exists: to propose a last-resort
    /// micro-offer and to pay it back. Never advertised.
    pub fn tradeable_scarce(&self) -> u32 {
        quantity_of(&self.inventory, &self.scarce_resource)
            .saturating_sub(quantity_of(&self.objective, &self.scarce_resource))
    }
}

/// `needs[r] = max(0, objective[r] - inventory[r])`, zero entries omitted.
pub fn compute_needs(inventory: &ResourceMap, objective: &ResourceMap) -> ResourceMap {
    objective
        .iter()
        .filter_map(|(resource, &target)| {
            let short = target.saturating_sub(quantity_of(inventory, resource));
            (short > 0).then(|| (resource.clone(), short))
        })
        .collect()
}

/// Holdings beyond the objective, plus holdings outside the objective,
/// excluding the scarce resource.
pub fn compute_surplus(
    inventory: &ResourceMap,
    objective: &ResourceMap,
    scarce_resource: &str,
) -> ResourceMap {
    inventory
        .iter()
        .filter(|(resource, _)| resource.as_str() != scarce_resource)
        .filter_map(|(resource, &held)| {
            let extra = held.saturating_sub(quantity_of(objective, resource));
            (extra > 0).then(|| (resource.clone(), extra))
        })
        .collect()
}

/// True iff `inventory[r] >= objective[r]` for every `r` in `objective`.
pub fn has_reached_objective(inventory: &ResourceMap, objective: &ResourceMap) -> bool {
    objective
        .iter()
        .all(|(resource, &target)| quantity_of(inventory, resource) >= target)
}

/// Sort letters by ascending timestamp, ties broken by id.
pub fn sort_oldest_first(letters: &mut [Letter]) {
    letters.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
}

/// First present, non-null value among `keys`.
fn lookup<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> &'a Value {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
        .unwrap_or(&Value::Null)
}

fn extract_alias(object: &Map<String, Value>) -> Option<Alias> {
    let raw = lookup(object, ALIAS_KEYS);
    let alias = match raw {
        Value::String(s) => s.trim(),
        Value::Array(items) => items.first().and_then(Value::as_str).map(str::trim)?,
        _ => return None,
    };
    (!alias.is_empty()).then(|| Alias::new(alias))
}

/// Read mailbox letters from either an id-keyed object or a list.
///
/// Entries that are not objects are kept as letters with the raw value as
/// their body, so they still get deleted after processing.
fn extract_mailbox(raw: &Value) -> Vec<Letter> {
    let entries: Vec<(String, &Value)> = match raw {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        Value::Null => Vec::new(),
        other => {
            warn!(mailbox = %other, "unexpected mailbox encoding, ignoring");
            Vec::new()
        }
    };

    entries
        .into_iter()
        .map(|(key, value)| {
            Letter::from_mailbox_entry(&key, value).unwrap_or_else(|e| {
                warn!(letter_key = key, error = %e, "malformed mailbox entry, keeping raw body");
                Letter {
                    id: LetterId::new(key.clone()),
                    sender: Alias::new(String::new()),
                    subject: String::new(),
                    body: value.to_string(),
                    timestamp: String::new(),
                }
            })
        })
        .collect()
}

/// Total units we are short of the objective.
pub fn total_needed(state: &NegotiationState) -> u64 {
    resources::total(state.needs())
}
