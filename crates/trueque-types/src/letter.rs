//! Letters exchanged between agents through the marketplace mailbox.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{Alias, LetterId};

/// A letter read from our mailbox.
///
/// This is a point-in-time copy; the remote mailbox stays authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Letter {
    /// Mailbox identifier, used to delete the letter once processed.
    pub id: LetterId,
    /// Alias of the agent that wrote the letter.
    pub sender: Alias,
    /// Subject line.
    pub subject: String,
    /// Free-text body.
    pub body: String,
    /// ISO-8601 timestamp; lexicographic order is chronological order.
    pub timestamp: String,
}

/// Wire shape of a mailbox entry, tolerant of both field spellings the
/// marketplace has used.
#[derive(Debug, Deserialize)]
struct RawLetter {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, alias = "remi", alias = "from")]
    sender: Option<String>,
    #[serde(default, alias = "asunto")]
    subject: Option<String>,
    #[serde(default, alias = "cuerpo")]
    body: Option<String>,
    #[serde(default, alias = "fecha", alias = "date")]
    timestamp: Option<String>,
}

impl Letter {
    /// Build a letter from one mailbox entry.
    ///
    /// `key` is the mailbox map key; it is used as the id when the entry does
    /// not carry its own. Missing text fields default to empty strings so a
    /// sparse letter is still processed (and deleted) rather than stuck.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if the entry is not a JSON object.
    pub fn from_mailbox_entry(key: &str, value: &Value) -> Result<Self, serde_json::Error> {
        let raw = RawLetter::deserialize(value)?;
        Ok(Self {
            id: LetterId::new(raw.id.filter(|id| !id.is_empty()).unwrap_or_else(|| key.to_owned())),
            sender: Alias::new(raw.sender.unwrap_or_default()),
            subject: raw.subject.unwrap_or_default(),
            body: raw.body.unwrap_or_default(),
            timestamp: raw.timestamp.unwrap_or_default(),
        })
    }
}

/// Body of `POST /letter`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingLetter {
    /// Our alias.
    pub sender: Alias,
    /// Destination alias.
    pub recipient: Alias,
    /// Subject line.
    pub subject: String,
    /// Free-text body.
    pub body: String,
    /// Freshly generated unique id.
    pub id: LetterId,
    /// UTC ISO-8601 creation time.
    pub timestamp: String,
}

impl OutgoingLetter {
    /// Compose a new letter with a freshly generated id.
    pub fn compose(
        sender: Alias,
        recipient: Alias,
        subject: impl Into<String>,
        body: impl Into<String>,
        timestamp: String,
    ) -> Self {
        Self {
            sender,
            recipient,
            subject: subject.into(),
            body: body.into(),
            id: LetterId::generate(),
            timestamp,
        }
    }
}

/// A queued outbound micro-offer, sent lazily by the negotiation loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOffer {
    /// Peer the offer is addressed to.
    pub peer: Alias,
    /// Subject line.
    pub subject: String,
    /// Letter body describing the one-for-one exchange.
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_spanish_field_names() {
        let value = serde_json::json!({
            "remi": "bea",
            "dest": "ana",
            "asunto": "Trato",
            "cuerpo": "Te doy 2 madera por 2 piedra",
            "id": "abc",
            "fecha": "2025-01-02T10:00:00"
        });
        let letter = Letter::from_mailbox_entry("key", &value);
        assert!(letter.is_ok());
        let letter = letter.unwrap_or_else(|_| unreachable_letter());
        assert_eq!(letter.id.as_str(), "abc");
        assert_eq!(letter.sender.as_str(), "bea");
        assert_eq!(letter.subject, "Trato");
        assert_eq!(letter.timestamp, "2025-01-02T10:00:00");
    }

    #[test]
    fn falls_back_to_mailbox_key_for_id() {
        let value = serde_json::json!({"sender": "bea", "body": "hola"});
        let letter = Letter::from_mailbox_entry("k-1", &value).unwrap_or_else(|_| unreachable_letter());
        assert_eq!(letter.id.as_str(), "k-1");
        assert!(letter.timestamp.is_empty());
    }

    #[test]
    fn non_object_entry_is_an_error() {
        assert!(Letter::from_mailbox_entry("k", &serde_json::json!("text")).is_err());
    }

    #[test]
    fn composed_letters_get_distinct_ids() {
        let a = OutgoingLetter::compose(Alias::from("ana"), Alias::from("bea"), "s", "b", String::new());
        let b = OutgoingLetter::compose(Alias::from("ana"), Alias::from("bea"), "s", "b", String::new());
        assert_ne!(a.id, b.id);
    }

    fn unreachable_letter() -> Letter {
        Letter {
            id: LetterId::from(""),
            sender: Alias::from(""),
            subject: String::new(),
            body: String::new(),
            timestamp: String::new(),
        }
    }
}
