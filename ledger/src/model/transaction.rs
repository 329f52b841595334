//! Transaction records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::query::Queryable;

/// A persisted peer-to-peer transfer record.
///
/// The JSON field names (`userSender`, `userReceiver`, `nominal`,
/// `date`) are the wire contract inherited from the system this service
/// replaces; clients already speak it. A transaction has no secret
/// fields, so the record doubles as its own public projection.
///
/// `date` is assigned by the server at creation and never changes —
/// editing a transaction's amount rewrites history's numbers, not its
/// timeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Opaque transaction identifier (UUID v4, hyphenated).
    pub id: String,
    /// Paying account id. Weak reference — existence is checked at
    /// creation time, not enforced afterwards.
    #[serde(rename = "userSender")]
    pub user_sender: String,
    /// Receiving account id. Same referential rules as the sender.
    #[serde(rename = "userReceiver")]
    pub user_receiver: String,
    /// Transferred amount in the smallest currency unit.
    pub nominal: u64,
    /// Free-text description supplied by the caller.
    pub description: String,
    /// Server-assigned creation timestamp. Immutable.
    pub date: DateTime<Utc>,
}

impl Transaction {
    /// Creates a new record with a fresh id and the current time.
    pub fn new(user_sender: &str, user_receiver: &str, nominal: u64, description: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_sender: user_sender.to_string(),
            user_receiver: user_receiver.to_string(),
            nominal,
            description: description.to_string(),
            date: Utc::now(),
        }
    }
}

impl Queryable for Transaction {
    fn text_field(&self, field: &str) -> Option<String> {
        match field {
            "id" => Some(self.id.clone()),
            "userSender" => Some(self.user_sender.clone()),
            "userReceiver" => Some(self.user_receiver.clone()),
            "description" => Some(self.description.clone()),
            _ => None,
        }
    }

    fn numeric_field(&self, field: &str) -> Option<u64> {
        (field == "nominal").then_some(self.nominal)
    }

    fn date_field(&self, field: &str) -> Option<DateTime<Utc>> {
        (field == "date").then_some(self.date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape_uses_legacy_field_names() {
        let tx = Transaction::new("a", "b", 250, "lunch");
        let json = serde_json::to_value(&tx).expect("serialize");
        assert!(json.get("userSender").is_some());
        assert!(json.get("userReceiver").is_some());
        assert!(json.get("nominal").is_some());
        // And not the rustic names.
        assert!(json.get("user_sender").is_none());
        assert!(json.get("amount").is_none());
    }

    #[test]
    fn queryable_fields() {
        let tx = Transaction::new("sender-1", "receiver-1", 250, "Lunch Money");
        assert_eq!(tx.numeric_field("nominal"), Some(250));
        assert_eq!(tx.text_field("description").as_deref(), Some("Lunch Money"));
        assert_eq!(tx.text_field("userSender").as_deref(), Some("sender-1"));
        assert!(tx.date_field("date").is_some());
        // `nominal` must not be searchable as text.
        assert_eq!(tx.text_field("nominal"), None);
    }

    #[test]
    fn bincode_roundtrip_preserves_timestamp() {
        let tx = Transaction::new("a", "b", 99, "x");
        let bytes = bincode::serialize(&tx).expect("encode");
        let back: Transaction = bincode::deserialize(&bytes).expect("decode");
        assert_eq!(back, tx);
    }
}
