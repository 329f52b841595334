//! User records and their public projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::query::Queryable;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A persisted user account.
///
/// This is the store-internal shape — it includes the password hash and
/// must never be serialized onto the wire. Handlers return
/// [`UserProfile`] instead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Opaque account identifier (UUID v4, hyphenated).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Login identity. Unique across the store.
    pub email: String,
    /// Argon2id hash of the password, PHC string format. Never the
    /// plaintext, never on the wire.
    pub password: String,
    /// Account balance in the smallest currency unit. The transfer
    /// workflow keeps this from going negative; nothing else touches it.
    pub balance: u64,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Creates a new account with a fresh id and the given starting
    /// balance. `password` must already be hashed — this constructor
    /// does not hash, on purpose, so the store stays oblivious to
    /// password handling.
    pub fn new(name: &str, email: &str, password_hash: &str, balance: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            password: password_hash.to_string(),
            balance,
            created_at: Utc::now(),
        }
    }

    /// The outward-facing projection of this account.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            balance: self.balance,
        }
    }
}

impl Queryable for User {
    fn text_field(&self, field: &str) -> Option<String> {
        match field {
            "id" => Some(self.id.clone()),
            "name" => Some(self.name.clone()),
            "email" => Some(self.email.clone()),
            _ => None,
        }
    }

    fn numeric_field(&self, field: &str) -> Option<u64> {
        (field == "balance").then_some(self.balance)
    }

    fn date_field(&self, _field: &str) -> Option<DateTime<Utc>> {
        None
    }
}

// ---------------------------------------------------------------------------
// UserProfile
// ---------------------------------------------------------------------------

/// The public shape of a user: id plus the whitelisted fields.
///
/// Passwords are not an omission here — they are structurally absent,
/// so no serializer configuration mistake can ever leak one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub balance: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User::new("Alice", "alice@example.com", "$argon2id$stub", 1000)
    }

    #[test]
    fn new_users_get_distinct_ids() {
        assert_ne!(alice().id, alice().id);
    }

    #[test]
    fn profile_carries_no_password() {
        let user = alice();
        let json = serde_json::to_value(user.profile()).expect("serialize profile");
        assert!(json.get("password").is_none());
        assert_eq!(json["email"], "alice@example.com");
        assert_eq!(json["balance"], 1000);
    }

    #[test]
    fn queryable_fields() {
        let user = alice();
        assert_eq!(user.text_field("name").as_deref(), Some("Alice"));
        assert_eq!(user.text_field("email").as_deref(), Some("alice@example.com"));
        assert_eq!(user.numeric_field("balance"), Some(1000));
        // Balance is numeric-only: it must not fall back to substring
        // matching through the text accessor.
        assert_eq!(user.text_field("balance"), None);
        assert_eq!(user.date_field("created_at"), None);
    }
}
