//! # Bearer-Token Sessions
//!
//! A successful login mints a session: a random 128-bit token bound to
//! the account, valid for a fixed TTL. The HTTP layer resolves incoming
//! `Authorization: Bearer` headers through [`SessionStore::resolve`].
//!
//! Sessions are process-local — a restart logs everyone out, which for
//! a single-instance service is a feature, not a bug: there is no
//! signing key to rotate and no token that outlives the process that
//! issued it.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::RngCore;
use serde::Serialize;
use std::time::Duration as StdDuration;

use crate::config::{SESSION_TOKEN_BYTES, SESSION_TTL};
use crate::model::User;

/// An issued session. Doubles as the login response payload.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    /// The bearer token. Only ever sent to the client that logged in.
    pub token: String,
    /// The account this session authenticates.
    pub user_id: String,
    /// Denormalized for the login response; the store is authoritative.
    pub email: String,
    /// Denormalized display name, same caveat.
    pub name: String,
    /// When the token stops working.
    pub expires_at: DateTime<Utc>,
}

/// In-memory token store with TTL.
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl SessionStore {
    /// Creates a store with an explicit TTL.
    pub fn new(ttl: StdDuration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: Duration::from_std(ttl).expect("session ttl fits chrono range"),
        }
    }

    /// Mint a session for `user`.
    pub fn issue(&self, user: &User) -> Session {
        self.issue_at(user, Utc::now())
    }

    /// [`issue`](Self::issue) with an explicit clock, for tests.
    pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> Session {
        let session = Session {
            token: new_token(),
            user_id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            expires_at: now + self.ttl,
        };
        self.sessions.insert(session.token.clone(), session.clone());
        session
    }

    /// Look up a token. Expired sessions are removed on sight and
    /// reported as absent — a token is either fully valid or it isn't.
    pub fn resolve(&self, token: &str) -> Option<Session> {
        self.resolve_at(token, Utc::now())
    }

    /// [`resolve`](Self::resolve) with an explicit clock, for tests.
    pub fn resolve_at(&self, token: &str, now: DateTime<Utc>) -> Option<Session> {
        // Clone out of the guard before any removal; removing while
        // holding the entry guard would deadlock the shard.
        let session = self.sessions.get(token).map(|entry| entry.value().clone())?;
        if session.expires_at <= now {
            self.sessions.remove(token);
            return None;
        }
        Some(session)
    }

    /// Invalidate a token immediately. Unknown tokens are a no-op.
    pub fn revoke(&self, token: &str) {
        self.sessions.remove(token);
    }

    /// Drop every expired session. Called by the maintenance loop.
    /// Returns the number evicted.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    /// [`sweep_expired`](Self::sweep_expired) with an explicit clock.
    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.expires_at > now);
        before - self.sessions.len()
    }

    /// Number of live (not yet swept) sessions.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SESSION_TTL)
    }
}

/// A fresh random token, hex-encoded.
fn new_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
