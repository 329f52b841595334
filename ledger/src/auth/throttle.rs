//! # Login Throttling
//!
//! Tracks failed login attempts per identity and refuses further
//! attempts once an identity has failed too many times in a row. The
//! lockout lifts on its own after the window elapses — measured from
//! the *last* failure — or immediately on a successful login.
//!
//! ## Guarantees, and the lack thereof
//!
//! This is a best-effort rate limiter, not a security boundary:
//!
//! - State is process-local and dies with the process.
//! - Identities are raw strings. `Bob@x.com` and `bob@x.com` count
//!   separately; normalize upstream if you want otherwise.
//! - Concurrent failures for one identity may race (two attempts both
//!   reading count 4 and both writing 5). An attacker gains at most one
//!   extra attempt per race won, which doesn't move the needle against
//!   a 5-attempt budget.
//!
//! Entries are evaluated lazily on each attempt *and* swept by the
//! server's maintenance loop, so the map doesn't grow without bound
//! with every identity anyone ever mistyped.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::time::Duration as StdDuration;

use crate::config::{LOCKOUT_WINDOW, MAX_LOGIN_ATTEMPTS};
use crate::error::{LedgerError, LedgerResult};

/// Failure bookkeeping for one identity.
#[derive(Debug, Clone, Copy)]
struct FailureEntry {
    /// Consecutive failures since the last success or expiry.
    failures: u32,
    /// When the most recent failure happened.
    last_failure: DateTime<Utc>,
}

/// Outcome of the pre-verification gate for one identity.
enum Gate {
    /// Under the limit (or unknown identity) — proceed.
    Clear,
    /// Over the limit and still inside the window — refuse.
    Locked,
    /// Over the limit but the window has elapsed — clear and proceed.
    Expired,
}

/// Per-identity failed-login throttle.
///
/// Explicitly owned and injected (wrapped in an `Arc`) rather than a
/// process global, so tests get a fresh one each and a future
/// multi-instance deployment can swap in a shared implementation.
#[derive(Debug)]
pub struct LoginThrottle {
    attempts: DashMap<String, FailureEntry>,
    max_attempts: u32,
    lockout_window: Duration,
}

impl LoginThrottle {
    /// Creates a throttle with explicit limits.
    pub fn new(max_attempts: u32, lockout_window: StdDuration) -> Self {
        Self {
            attempts: DashMap::new(),
            max_attempts,
            lockout_window: Duration::from_std(lockout_window)
                .expect("lockout window fits chrono range"),
        }
    }

    /// Gate an attempt for `identity`. Must be called *before* the
    /// credential check — a locked-out identity doesn't get to burn
    /// CPU on Argon2, let alone learn whether its password was right.
    ///
    /// # Errors
    ///
    /// [`LedgerError::TooManyAttempts`] while the identity is locked
    /// out. The failure state is not mutated by the gate itself.
    pub fn check(&self, identity: &str) -> LedgerResult<()> {
        self.check_at(identity, Utc::now())
    }

    /// [`check`](Self::check) with an explicit clock, for tests.
    pub fn check_at(&self, identity: &str, now: DateTime<Utc>) -> LedgerResult<()> {
        // Decide under the shard read lock, mutate after releasing it —
        // removing while holding the entry guard would deadlock.
        let gate = match self.attempts.get(identity) {
            Some(entry) if entry.failures >= self.max_attempts => {
                if now.signed_duration_since(entry.last_failure) < self.lockout_window {
                    Gate::Locked
                } else {
                    Gate::Expired
                }
            }
            _ => Gate::Clear,
        };

        match gate {
            Gate::Clear => Ok(()),
            Gate::Locked => Err(LedgerError::TooManyAttempts),
            Gate::Expired => {
                self.attempts.remove(identity);
                Ok(())
            }
        }
    }

    /// Record a failed credential check for `identity`.
    pub fn record_failure(&self, identity: &str) {
        self.record_failure_at(identity, Utc::now());
    }

    /// [`record_failure`](Self::record_failure) with an explicit clock.
    pub fn record_failure_at(&self, identity: &str, now: DateTime<Utc>) {
        self.attempts
            .entry(identity.to_string())
            .and_modify(|entry| {
                entry.failures += 1;
                entry.last_failure = now;
            })
            .or_insert(FailureEntry {
                failures: 1,
                last_failure: now,
            });
    }

    /// Clear all failure state for `identity` after a successful login.
    pub fn record_success(&self, identity: &str) {
        self.attempts.remove(identity);
    }

    /// Drop every entry whose last failure is older than the lockout
    /// window. Called periodically by the server's maintenance loop.
    /// Returns the number of entries evicted, for the logs.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    /// [`sweep_expired`](Self::sweep_expired) with an explicit clock.
    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.attempts.len();
        self.attempts
            .retain(|_, entry| now.signed_duration_since(entry.last_failure) < self.lockout_window);
        before - self.attempts.len()
    }

    /// Number of identities currently tracked. Exposed for metrics and
    /// tests; not part of any workflow.
    pub fn tracked_identities(&self) -> usize {
        self.attempts.len()
    }
}

impl Default for LoginThrottle {
    /// A throttle with the service's configured limits.
    fn default() -> Self {
        Self::new(MAX_LOGIN_ATTEMPTS, LOCKOUT_WINDOW)
    }
}
