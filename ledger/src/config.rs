//! # Service Configuration & Constants
//!
//! Every magic number in TALLY lives here. If you're hardcoding a constant
//! somewhere else, you're doing it wrong and you owe the team coffee.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Login Throttling
// ---------------------------------------------------------------------------

/// Consecutive failed login attempts allowed before an identity is
/// locked out. The counter is per raw identity string — `Bob@x.com` and
/// `bob@x.com` are two different identities as far as the throttle is
/// concerned.
pub const MAX_LOGIN_ATTEMPTS: u32 = 5;

/// How long a locked-out identity stays locked out. The window is
/// measured from the *last* failed attempt, not the first.
pub const LOCKOUT_WINDOW: Duration = Duration::from_secs(30 * 60);

/// How often the background maintenance loop sweeps stale throttle
/// entries and expired sessions. Sweeping is a hygiene measure — the
/// throttle also re-checks the window lazily on every attempt, so a
/// missed sweep never extends a lockout.
pub const MAINTENANCE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// How long an issued session token stays valid. Six hours is long
/// enough for a working day's worth of API calls and short enough that
/// a leaked token has a bounded blast radius.
pub const SESSION_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Length of the random session token in bytes, before hex encoding.
/// 16 bytes = 128 bits. Guessing one is not a realistic attack.
pub const SESSION_TOKEN_BYTES: usize = 16;

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// Page number used when the client doesn't send one. Pages are 1-based
/// because this API is for humans first.
pub const DEFAULT_PAGE_NUMBER: u64 = 1;

/// Page size used when the client doesn't send one.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

// ---------------------------------------------------------------------------
// Request Validation
// ---------------------------------------------------------------------------

/// Minimum length for free-text request fields (names, emails,
/// descriptions). Empty strings are never valid input.
pub const MIN_FIELD_LENGTH: usize = 1;

/// Maximum length for free-text request fields. Enough for a verbose
/// description, not enough for your novel.
pub const MAX_FIELD_LENGTH: usize = 100;

// ---------------------------------------------------------------------------
// Network Defaults
// ---------------------------------------------------------------------------

/// Default REST API port.
pub const DEFAULT_HTTP_PORT: u16 = 8730;

/// Default metrics (Prometheus) port.
pub const DEFAULT_METRICS_PORT: u16 = 8731;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lockout_window_exceeds_sweep_interval() {
        // If the sweep ran slower than the lockout window, entries could
        // only ever be cleared lazily and the sweep would be decorative.
        assert!(MAINTENANCE_SWEEP_INTERVAL < LOCKOUT_WINDOW);
    }

    #[test]
    fn throttle_constants_sanity() {
        assert!(MAX_LOGIN_ATTEMPTS > 0);
        assert!(LOCKOUT_WINDOW.as_secs() > 0);
    }

    #[test]
    fn pagination_defaults_sanity() {
        // Page numbering is 1-based; a default of 0 would mean "before
        // the first page", which is nonsense.
        assert!(DEFAULT_PAGE_NUMBER >= 1);
        assert!(DEFAULT_PAGE_SIZE >= 1);
    }

    #[test]
    fn field_length_bounds_are_ordered() {
        assert!(MIN_FIELD_LENGTH <= MAX_FIELD_LENGTH);
    }

    #[test]
    fn http_and_metrics_ports_are_distinct() {
        assert_ne!(DEFAULT_HTTP_PORT, DEFAULT_METRICS_PORT);
    }
}
