//! # Login Workflow
//!
//! Wires the throttle, the credential check, and the session store
//! together in the one order that is safe:
//!
//! 1. Throttle gate — a locked-out identity is refused before any
//!    credential work happens.
//! 2. Credential check — account lookup by email plus Argon2id verify.
//!    "No such account" and "wrong password" are deliberately the same
//!    failure from the outside.
//! 3. On failure: count it. On success: clear the counter, mint a
//!    session.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::auth::password;
use crate::auth::{LoginThrottle, Session, SessionStore};
use crate::error::{LedgerError, LedgerResult};
use crate::store::LedgerDb;

/// The login workflow.
#[derive(Clone)]
pub struct AuthService {
    db: Arc<LedgerDb>,
    throttle: Arc<LoginThrottle>,
    sessions: Arc<SessionStore>,
}

impl AuthService {
    /// Builds the workflow from its injected collaborators.
    pub fn new(db: Arc<LedgerDb>, throttle: Arc<LoginThrottle>, sessions: Arc<SessionStore>) -> Self {
        Self {
            db,
            throttle,
            sessions,
        }
    }

    /// Attempt a login.
    ///
    /// # Errors
    ///
    /// [`LedgerError::TooManyAttempts`] while the identity is locked
    /// out, [`LedgerError::InvalidCredentials`] for a bad email or
    /// password.
    pub fn login(&self, email: &str, password_plain: &str) -> LedgerResult<Session> {
        self.login_at(email, password_plain, Utc::now())
    }

    /// [`login`](Self::login) with an explicit clock, for tests.
    pub fn login_at(
        &self,
        email: &str,
        password_plain: &str,
        now: DateTime<Utc>,
    ) -> LedgerResult<Session> {
        self.throttle.check_at(email, now)?;

        let account = match self.db.get_user_by_email(email)? {
            Some(user) if password::password_matches(password_plain, &user.password)? => Some(user),
            _ => None,
        };

        match account {
            Some(user) => {
                self.throttle.record_success(email);
                let session = self.sessions.issue_at(&user, now);
                tracing::info!(user_id = %user.id, "login succeeded");
                Ok(session)
            }
            None => {
                self.throttle.record_failure_at(email, now);
                tracing::warn!(identity = %email, "login failed");
                Err(LedgerError::InvalidCredentials)
            }
        }
    }

    /// The session store, for the HTTP layer's auth middleware.
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::User;
    use chrono::Duration;

    const EMAIL: &str = "alice@example.com";

    fn t0() -> DateTime<Utc> {
        "2024-06-01T12:00:00Z".parse().expect("test timestamp")
    }

    fn service() -> AuthService {
        let db = Arc::new(LedgerDb::open_temporary().unwrap());
        let phc = password::hash_password("correct horse").unwrap();
        db.create_user(&User::new("Alice", EMAIL, &phc, 100)).unwrap();
        AuthService::new(
            db,
            Arc::new(LoginThrottle::default()),
            Arc::new(SessionStore::default()),
        )
    }

    #[test]
    fn correct_credentials_yield_a_session() {
        let auth = service();
        let session = auth.login_at(EMAIL, "correct horse", t0()).expect("login");
        assert_eq!(session.email, EMAIL);
        assert!(auth.sessions().resolve_at(&session.token, t0()).is_some());
    }

    #[test]
    fn wrong_password_and_unknown_email_look_identical() {
        let auth = service();
        let a = auth.login_at(EMAIL, "wrong", t0()).unwrap_err();
        let b = auth.login_at("nobody@example.com", "wrong", t0()).unwrap_err();
        assert!(matches!(a, LedgerError::InvalidCredentials));
        assert!(matches!(b, LedgerError::InvalidCredentials));
    }

    #[test]
    fn lockout_after_five_failures_even_with_correct_password() {
        let auth = service();
        for _ in 0..5 {
            let err = auth.login_at(EMAIL, "wrong", t0()).unwrap_err();
            assert!(matches!(err, LedgerError::InvalidCredentials));
        }

        // Locked out now — the right password doesn't help, and the
        // error says "come back later", not "wrong password".
        let err = auth
            .login_at(EMAIL, "correct horse", t0() + Duration::minutes(5))
            .unwrap_err();
        assert!(matches!(err, LedgerError::TooManyAttempts));
    }

    #[test]
    fn lockout_expires_and_correct_login_clears_the_counter() {
        let auth = service();
        for _ in 0..5 {
            auth.login_at(EMAIL, "wrong", t0()).unwrap_err();
        }

        let after_window = t0() + Duration::minutes(30);
        let session = auth
            .login_at(EMAIL, "correct horse", after_window)
            .expect("window elapsed, correct credentials succeed");
        assert_eq!(session.email, EMAIL);

        // Counter was cleared: five fresh failures are needed to lock
        // out again.
        for _ in 0..4 {
            auth.login_at(EMAIL, "wrong", after_window).unwrap_err();
        }
        assert!(matches!(
            auth.login_at(EMAIL, "wrong", after_window).unwrap_err(),
            LedgerError::InvalidCredentials
        ));
    }

    #[test]
    fn success_clears_failures_below_the_limit() {
        let auth = service();
        for _ in 0..4 {
            auth.login_at(EMAIL, "wrong", t0()).unwrap_err();
        }
        auth.login_at(EMAIL, "correct horse", t0()).expect("still allowed");

        // A full fresh budget again.
        for _ in 0..4 {
            auth.login_at(EMAIL, "wrong", t0()).unwrap_err();
        }
        assert!(matches!(
            auth.login_at(EMAIL, "wrong", t0()).unwrap_err(),
            LedgerError::InvalidCredentials
        ));
    }
}
