//! # Domain Errors
//!
//! The stable error vocabulary of the ledger. Every failure a workflow
//! can produce is one of these variants — callers (the HTTP layer, tests,
//! future CLIs) match on the variant, never on the message text.
//!
//! Store-level faults are caught at the service boundary and translated
//! into the corresponding domain error; raw sled errors never escape
//! this crate unwrapped.

use thiserror::Error;

use crate::store::DbError;

/// Errors produced by the ledger workflows.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Wrong email or password. Deliberately indistinguishable between
    /// "no such account" and "bad password" — enumeration is not a
    /// feature.
    #[error("wrong email or password")]
    InvalidCredentials,

    /// The identity is locked out after too many failed login attempts.
    #[error("too many failed login attempts, try again later")]
    TooManyAttempts,

    /// The transfer names a sender that doesn't exist.
    #[error("unknown sender: {0}")]
    UnknownSender(String),

    /// The transfer names a receiver that doesn't exist.
    #[error("unknown receiver: {0}")]
    UnknownReceiver(String),

    /// A user lookup came up empty.
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// A transaction lookup came up empty.
    #[error("unknown transaction: {0}")]
    UnknownTransaction(String),

    /// Sender and receiver are the same account. Moving money to
    /// yourself is a no-op with extra steps; we reject it outright.
    #[error("sender and receiver must be different accounts")]
    SelfTransferNotAllowed,

    /// The paying account can't cover the requested amount. Carries the
    /// balance at the moment of the check so the caller can report it.
    #[error("account does not have enough balance ({balance})")]
    InsufficientFunds {
        /// The available balance when the check failed.
        balance: u64,
    },

    /// The email is already registered to another account.
    #[error("email is already registered: {0}")]
    EmailTaken(String),

    /// The current password supplied for a password change didn't match.
    #[error("wrong password")]
    WrongPassword,

    /// The transfer could not be applied by the store. Covers the
    /// record persist and both balance writes — with the transactional
    /// store these succeed or fail as one unit.
    #[error("failed to apply transfer: {0}")]
    TransferFailed(String),

    /// A transaction field update was rejected by the store.
    #[error("failed to update transaction: {0}")]
    TransactionUpdateFailed(String),

    /// Generic missing delete target.
    #[error("not found: {0}")]
    NotFound(String),

    /// Password hashing or verification failed mechanically (malformed
    /// PHC string, parameter error). Distinct from a wrong password.
    #[error("password hashing error: {0}")]
    PasswordHash(String),

    /// An underlying store fault that doesn't map to a domain rule.
    #[error("store error: {0}")]
    Store(#[from] DbError),
}

impl LedgerError {
    /// Stable machine-readable kind for structured responses and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::TooManyAttempts => "TOO_MANY_FAILED_LOGIN_ATTEMPTS",
            Self::UnknownSender(_) => "UNKNOWN_SENDER",
            Self::UnknownReceiver(_) => "UNKNOWN_RECEIVER",
            Self::UnknownUser(_) => "UNKNOWN_USER",
            Self::UnknownTransaction(_) => "UNKNOWN_TRANSACTION",
            Self::SelfTransferNotAllowed => "SELF_TRANSFER_NOT_ALLOWED",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::EmailTaken(_) => "EMAIL_TAKEN",
            Self::WrongPassword => "WRONG_PASSWORD",
            Self::TransferFailed(_) => "TRANSFER_FAILED",
            Self::TransactionUpdateFailed(_) => "TRANSACTION_UPDATE_FAILED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::PasswordHash(_) => "PASSWORD_HASH_ERROR",
            Self::Store(_) => "STORE_ERROR",
        }
    }
}

/// Convenience alias used throughout the service layer.
pub type LedgerResult<T> = Result<T, LedgerError>;
