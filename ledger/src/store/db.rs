//! # LedgerDb — Embedded Document Store
//!
//! The persistence layer for TALLY, built on sled's embedded key-value
//! store. All on-disk data flows through this module.
//!
//! ## Tree Layout
//!
//! sled organizes data into named "trees" (analogous to column families
//! in RocksDB or collections in a document store). Each tree is an
//! independent B+ tree with its own keyspace:
//!
//! | Tree           | Key                  | Value                    |
//! |----------------|----------------------|--------------------------|
//! | `users`        | user id (UTF-8)      | `bincode(User)`          |
//! | `user_emails`  | email (UTF-8)        | user id (UTF-8)          |
//! | `transactions` | tx id (UTF-8)        | `bincode(Transaction)`   |
//!
//! `user_emails` is a unique index: it is maintained in the same
//! transaction as the `users` tree, so two accounts can never hold the
//! same email no matter how requests interleave.
//!
//! ## Atomicity
//!
//! Balance movements use sled's multi-tree transactions. A transfer
//! writes the transaction record, the debited sender, and the credited
//! receiver as one unit — either everything lands or nothing does. The
//! sufficiency check happens *inside* the transaction, which is what
//! closes the read-check-write race on concurrent transfers: sled
//! retries conflicting transactions, and the retry re-reads the balance.

use sled::transaction::{
    ConflictableTransactionError, TransactionError, TransactionResult, TransactionalTree,
};
use sled::{Transactional, Tree};
use std::path::Path;

use crate::model::{Transaction, User};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Codec(String),

    #[error("key not found: {0}")]
    NotFound(String),

    /// The email is already bound to another account in the
    /// `user_emails` index.
    #[error("email already registered: {0}")]
    EmailTaken(String),

    /// A debit would overdraw the account. Carries both sides of the
    /// failed comparison so callers can report the available balance.
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientFunds {
        /// The balance at the moment of the (transactional) check.
        available: u64,
        /// The amount that was requested.
        requested: u64,
    },

    /// Arithmetic overflow during a credit. If you're hitting this,
    /// someone is trying to credit more than 18.4 quintillion units.
    /// That's either a bug or an attack.
    #[error("balance overflow: current {current}, credit {credit}")]
    Overflow {
        /// The balance before the failed credit.
        current: u64,
        /// The amount that caused the overflow.
        credit: u64,
    },
}

pub type DbResult<T> = Result<T, DbError>;

/// Collapses sled's transaction result into a plain [`DbResult`]:
/// aborts carry our domain reason, storage faults become `Sled`.
fn flatten<T>(result: TransactionResult<T, DbError>) -> DbResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(e)) => Err(e),
        Err(TransactionError::Storage(e)) => Err(DbError::Sled(e)),
    }
}

/// Shorthand for aborting a transaction with a domain reason.
fn abort<T>(e: DbError) -> Result<T, ConflictableTransactionError<DbError>> {
    Err(ConflictableTransactionError::Abort(e))
}

// ---------------------------------------------------------------------------
// Transactional helpers
// ---------------------------------------------------------------------------

/// Reads and decodes a record inside a transaction, aborting with
/// `NotFound` if the key is absent.
fn tx_fetch<T: serde::de::DeserializeOwned>(
    tree: &TransactionalTree,
    key: &str,
) -> Result<T, ConflictableTransactionError<DbError>> {
    match tree.get(key.as_bytes())? {
        Some(bytes) => bincode::deserialize(&bytes)
            .map_err(|e| ConflictableTransactionError::Abort(DbError::Codec(e.to_string()))),
        None => abort(DbError::NotFound(key.to_string())),
    }
}

/// Encodes and writes a record inside a transaction.
fn tx_store<T: serde::Serialize>(
    tree: &TransactionalTree,
    key: &str,
    value: &T,
) -> Result<(), ConflictableTransactionError<DbError>> {
    let bytes = bincode::serialize(value)
        .map_err(|e| ConflictableTransactionError::Abort(DbError::Codec(e.to_string())))?;
    tree.insert(key.as_bytes(), bytes)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// LedgerDb
// ---------------------------------------------------------------------------

/// Embedded document store for users and transactions.
///
/// Wraps a sled `Db` and exposes typed accessors. All serialization
/// uses bincode for compactness and speed.
///
/// # Thread Safety
///
/// sled is inherently thread-safe — trees support lock-free concurrent
/// reads and serialized writes. `LedgerDb` can be shared across threads
/// via `Arc<LedgerDb>` without external synchronization.
#[derive(Debug, Clone)]
pub struct LedgerDb {
    /// The underlying sled database handle.
    db: sled::Db,
    /// User records indexed by id.
    users: Tree,
    /// Unique index: email -> user id.
    user_emails: Tree,
    /// Transaction records indexed by id.
    transactions: Tree,
}

impl LedgerDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that lives in memory and is cleaned
    /// up automatically when the `LedgerDb` is dropped.
    ///
    /// Ideal for unit tests — no filesystem side effects, no cleanup.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    /// Internal constructor: opens named trees from an existing sled `Db`.
    fn from_db(db: sled::Db) -> DbResult<Self> {
        let users = db.open_tree("users")?;
        let user_emails = db.open_tree("user_emails")?;
        let transactions = db.open_tree("transactions")?;

        Ok(Self {
            db,
            users,
            user_emails,
            transactions,
        })
    }

    // -- User operations ----------------------------------------------------

    /// Persist a new user, enforcing email uniqueness.
    ///
    /// The record and the email index entry are written in one
    /// transaction, so a concurrent registration with the same email
    /// cannot slip between the check and the insert.
    pub fn create_user(&self, user: &User) -> DbResult<()> {
        let result = (&self.users, &self.user_emails).transaction(|(users, emails)| {
            if emails.get(user.email.as_bytes())?.is_some() {
                return abort(DbError::EmailTaken(user.email.clone()));
            }
            tx_store(users, &user.id, user)?;
            emails.insert(user.email.as_bytes(), user.id.as_bytes())?;
            Ok(())
        });
        flatten(result)
    }

    /// Retrieve a user by id. Returns `None` if no such account exists.
    pub fn get_user(&self, id: &str) -> DbResult<Option<User>> {
        match self.users.get(id.as_bytes())? {
            Some(bytes) => {
                let user =
                    bincode::deserialize(&bytes).map_err(|e| DbError::Codec(e.to_string()))?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    /// Retrieve a user by email via the unique index.
    pub fn get_user_by_email(&self, email: &str) -> DbResult<Option<User>> {
        match self.user_emails.get(email.as_bytes())? {
            Some(id_bytes) => {
                let id = String::from_utf8(id_bytes.to_vec())
                    .map_err(|e| DbError::Codec(e.to_string()))?;
                self.get_user(&id)
            }
            None => Ok(None),
        }
    }

    /// Update a user's name and email, keeping the email index in step.
    ///
    /// Fails with `EmailTaken` if the new email belongs to a different
    /// account, `NotFound` if the user doesn't exist.
    pub fn update_user(&self, id: &str, name: &str, email: &str) -> DbResult<()> {
        let result = (&self.users, &self.user_emails).transaction(|(users, emails)| {
            let mut user: User = tx_fetch(users, id)?;

            if user.email != email {
                if emails.get(email.as_bytes())?.is_some() {
                    return abort(DbError::EmailTaken(email.to_string()));
                }
                emails.remove(user.email.as_bytes())?;
                emails.insert(email.as_bytes(), id.as_bytes())?;
            }

            user.name = name.to_string();
            user.email = email.to_string();
            tx_store(users, id, &user)?;
            Ok(())
        });
        flatten(result)
    }

    /// Overwrite a user's stored password hash.
    pub fn change_password(&self, id: &str, password_hash: &str) -> DbResult<()> {
        let result = self.users.transaction(|users| {
            let mut user: User = tx_fetch(users, id)?;
            user.password = password_hash.to_string();
            tx_store(users, id, &user)?;
            Ok(())
        });
        flatten(result)
    }

    /// Set a user's balance to an absolute value.
    ///
    /// This is the administrative escape hatch — transfers never call
    /// it. They go through [`apply_transfer`](Self::apply_transfer),
    /// which moves both balances relative to what is actually stored.
    pub fn update_balance(&self, id: &str, balance: u64) -> DbResult<()> {
        let result = self.users.transaction(|users| {
            let mut user: User = tx_fetch(users, id)?;
            user.balance = balance;
            tx_store(users, id, &user)?;
            Ok(())
        });
        flatten(result)
    }

    /// Delete a user and release their email. Returns the removed
    /// record, or `None` if the id was unknown.
    pub fn delete_user(&self, id: &str) -> DbResult<Option<User>> {
        let result = (&self.users, &self.user_emails).transaction(|(users, emails)| {
            let Some(bytes) = users.get(id.as_bytes())? else {
                return Ok(None);
            };
            let user: User = bincode::deserialize(&bytes)
                .map_err(|e| ConflictableTransactionError::Abort(DbError::Codec(e.to_string())))?;
            users.remove(id.as_bytes())?;
            emails.remove(user.email.as_bytes())?;
            Ok(Some(user))
        });
        flatten(result)
    }

    /// Decode every user record. The collections this service manages
    /// are small; filtering and sorting happen in memory on top of this.
    pub fn users(&self) -> DbResult<Vec<User>> {
        self.users
            .iter()
            .map(|entry| {
                let (_key, bytes) = entry?;
                bincode::deserialize(&bytes).map_err(|e| DbError::Codec(e.to_string()))
            })
            .collect()
    }

    /// Number of user records.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    // -- Transaction operations ---------------------------------------------

    /// Retrieve a transaction by id.
    pub fn get_transaction(&self, id: &str) -> DbResult<Option<Transaction>> {
        match self.transactions.get(id.as_bytes())? {
            Some(bytes) => {
                let tx =
                    bincode::deserialize(&bytes).map_err(|e| DbError::Codec(e.to_string()))?;
                Ok(Some(tx))
            }
            None => Ok(None),
        }
    }

    /// Delete a transaction record. Returns the removed record, or
    /// `None` if the id was unknown.
    ///
    /// Deliberately touches nothing but the record itself: deleting a
    /// transaction does not reverse the balance movements it caused.
    pub fn delete_transaction(&self, id: &str) -> DbResult<Option<Transaction>> {
        match self.transactions.remove(id.as_bytes())? {
            Some(bytes) => {
                let tx =
                    bincode::deserialize(&bytes).map_err(|e| DbError::Codec(e.to_string()))?;
                Ok(Some(tx))
            }
            None => Ok(None),
        }
    }

    /// Decode every transaction record.
    pub fn transactions(&self) -> DbResult<Vec<Transaction>> {
        self.transactions
            .iter()
            .map(|entry| {
                let (_key, bytes) = entry?;
                bincode::deserialize(&bytes).map_err(|e| DbError::Codec(e.to_string()))
            })
            .collect()
    }

    /// Number of transaction records.
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    // -- Balance movement ---------------------------------------------------

    /// Apply a transfer: persist the record, debit the sender, credit
    /// the receiver — atomically.
    ///
    /// The sufficiency check runs inside the transaction against the
    /// balance as stored *now*, not as some handler read it earlier.
    /// Two concurrent transfers that together overdraw an account
    /// therefore cannot both commit: sled retries the conflicting one,
    /// which re-reads the drained balance and aborts.
    ///
    /// # Errors
    ///
    /// `NotFound` if either party's record is gone, `InsufficientFunds`
    /// if the sender can't cover the amount, `Overflow` if the credit
    /// would exceed `u64::MAX`.
    pub fn apply_transfer(&self, tx: &Transaction) -> DbResult<()> {
        let result =
            (&self.users, &self.transactions).transaction(|(users, transactions)| {
                let mut sender: User = tx_fetch(users, &tx.user_sender)?;
                let mut receiver: User = tx_fetch(users, &tx.user_receiver)?;

                if sender.balance < tx.nominal {
                    return abort(DbError::InsufficientFunds {
                        available: sender.balance,
                        requested: tx.nominal,
                    });
                }
                let credited = match receiver.balance.checked_add(tx.nominal) {
                    Some(v) => v,
                    None => {
                        return abort(DbError::Overflow {
                            current: receiver.balance,
                            credit: tx.nominal,
                        })
                    }
                };

                sender.balance -= tx.nominal;
                receiver.balance = credited;

                tx_store(transactions, &tx.id, tx)?;
                tx_store(users, &sender.id, &sender)?;
                tx_store(users, &receiver.id, &receiver)?;
                Ok(())
            });
        flatten(result)
    }

    /// Rewrite a transaction's fields and settle the balance delta.
    ///
    /// The old amount is re-read from the stored record inside the
    /// transaction — never trusted from the caller. When the amount
    /// grows by `delta`, the sender pays `delta` more (sufficiency
    /// re-checked for the increment only); when it shrinks, the
    /// receiver returns the difference. The record's parties and
    /// `date` come from `updated` and the stored record respectively —
    /// the creation timestamp is immutable.
    ///
    /// # Errors
    ///
    /// `NotFound` for a missing record or party, `InsufficientFunds`
    /// when the paying side can't cover the delta, `Overflow` on
    /// credit overflow.
    pub fn update_transfer(&self, updated: &Transaction) -> DbResult<()> {
        let result =
            (&self.users, &self.transactions).transaction(|(users, transactions)| {
                let existing: Transaction = tx_fetch(transactions, &updated.id)?;
                let mut sender: User = tx_fetch(users, &updated.user_sender)?;
                let mut receiver: User = tx_fetch(users, &updated.user_receiver)?;

                if updated.nominal > existing.nominal {
                    let delta = updated.nominal - existing.nominal;
                    if sender.balance < delta {
                        return abort(DbError::InsufficientFunds {
                            available: sender.balance,
                            requested: delta,
                        });
                    }
                    let credited = match receiver.balance.checked_add(delta) {
                        Some(v) => v,
                        None => {
                            return abort(DbError::Overflow {
                                current: receiver.balance,
                                credit: delta,
                            })
                        }
                    };
                    sender.balance -= delta;
                    receiver.balance = credited;
                } else if updated.nominal < existing.nominal {
                    let delta = existing.nominal - updated.nominal;
                    if receiver.balance < delta {
                        return abort(DbError::InsufficientFunds {
                            available: receiver.balance,
                            requested: delta,
                        });
                    }
                    let credited = match sender.balance.checked_add(delta) {
                        Some(v) => v,
                        None => {
                            return abort(DbError::Overflow {
                                current: sender.balance,
                                credit: delta,
                            })
                        }
                    };
                    receiver.balance -= delta;
                    sender.balance = credited;
                }

                let record = Transaction {
                    date: existing.date,
                    ..updated.clone()
                };
                tx_store(transactions, &record.id, &record)?;
                tx_store(users, &sender.id, &sender)?;
                tx_store(users, &receiver.id, &receiver)?;
                Ok(())
            });
        flatten(result)
    }

    // -- Utility ------------------------------------------------------------

    /// Force a flush of all pending writes to disk.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
