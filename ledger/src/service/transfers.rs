//! # Transfer Workflows
//!
//! Creation, correction, and deletion of peer-to-peer transfers.
//!
//! Creation is ordered to fail fast on business rules before anything
//! is written: self-transfer, unknown sender, unknown receiver,
//! insufficient funds — in that order, so the caller always learns the
//! *first* thing wrong with the request. The store then re-validates
//! funds inside its transaction, which is what makes the check hold
//! under concurrency (see [`crate::store::db`]).
//!
//! Correction (`update`) settles the amount delta against both parties'
//! balances. The system this service replaces computed a delta and then
//! wrote nothing back — an account could be edited into incoherence.
//! Here the rule is explicit: the sender pays increases, the receiver
//! returns decreases, atomically with the record rewrite.
//!
//! Deletion removes the record and touches no balances. That asymmetry
//! is inherited deliberately: a deleted transaction is an erased
//! receipt, not a refund.

use std::sync::Arc;

use crate::error::{LedgerError, LedgerResult};
use crate::model::Transaction;
use crate::query::{ListQuery, OwnerFilter, OwnerRole, Page};
use crate::store::{DbError, LedgerDb};

/// Transfer workflows.
#[derive(Clone)]
pub struct TransferService {
    db: Arc<LedgerDb>,
}

impl TransferService {
    pub fn new(db: Arc<LedgerDb>) -> Self {
        Self { db }
    }

    /// Paginated transfer listing.
    ///
    /// When `owner` is given, the listing is restricted to transfers
    /// where that user plays the given role, ANDed with any search
    /// filter the query carries.
    pub fn list(
        &self,
        query: &ListQuery,
        owner: Option<&OwnerFilter>,
    ) -> LedgerResult<Page<Transaction>> {
        let mut transactions = self.db.transactions()?;

        if let Some(owner) = owner {
            transactions.retain(|tx| match owner.role {
                OwnerRole::Sender => tx.user_sender == owner.user_id,
                OwnerRole::Receiver => tx.user_receiver == owner.user_id,
            });
        }
        if let Some(search) = query.search_spec() {
            transactions.retain(|tx| search.matches(tx));
        }
        if let Some(sort) = query.sort_spec() {
            transactions.sort_by(|a, b| sort.compare(a, b));
        }

        let (page_number, page_size) = query.page();
        Ok(Page::assemble(transactions, page_number, page_size))
    }

    /// Fetch one transfer record.
    pub fn get(&self, id: &str) -> LedgerResult<Transaction> {
        self.db
            .get_transaction(id)?
            .ok_or_else(|| LedgerError::UnknownTransaction(id.to_string()))
    }

    /// Create a transfer and move the money.
    ///
    /// # Errors
    ///
    /// In check order: [`LedgerError::SelfTransferNotAllowed`],
    /// [`LedgerError::UnknownSender`], [`LedgerError::UnknownReceiver`],
    /// [`LedgerError::InsufficientFunds`] (message carries the sender's
    /// balance), then [`LedgerError::TransferFailed`] for store faults.
    pub fn create(
        &self,
        sender_id: &str,
        receiver_id: &str,
        nominal: u64,
        description: &str,
    ) -> LedgerResult<Transaction> {
        if sender_id == receiver_id {
            return Err(LedgerError::SelfTransferNotAllowed);
        }

        let sender = self
            .db
            .get_user(sender_id)?
            .ok_or_else(|| LedgerError::UnknownSender(sender_id.to_string()))?;

        if self.db.get_user(receiver_id)?.is_none() {
            return Err(LedgerError::UnknownReceiver(receiver_id.to_string()));
        }

        if sender.balance < nominal {
            return Err(LedgerError::InsufficientFunds {
                balance: sender.balance,
            });
        }

        let tx = Transaction::new(sender_id, receiver_id, nominal, description);
        match self.db.apply_transfer(&tx) {
            Ok(()) => {
                tracing::info!(
                    tx_id = %tx.id,
                    sender = %sender_id,
                    receiver = %receiver_id,
                    nominal,
                    "transfer applied"
                );
                Ok(tx)
            }
            // The transactional re-check lost a race; report the
            // balance as it actually was at commit time.
            Err(DbError::InsufficientFunds { available, .. }) => {
                Err(LedgerError::InsufficientFunds { balance: available })
            }
            Err(DbError::NotFound(id)) if id == sender_id => {
                Err(LedgerError::UnknownSender(id))
            }
            Err(DbError::NotFound(id)) => Err(LedgerError::UnknownReceiver(id)),
            Err(e) => Err(LedgerError::TransferFailed(e.to_string())),
        }
    }

    /// Correct an existing transfer's fields, settling any amount delta.
    pub fn update(
        &self,
        id: &str,
        sender_id: &str,
        receiver_id: &str,
        nominal: u64,
        description: &str,
    ) -> LedgerResult<Transaction> {
        if sender_id == receiver_id {
            return Err(LedgerError::SelfTransferNotAllowed);
        }

        let sender = self
            .db
            .get_user(sender_id)?
            .ok_or_else(|| LedgerError::UnknownSender(sender_id.to_string()))?;

        if self.db.get_user(receiver_id)?.is_none() {
            return Err(LedgerError::UnknownReceiver(receiver_id.to_string()));
        }

        let existing = self.get(id)?;

        // Fail fast on an uncoverable increase; the store re-checks the
        // increment transactionally before committing anything.
        if nominal > existing.nominal {
            let delta = nominal - existing.nominal;
            if sender.balance < delta {
                return Err(LedgerError::InsufficientFunds {
                    balance: sender.balance,
                });
            }
        }

        let updated = Transaction {
            id: existing.id.clone(),
            user_sender: sender_id.to_string(),
            user_receiver: receiver_id.to_string(),
            nominal,
            description: description.to_string(),
            date: existing.date,
        };

        match self.db.update_transfer(&updated) {
            Ok(()) => {
                tracing::info!(tx_id = %id, nominal, "transfer updated");
                self.get(id)
            }
            Err(DbError::InsufficientFunds { available, .. }) => {
                Err(LedgerError::InsufficientFunds { balance: available })
            }
            Err(DbError::NotFound(missing)) if missing == id => {
                Err(LedgerError::UnknownTransaction(missing))
            }
            Err(DbError::NotFound(missing)) if missing == sender_id => {
                Err(LedgerError::UnknownSender(missing))
            }
            Err(DbError::NotFound(missing)) => Err(LedgerError::UnknownReceiver(missing)),
            Err(e) => Err(LedgerError::TransactionUpdateFailed(e.to_string())),
        }
    }

    /// Delete a transfer record. Balances stay exactly where they are.
    pub fn delete(&self, id: &str) -> LedgerResult<()> {
        // Load-then-delete so a missing target is reported as such.
        if self.db.get_transaction(id)?.is_none() {
            return Err(LedgerError::NotFound(format!("transaction {id}")));
        }
        self.db.delete_transaction(id)?;
        tracing::info!(tx_id = %id, "transfer record deleted (balances untouched)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::User;

    fn seeded() -> (TransferService, Arc<LedgerDb>, User, User) {
        let db = Arc::new(LedgerDb::open_temporary().unwrap());
        let alice = User::new("Alice", "alice@example.com", "$argon2id$stub", 100);
        let bob = User::new("Bob", "bob@example.com", "$argon2id$stub", 50);
        db.create_user(&alice).unwrap();
        db.create_user(&bob).unwrap();
        (TransferService::new(Arc::clone(&db)), db, alice, bob)
    }

    fn balance(db: &LedgerDb, id: &str) -> u64 {
        db.get_user(id).unwrap().unwrap().balance
    }

    // -- Creation -----------------------------------------------------------

    #[test]
    fn transfer_moves_money_and_returns_the_record() {
        let (transfers, db, alice, bob) = seeded();

        let tx = transfers.create(&alice.id, &bob.id, 30, "rent").unwrap();
        assert_eq!(tx.user_sender, alice.id);
        assert_eq!(tx.user_receiver, bob.id);
        assert_eq!(tx.nominal, 30);

        assert_eq!(balance(&db, &alice.id), 70);
        assert_eq!(balance(&db, &bob.id), 80);
        assert_eq!(db.transaction_count(), 1);
    }

    #[test]
    fn self_transfer_rejected_regardless_of_balance() {
        let (transfers, _, alice, _) = seeded();
        let err = transfers.create(&alice.id, &alice.id, 1, "me").unwrap_err();
        assert!(matches!(err, LedgerError::SelfTransferNotAllowed));
    }

    #[test]
    fn unknown_parties_reported_in_check_order() {
        let (transfers, _, alice, _) = seeded();

        let err = transfers.create("ghost", &alice.id, 1, "x").unwrap_err();
        assert!(matches!(err, LedgerError::UnknownSender(_)));

        let err = transfers.create(&alice.id, "ghost", 1, "x").unwrap_err();
        assert!(matches!(err, LedgerError::UnknownReceiver(_)));

        // Both unknown: the sender check fires first.
        let err = transfers.create("ghost", "phantom", 1, "x").unwrap_err();
        assert!(matches!(err, LedgerError::UnknownSender(_)));
    }

    #[test]
    fn exact_balance_transfer_succeeds() {
        let (transfers, db, alice, bob) = seeded();
        transfers.create(&alice.id, &bob.id, 100, "all").unwrap();
        assert_eq!(balance(&db, &alice.id), 0);
        assert_eq!(balance(&db, &bob.id), 150);
    }

    #[test]
    fn insufficient_funds_reports_balance_and_writes_nothing() {
        let (transfers, db, alice, bob) = seeded();

        let err = transfers.create(&alice.id, &bob.id, 101, "x").unwrap_err();
        match err {
            LedgerError::InsufficientFunds { balance: b } => assert_eq!(b, 100),
            other => panic!("expected InsufficientFunds, got {other:?}"),
        }
        // The message is what clients display; it must carry the number.
        let err = transfers.create(&alice.id, &bob.id, 101, "x").unwrap_err();
        assert!(err.to_string().contains("100"));

        assert_eq!(db.transaction_count(), 0);
        assert_eq!(balance(&db, &alice.id), 100);
        assert_eq!(balance(&db, &bob.id), 50);
    }

    // -- Deletion (no compensating reversal) ---------------------------------

    #[test]
    fn deleting_a_transfer_leaves_balances_where_they_landed() {
        // A has 100, B has 50. Transfer 30: 70/80, one record. Deleting
        // the record removes it but performs no reversal — 70/80 stands.
        let (transfers, db, alice, bob) = seeded();
        let tx = transfers.create(&alice.id, &bob.id, 30, "rent").unwrap();
        assert_eq!(balance(&db, &alice.id), 70);
        assert_eq!(balance(&db, &bob.id), 80);

        transfers.delete(&tx.id).unwrap();

        assert!(matches!(
            transfers.get(&tx.id).unwrap_err(),
            LedgerError::UnknownTransaction(_)
        ));
        assert_eq!(balance(&db, &alice.id), 70);
        assert_eq!(balance(&db, &bob.id), 80);
    }

    #[test]
    fn deleting_a_missing_transfer_is_not_found() {
        let (transfers, _, _, _) = seeded();
        assert!(matches!(
            transfers.delete("ghost").unwrap_err(),
            LedgerError::NotFound(_)
        ));
    }

    // -- Updates ------------------------------------------------------------

    #[test]
    fn update_settles_the_delta_both_directions() {
        let (transfers, db, alice, bob) = seeded();
        let tx = transfers.create(&alice.id, &bob.id, 30, "rent").unwrap();

        transfers
            .update(&tx.id, &alice.id, &bob.id, 50, "rent, actually")
            .unwrap();
        assert_eq!(balance(&db, &alice.id), 50);
        assert_eq!(balance(&db, &bob.id), 100);

        let corrected = transfers
            .update(&tx.id, &alice.id, &bob.id, 10, "rent, final answer")
            .unwrap();
        assert_eq!(corrected.nominal, 10);
        assert_eq!(corrected.description, "rent, final answer");
        assert_eq!(balance(&db, &alice.id), 90);
        assert_eq!(balance(&db, &bob.id), 60);
    }

    #[test]
    fn update_increase_beyond_balance_rejected_with_balance() {
        let (transfers, db, alice, bob) = seeded();
        let tx = transfers.create(&alice.id, &bob.id, 90, "big").unwrap(); // 10 / 140

        let err = transfers
            .update(&tx.id, &alice.id, &bob.id, 150, "bigger")
            .unwrap_err();
        match err {
            LedgerError::InsufficientFunds { balance: b } => assert_eq!(b, 10),
            other => panic!("expected InsufficientFunds, got {other:?}"),
        }
        // Nothing moved.
        assert_eq!(balance(&db, &alice.id), 10);
        assert_eq!(transfers.get(&tx.id).unwrap().nominal, 90);
    }

    #[test]
    fn update_of_unknown_transaction_rejected() {
        let (transfers, _, alice, bob) = seeded();
        let err = transfers
            .update("ghost", &alice.id, &bob.id, 10, "x")
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownTransaction(_)));
    }

    #[test]
    fn update_rejects_self_transfer_and_unknown_parties_first() {
        let (transfers, _, alice, bob) = seeded();
        let tx = transfers.create(&alice.id, &bob.id, 10, "x").unwrap();

        let err = transfers
            .update(&tx.id, &alice.id, &alice.id, 10, "x")
            .unwrap_err();
        assert!(matches!(err, LedgerError::SelfTransferNotAllowed));

        let err = transfers
            .update(&tx.id, "ghost", &bob.id, 10, "x")
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownSender(_)));
    }

    // -- Listing ------------------------------------------------------------

    #[test]
    fn list_with_ownership_filter_and_search() {
        let (transfers, _, alice, bob) = seeded();
        transfers.create(&alice.id, &bob.id, 10, "coffee").unwrap();
        transfers.create(&alice.id, &bob.id, 20, "lunch").unwrap();
        transfers.create(&bob.id, &alice.id, 5, "change").unwrap();

        // Alice as sender: two records.
        let owner = OwnerFilter {
            user_id: alice.id.clone(),
            role: OwnerRole::Sender,
        };
        let page = transfers.list(&ListQuery::default(), Some(&owner)).unwrap();
        assert_eq!(page.count, 2);

        // Alice as receiver: one.
        let owner = OwnerFilter {
            user_id: alice.id.clone(),
            role: OwnerRole::Receiver,
        };
        let page = transfers.list(&ListQuery::default(), Some(&owner)).unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.data[0].description, "change");

        // Ownership AND search.
        let owner = OwnerFilter {
            user_id: alice.id.clone(),
            role: OwnerRole::Sender,
        };
        let query = ListQuery {
            search: Some("description:lun".to_string()),
            ..Default::default()
        };
        let page = transfers.list(&query, Some(&owner)).unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.data[0].nominal, 20);
    }

    #[test]
    fn list_date_search_matches_the_creation_day() {
        let (transfers, _, alice, bob) = seeded();
        let tx = transfers.create(&alice.id, &bob.id, 10, "today").unwrap();

        let today = tx.date.format("%Y-%m-%d").to_string();
        let query = ListQuery {
            search: Some(format!("date:{today}")),
            ..Default::default()
        };
        assert_eq!(transfers.list(&query, None).unwrap().count, 1);

        let query = ListQuery {
            search: Some("date:1999-01-01".to_string()),
            ..Default::default()
        };
        assert_eq!(transfers.list(&query, None).unwrap().count, 0);
    }

    #[test]
    fn list_sorts_by_nominal() {
        let (transfers, _, alice, bob) = seeded();
        for nominal in [20u64, 5, 10] {
            transfers.create(&alice.id, &bob.id, nominal, "x").unwrap();
        }
        let query = ListQuery {
            sort: Some("nominal:desc".to_string()),
            ..Default::default()
        };
        let page = transfers.list(&query, None).unwrap();
        let amounts: Vec<u64> = page.data.iter().map(|t| t.nominal).collect();
        assert_eq!(amounts, vec![20, 10, 5]);
    }
}
