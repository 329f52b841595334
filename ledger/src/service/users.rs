//! # User Workflows
//!
//! Account CRUD plus the two password-adjacent operations (create
//! hashes, change verifies-then-rehashes). Listing goes through the
//! shared query vocabulary in [`crate::query`].

use std::sync::Arc;

use crate::auth::password;
use crate::error::{LedgerError, LedgerResult};
use crate::model::{User, UserProfile};
use crate::query::{ListQuery, Page};
use crate::store::{DbError, LedgerDb};

/// User account workflows.
#[derive(Clone)]
pub struct UserService {
    db: Arc<LedgerDb>,
}

impl UserService {
    pub fn new(db: Arc<LedgerDb>) -> Self {
        Self { db }
    }

    /// Paginated, filtered, sorted user listing. Projections only —
    /// no password hash has ever been inside a [`Page`].
    pub fn list(&self, query: &ListQuery) -> LedgerResult<Page<UserProfile>> {
        let mut users = self.db.users()?;

        if let Some(search) = query.search_spec() {
            users.retain(|user| search.matches(user));
        }
        if let Some(sort) = query.sort_spec() {
            users.sort_by(|a, b| sort.compare(a, b));
        }

        let (page_number, page_size) = query.page();
        let profiles = users.iter().map(User::profile).collect();
        Ok(Page::assemble(profiles, page_number, page_size))
    }

    /// Fetch one account's profile.
    pub fn get(&self, id: &str) -> LedgerResult<UserProfile> {
        self.db
            .get_user(id)?
            .map(|user| user.profile())
            .ok_or_else(|| LedgerError::UnknownUser(id.to_string()))
    }

    /// Register a new account. The password arrives in plaintext and
    /// leaves this method as an Argon2id hash; nothing downstream ever
    /// sees it again.
    pub fn create(
        &self,
        name: &str,
        email: &str,
        password_plain: &str,
        balance: u64,
    ) -> LedgerResult<UserProfile> {
        // Fail fast on a taken email before paying for the hash; the
        // store re-checks inside its transaction, so a racing duplicate
        // still can't land.
        if self.db.get_user_by_email(email)?.is_some() {
            return Err(LedgerError::EmailTaken(email.to_string()));
        }

        let phc = password::hash_password(password_plain)?;
        let user = User::new(name, email, &phc, balance);

        match self.db.create_user(&user) {
            Ok(()) => {
                tracing::info!(user_id = %user.id, "user created");
                Ok(user.profile())
            }
            Err(DbError::EmailTaken(email)) => Err(LedgerError::EmailTaken(email)),
            Err(e) => Err(e.into()),
        }
    }

    /// Update name and email.
    pub fn update(&self, id: &str, name: &str, email: &str) -> LedgerResult<UserProfile> {
        match self.db.update_user(id, name, email) {
            Ok(()) => self.get(id),
            Err(DbError::NotFound(_)) => Err(LedgerError::UnknownUser(id.to_string())),
            Err(DbError::EmailTaken(email)) => Err(LedgerError::EmailTaken(email)),
            Err(e) => Err(e.into()),
        }
    }

    /// Change a password: verify the current one, hash the new one.
    pub fn change_password(
        &self,
        id: &str,
        current_plain: &str,
        new_plain: &str,
    ) -> LedgerResult<()> {
        let user = self
            .db
            .get_user(id)?
            .ok_or_else(|| LedgerError::UnknownUser(id.to_string()))?;

        if !password::password_matches(current_plain, &user.password)? {
            return Err(LedgerError::WrongPassword);
        }

        let phc = password::hash_password(new_plain)?;
        self.db.change_password(id, &phc)?;
        tracing::info!(user_id = %id, "password changed");
        Ok(())
    }

    /// Set an account balance to an absolute value. Administrative —
    /// the transfer workflows never come through here.
    pub fn update_balance(&self, id: &str, balance: u64) -> LedgerResult<UserProfile> {
        match self.db.update_balance(id, balance) {
            Ok(()) => self.get(id),
            Err(DbError::NotFound(_)) => Err(LedgerError::UnknownUser(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete an account.
    ///
    /// Transactions referencing the account are left in place — they
    /// are historical records, and their user references were always
    /// weak (checked at transfer creation, not enforced after).
    pub fn delete(&self, id: &str) -> LedgerResult<()> {
        match self.db.delete_user(id)? {
            Some(user) => {
                tracing::info!(user_id = %user.id, "user deleted");
                Ok(())
            }
            None => Err(LedgerError::NotFound(format!("user {id}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> UserService {
        UserService::new(Arc::new(LedgerDb::open_temporary().unwrap()))
    }

    fn seeded() -> (UserService, UserProfile) {
        let users = service();
        let alice = users
            .create("Alice", "alice@example.com", "hunter2", 100)
            .unwrap();
        (users, alice)
    }

    #[test]
    fn create_and_get() {
        let (users, alice) = seeded();
        let fetched = users.get(&alice.id).unwrap();
        assert_eq!(fetched, alice);
        assert_eq!(fetched.balance, 100);
    }

    #[test]
    fn create_rejects_duplicate_email() {
        let (users, _) = seeded();
        let err = users
            .create("Other Alice", "alice@example.com", "pw", 0)
            .unwrap_err();
        assert!(matches!(err, LedgerError::EmailTaken(_)));
    }

    #[test]
    fn get_unknown_user() {
        let users = service();
        assert!(matches!(
            users.get("ghost").unwrap_err(),
            LedgerError::UnknownUser(_)
        ));
    }

    #[test]
    fn update_changes_profile_fields_only() {
        let (users, alice) = seeded();
        let updated = users
            .update(&alice.id, "Alice B.", "aliceb@example.com")
            .unwrap();
        assert_eq!(updated.name, "Alice B.");
        assert_eq!(updated.email, "aliceb@example.com");
        assert_eq!(updated.balance, 100);
    }

    #[test]
    fn update_rejects_taken_email() {
        let (users, alice) = seeded();
        users.create("Bob", "bob@example.com", "pw", 0).unwrap();
        let err = users
            .update(&alice.id, "Alice", "bob@example.com")
            .unwrap_err();
        assert!(matches!(err, LedgerError::EmailTaken(_)));
    }

    #[test]
    fn change_password_requires_the_current_one() {
        let (users, alice) = seeded();

        let err = users
            .change_password(&alice.id, "not hunter2", "newpass")
            .unwrap_err();
        assert!(matches!(err, LedgerError::WrongPassword));

        users
            .change_password(&alice.id, "hunter2", "newpass")
            .expect("correct current password");

        // The new password is live, the old one isn't.
        users
            .change_password(&alice.id, "newpass", "hunter2")
            .expect("new password verifies");
    }

    #[test]
    fn update_balance_is_absolute() {
        let (users, alice) = seeded();
        let updated = users.update_balance(&alice.id, 5000).unwrap();
        assert_eq!(updated.balance, 5000);
    }

    #[test]
    fn delete_then_delete_again() {
        let (users, alice) = seeded();
        users.delete(&alice.id).unwrap();
        assert!(matches!(
            users.delete(&alice.id).unwrap_err(),
            LedgerError::NotFound(_)
        ));
        assert!(matches!(
            users.get(&alice.id).unwrap_err(),
            LedgerError::UnknownUser(_)
        ));
    }

    #[test]
    fn list_searches_and_pages() {
        let users = service();
        for i in 0..25 {
            users
                .create(
                    &format!("User {i:02}"),
                    &format!("user{i:02}@example.com"),
                    "pw",
                    i,
                )
                .unwrap();
        }

        // 25 records, page size 10 -> 3 pages.
        let query = ListQuery {
            sort: Some("name".to_string()),
            ..Default::default()
        };
        let page = users.list(&query).unwrap();
        assert_eq!(page.count, 25);
        assert_eq!(page.total_pages, 3);
        assert!(!page.has_previous_page);
        assert!(page.has_next_page);
        assert_eq!(page.data[0].name, "User 00");

        // Exact-match balance search.
        let query = ListQuery {
            search: Some("balance:7".to_string()),
            ..Default::default()
        };
        let page = users.list(&query).unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.data[0].name, "User 07");

        // Case-insensitive substring on email.
        let query = ListQuery {
            search: Some("email:USER1".to_string()),
            ..Default::default()
        };
        let page = users.list(&query).unwrap();
        assert_eq!(page.count, 10); // user10..user19
    }

    #[test]
    fn list_sorts_descending() {
        let users = service();
        for (name, balance) in [("a", 1u64), ("b", 3), ("c", 2)] {
            users
                .create(name, &format!("{name}@example.com"), "pw", balance)
                .unwrap();
        }
        let query = ListQuery {
            sort: Some("balance:desc".to_string()),
            ..Default::default()
        };
        let page = users.list(&query).unwrap();
        let balances: Vec<u64> = page.data.iter().map(|u| u.balance).collect();
        assert_eq!(balances, vec![3, 2, 1]);
    }
}
