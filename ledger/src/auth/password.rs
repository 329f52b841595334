//! Password hashing with Argon2id.
//!
//! Hashes are stored as PHC strings (`$argon2id$v=19$...`), which embed
//! the algorithm, parameters, and salt — so parameter upgrades only
//! affect newly hashed passwords and old hashes keep verifying.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::error::{LedgerError, LedgerResult};

/// Hashes a plaintext password with a fresh random salt.
///
/// Uses the argon2 crate's default parameters (Argon2id v19). Costs are
/// a deliberate non-choice here: the defaults track the RFC 9106
/// recommendations, and second-guessing them is how you end up with
/// md5crypt.
pub fn hash_password(password: &str) -> LedgerResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| LedgerError::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verifies a plaintext password against a stored PHC string.
///
/// Returns `Ok(false)` for a wrong password. A malformed stored hash is
/// an `Err` — that's data corruption, not a failed login, and the two
/// must not be conflated.
pub fn password_matches(password: &str, phc: &str) -> LedgerResult<bool> {
    let parsed =
        PasswordHash::new(phc).map_err(|e| LedgerError::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_roundtrip() {
        let phc = hash_password("hunter2").expect("hash");
        assert!(phc.starts_with("$argon2id$"));
        assert!(password_matches("hunter2", &phc).expect("verify"));
        assert!(!password_matches("hunter3", &phc).expect("verify"));
    }

    #[test]
    fn same_password_hashes_differently() {
        // Fresh salt per hash: equal inputs must not produce equal
        // outputs, or the user table becomes a rainbow-table lookup.
        let a = hash_password("hunter2").unwrap();
        let b = hash_password("hunter2").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_stored_hash_is_an_error_not_a_mismatch() {
        let result = password_matches("hunter2", "not-a-phc-string");
        assert!(matches!(result, Err(LedgerError::PasswordHash(_))));
    }
}
