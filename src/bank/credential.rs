//! Salted secret hashing for login credentials (Argon2id, PHC string format).

use crate::error::{BankError, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use std::sync::OnceLock;
use tracing::error;

const SALT_LEN: usize = 16;

/// Hash `secret` with a fresh random salt
pub fn hash_secret(secret: &str) -> Result<String> {
    let mut salt_bytes = [0u8; SALT_LEN];
    getrandom::fill(&mut salt_bytes)
        .map_err(|e| BankError::Validation(format!("Unable to salt secret: {e}")))?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| BankError::Validation(format!("Unable to salt secret: {e}")))?;
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| BankError::Validation(format!("Unable to hash secret: {e}")))
}

/// Check `secret` against a stored PHC string.
///
/// A malformed stored hash counts as a mismatch; it is logged, not surfaced.
pub fn verify_secret(secret: &str, stored: &str) -> bool {
    let parsed = match PasswordHash::new(stored) {
        Ok(parsed) => parsed,
        Err(e) => {
            error!(error = %e, "Stored credential hash is malformed");
            return false;
        }
    };
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok()
}

/// Spend the same work as a real verification when the username is unknown,
/// so response timing does not reveal which usernames exist.
pub fn verify_against_decoy(secret: &str) {
    static DECOY: OnceLock<Option<String>> = OnceLock::new();
    if let Some(decoy) = DECOY.get_or_init(|| hash_secret("decoy-credential").ok()) {
        let _ = verify_secret(secret, decoy);
    }
}
