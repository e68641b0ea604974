use std::sync::Arc;

use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("password hashing failed: {0}")]
pub struct PasswordError(String);

/// PasswordEncoder Contract
///
/// The password-hash capability. Implementations must be safe to call from blocking
/// worker threads; `verify` answers a plain yes/no so callers cannot tell a malformed
/// stored hash from a wrong password.
pub trait PasswordEncoder: Send + Sync {
    fn hash(&self, plaintext: &str) -> Result<String, PasswordError>;
    fn verify(&self, plaintext: &str, hash: &str) -> bool;
}

/// PasswordState
///
/// The concrete type used to share the password encoder across the application state.
pub type PasswordState = Arc<dyn PasswordEncoder>;

/// Argon2id with the crate's default parameters, producing PHC strings.
#[derive(Default)]
pub struct Argon2PasswordEncoder {
    argon2: Argon2<'static>,
}

impl Argon2PasswordEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PasswordEncoder for Argon2PasswordEncoder {
    fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError(e.to_string()))
    }

    fn verify(&self, plaintext: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .argon2
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}
