//! One-way password hashing.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher as _, PasswordVerifier};

use crate::errors::ServiceError;

/// Hash-and-verify collaborator used by the credential and user services
#[cfg_attr(test, mockall::automock)]
pub trait PasswordHasher: Send + Sync {
    /// Produces a self-describing hash of `password`.
    fn hash(&self, password: &str) -> Result<String, ServiceError>;

    /// Returns `Ok(false)` on mismatch and for hashes that cannot be parsed.
    fn verify(&self, password: &str, hash: &str) -> Result<bool, ServiceError>;
}

/// Argon2id with the crate's default parameters, PHC string output
#[derive(Clone, Default)]
pub struct Argon2PasswordHasher {
    argon2: Argon2<'static>,
}

impl Argon2PasswordHasher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, password: &str) -> Result<String, ServiceError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ServiceError::HashError(e.to_string()))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, ServiceError> {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "stored password hash is not a valid PHC string");
                return Ok(false);
            }
        };

        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(ServiceError::HashError(e.to_string())),
        }
    }
}
