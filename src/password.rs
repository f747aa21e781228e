//! Salted Argon2id password hashes.
//!
//! Hashes are stored as PHC strings (`$argon2id$v=19$m=...`). The cost
//! parameters travel inside the string, so a hash made with cheap test
//! parameters still verifies under the defaults and vice versa.

use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use password_hash::{SaltString, rand_core::OsRng};

use crate::error::{ChirpError, Result};

/// Cost parameters used for new hashes.
#[derive(Debug, Clone)]
pub struct HashCost(Params);

impl Default for HashCost {
    /// m=19456 KiB, t=2, p=1.
    fn default() -> Self {
        Self(Params::default())
    }
}

impl HashCost {
    /// The smallest parameters Argon2 accepts, for scratch databases.
    ///
    /// # Errors
    ///
    /// Returns an error if the argon2 crate rejects its own minimums.
    pub fn minimal() -> Result<Self> {
        Params::new(
            Params::MIN_M_COST,
            Params::MIN_T_COST,
            Params::MIN_P_COST,
            None,
        )
        .map(Self)
        .map_err(|e| ChirpError::with_context("build argon2 parameters", e))
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::default(), self.0.clone())
    }

    /// Salt and hash `password`, returning the PHC string.
    ///
    /// # Errors
    ///
    /// Returns an error if hashing fails.
    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.hasher()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ChirpError::with_context("hash password", e))
    }
}

/// Check `password` against a stored PHC string.
///
/// # Errors
///
/// Returns an error if the stored string is not a valid hash. A wrong
/// password is `Ok(false)`.
pub fn verify(password: &str, stored: &str) -> Result<bool> {
    let parsed =
        PasswordHash::new(stored).map_err(|e| ChirpError::with_context("parse password hash", e))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(ChirpError::with_context("verify password", e)),
    }
}
