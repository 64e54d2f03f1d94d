//! Generation and hashing of passwords.

use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use rand::rngs::OsRng;

use crate::{error::ApiError, util::secure_random};

/// Length of generated one-time passwords. 24 alphanumeric characters carry
/// a little over 142 bits of entropy.
pub const ONE_TIME_PASSWORD_LEN: usize = 24;

pub const MIN_PASSWORD_LEN: usize = 8;

/// A freshly generated password together with its hash. The plaintext is
/// only ever returned to the approving administrator.
pub struct IssuedCredential {
    pub plaintext: String,
    pub hash: String,
}

impl std::fmt::Debug for IssuedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedCredential")
            .field("plaintext", &"<redacted>")
            .finish()
    }
}

pub fn issue_one_time_password() -> Result<IssuedCredential, ApiError> {
    let plaintext = secure_random(ONE_TIME_PASSWORD_LEN);
    let hash = hash_password(&plaintext)?;
    Ok(IssuedCredential { plaintext, hash })
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("could not hash password: {e}")))
}

/// Checks a password against a stored hash. Unparseable hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash could not be parsed: {e}");
            false
        }
    }
}
