//! Argon2id password hashing and verification.
//!
//! Hashes use a random salt from [`OsRng`] and are stored as PHC strings, so
//! algorithm parameters and salt travel with the hash.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

/// Hash a plaintext password using Argon2id with a random salt.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored PHC hash.
///
/// Returns `Ok(false)` on mismatch; `Err` only for a malformed stored hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Argon2id hash of no real password, with the same parameters as
/// [`Argon2::default`]. Checked against when a login names an unknown account
/// so that path costs one full verification too.
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$e/Gul5NT/BbpgE/5iZcXCQ$jvXaoQ3LvnfJnRQEOJn3WRngOwhVRNpyeQ99iYrGhFY";

/// Run a verification that always fails, for logins without an account.
pub fn verify_dummy_password(password: &str) {
    let _ = verify_password(password, DUMMY_HASH);
}
