//! Secret hashing and generation
//!
//! This module provides one-way salted hashing for passwords and API-key
//! secrets, and cryptographically secure random secret generation. Both
//! kinds of secret are hashed identically but stored in separate columns so
//! rotating one never invalidates the other.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;

/// Byte length of generated API-key secrets and session tokens
pub const SECRET_BYTES: usize = 32;

/// Byte length of generated API-key fingerprints
pub const FINGERPRINT_BYTES: usize = 16;

/// Hash a plaintext secret with Argon2id
///
/// The cost parameters are the library defaults, fixed for the lifetime of
/// the process; stored hashes are never re-hashed at a different cost.
///
/// # Errors
///
/// Returns an error only on salt-generation or library failure, never on
/// any property of the input.
pub fn hash_secret(plaintext: &str) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| HashError::HashFailed(e.to_string()))
}

/// Verify a candidate secret against a stored hash
///
/// A malformed stored hash is treated as a verification failure, not a
/// fault. Comparison is performed by the argon2 crate with constant-time
/// semantics.
pub fn verify_secret(hash: &str, candidate: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate `n` random bytes from the OS RNG, URL-safe base64 encoded
///
/// # Errors
///
/// Returns [`EntropyError`] if the OS cannot produce `n` bytes; output is
/// never silently short-filled.
pub fn generate_secret(n: usize) -> Result<String, EntropyError> {
    let mut bytes = vec![0u8; n];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| EntropyError(e.to_string()))?;

    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Error type for hashing operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HashError {
    /// Hashing failed
    #[error("Hash failed: {0}")]
    HashFailed(String),
}

/// The OS RNG could not produce the requested number of bytes
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("entropy source failure: {0}")]
pub struct EntropyError(pub String);
