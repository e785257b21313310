//! Signed bearer assertions
//!
//! The stateless alternative to session tokens: an HS256-signed,
//! time-bounded assertion carrying the subject username, the admin flag and
//! an expiration. Verification checks both the signature and the
//! expiration; expirations use the same unix-seconds clock as session-token
//! renewal. Holders are still re-checked against the user store at
//! authentication time, so a deleted user cannot keep authenticating with a
//! live assertion.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by a bearer assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Subject username
    pub sub: String,

    /// Admin flag at issuance time; informational only, the resolver trusts
    /// the re-loaded user row
    pub admin: bool,

    /// Absolute expiration, unix seconds
    pub exp: i64,
}

/// Signs and verifies bearer assertions with a fixed HMAC key
pub struct AssertionSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl AssertionSigner {
    /// Create a signer from the shared secret and assertion lifetime
    pub fn new(secret: &[u8], ttl_secs: i64) -> Self {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl_secs,
        }
    }

    /// Issue an assertion for a user
    pub fn sign(&self, username: &str, is_admin: bool) -> Result<String, AssertionError> {
        let claims = AssertionClaims {
            sub: username.to_string(),
            admin: is_admin,
            exp: Utc::now().timestamp() + self.ttl_secs,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AssertionError::Signing(e.to_string()))
    }

    /// Verify signature and expiration, returning the claims
    pub fn verify(&self, token: &str) -> Result<AssertionClaims, AssertionError> {
        decode::<AssertionClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AssertionError::Expired,
                _ => AssertionError::Invalid,
            })
    }
}

/// Bearer assertion errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssertionError {
    /// Signature or structure invalid
    #[error("invalid assertion")]
    Invalid,

    /// Assertion past its expiration
    #[error("assertion expired")]
    Expired,

    /// Could not produce a signature
    #[error("signing failed: {0}")]
    Signing(String),
}
