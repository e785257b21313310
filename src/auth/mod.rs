//! Authentication and authorization for waypost
//!
//! This module provides:
//! - Secret hashing and random generation
//! - Wire codecs for API keys and basic credentials
//! - Signed bearer assertions
//! - The multi-scheme authentication resolver
//! - The pure permission evaluator

pub mod assertion;
pub mod codec;
pub mod permissions;
pub mod resolver;
pub mod secret;

pub use assertion::{AssertionClaims, AssertionError, AssertionSigner};
pub use codec::{decode_api_key, decode_basic, encode_api_key, CodecError};
pub use permissions::authorize;
pub use resolver::{AuthOutcome, AuthResolver, API_KEY_HEADER, SESSION_TOKEN_HEADER};
pub use secret::{
    generate_secret, hash_secret, verify_secret, EntropyError, HashError, FINGERPRINT_BYTES,
    SECRET_BYTES,
};
