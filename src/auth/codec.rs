//! Wire encodings for credentials transmitted in headers
//!
//! API keys travel as `base64url(fingerprint) + "." + secret`: the
//! fingerprint segment is a stable, non-secret identifier the store indexes
//! on, so a lookup never depends on the secret or its hash. Basic
//! credentials follow RFC 7617; the username/password split happens on the
//! first colon only, since passwords may contain colons.

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};

/// Encode an API key into its wire form
pub fn encode_api_key(fingerprint: &str, secret: &str) -> String {
    format!("{}.{}", URL_SAFE_NO_PAD.encode(fingerprint), secret)
}

/// Decode an API key wire form into (fingerprint, secret)
///
/// # Errors
///
/// Fails if the separator is missing, the fingerprint segment is not valid
/// base64url, or the decoded fingerprint is not UTF-8.
pub fn decode_api_key(wire: &str) -> Result<(String, String), CodecError> {
    let (encoded_fingerprint, secret) =
        wire.split_once('.').ok_or(CodecError::InvalidKeyFormat)?;

    let fingerprint_bytes = URL_SAFE_NO_PAD
        .decode(encoded_fingerprint)
        .map_err(|_| CodecError::InvalidKeyFormat)?;
    let fingerprint =
        String::from_utf8(fingerprint_bytes).map_err(|_| CodecError::InvalidKeyFormat)?;

    if fingerprint.is_empty() || secret.is_empty() {
        return Err(CodecError::InvalidKeyFormat);
    }

    Ok((fingerprint, secret.to_string()))
}

/// Decode the payload of a `Basic` Authorization header into
/// (username, password)
///
/// # Errors
///
/// Fails on invalid base64, non-UTF-8 content, or a missing colon.
pub fn decode_basic(encoded: &str) -> Result<(String, String), CodecError> {
    let decoded = STANDARD
        .decode(encoded)
        .map_err(|_| CodecError::InvalidAuthFormat)?;
    let decoded = String::from_utf8(decoded).map_err(|_| CodecError::InvalidAuthFormat)?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or(CodecError::InvalidAuthFormat)?;

    Ok((username.to_string(), password.to_string()))
}

/// Credential decoding errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    /// API key wire form could not be decoded
    #[error("invalid api key format")]
    InvalidKeyFormat,

    /// Authorization header payload could not be decoded
    #[error("invalid authorization format")]
    InvalidAuthFormat,
}
