//! Session token domain model

use serde::{Deserialize, Serialize};

/// A session token stored in the database
///
/// There is at most one live token per username; the store enforces this
/// with a unique constraint. Expirations are absolute unix timestamps so the
/// renewal update is a single-row, last-writer-wins statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    /// Opaque random token string, unique
    pub token: String,

    /// Owning username
    pub username: String,

    /// Absolute expiration, unix seconds
    pub expires_at: i64,
}

impl SessionToken {
    /// Create a new session token record
    pub fn new(token: impl Into<String>, username: impl Into<String>, expires_at: i64) -> Self {
        Self {
            token: token.into(),
            username: username.into(),
            expires_at,
        }
    }

    /// Check whether the token is expired at `now` (unix seconds)
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    /// Check whether the token is live but inside the trailing renewal
    /// window, i.e. should be re-issued with a later expiration when read
    pub fn needs_renewal(&self, now: i64, renewal_window_secs: i64) -> bool {
        !self.is_expired(now) && self.expires_at - now < renewal_window_secs
    }
}
