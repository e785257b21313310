//! Database layer for waypost
//!
//! This module defines the store capability traits and the SQLite
//! implementation. The traits are deliberately narrow: authentication only
//! sees `UserStore` and `TokenStore`, redirect resolution only `PathStore`,
//! and the caching decorator implements `PathStore` over an inner store.
//! Each trait uses `async_trait` and `mockall::automock` for testing.

pub mod migrations;
pub mod sqlite;

pub use sqlite::SqliteDatabase;

use async_trait::async_trait;

use crate::error::DbError;
use crate::models::{NewUser, PathEntry, SessionToken, User, UserInfo};

/// User persistence operations
///
/// Lookups return `Ok(None)` for missing rows; `DbError::Duplicate` is the
/// distinguished unique-constraint condition on insert.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch a full user row by username
    async fn get_user(&self, username: &str) -> Result<Option<User>, DbError>;

    /// Fetch a full user row by API-key fingerprint
    async fn get_user_by_fingerprint(&self, fingerprint: &str) -> Result<Option<User>, DbError>;

    /// Fetch the outward-facing projection of a user with owned paths
    async fn get_user_info(&self, username: &str) -> Result<Option<UserInfo>, DbError>;

    /// List all users without their paths
    async fn list_users(&self) -> Result<Vec<UserInfo>, DbError>;

    /// Insert a new user
    async fn insert_user(&self, user: &NewUser) -> Result<(), DbError>;

    /// Replace a user's password hash
    async fn update_password(&self, username: &str, password_hash: &str) -> Result<(), DbError>;

    /// Replace a user's API-key fingerprint and secret hash together
    async fn update_api_key(
        &self,
        username: &str,
        fingerprint: &str,
        secret_hash: &str,
    ) -> Result<(), DbError>;

    /// Delete a user; cascades to owned paths and any session token
    async fn delete_user(&self, username: &str) -> Result<(), DbError>;
}

/// Redirect path persistence operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PathStore: Send + Sync {
    /// Resolve a short path to its target URL
    async fn get_target(&self, path: &str) -> Result<Option<String>, DbError>;

    /// Insert a new redirect mapping
    async fn insert_path(&self, entry: &PathEntry) -> Result<(), DbError>;

    /// Delete a redirect; with `owner` set, only a row owned by that user
    /// is removed. Deleting an absent row is not an error.
    async fn delete_path(&self, path: &str, owner: Option<i64>) -> Result<(), DbError>;
}

/// Session token persistence operations
///
/// The store enforces at most one live token per username.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Fetch a token record by its token string
    async fn get_token(&self, token: &str) -> Result<Option<SessionToken>, DbError>;

    /// Fetch the token owned by a username
    async fn get_token_for_user(&self, username: &str) -> Result<Option<SessionToken>, DbError>;

    /// Insert a new token record
    async fn insert_token(&self, token: &SessionToken) -> Result<(), DbError>;

    /// Move a token's expiration; a single-row update, so concurrent
    /// renewals are last-writer-wins
    async fn update_token_expiry(&self, token: &str, expires_at: i64) -> Result<(), DbError>;

    /// Delete the token owned by a username, if any
    async fn delete_token_for_user(&self, username: &str) -> Result<(), DbError>;
}
