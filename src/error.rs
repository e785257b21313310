//! Application error types for waypost
//!
//! This module defines the error taxonomy used throughout the application.
//! All error types use `thiserror` for ergonomic error handling. Mapping to
//! HTTP status codes happens at the server boundary, not here.

use thiserror::Error;

/// Authentication-related errors
///
/// `Malformed` is a client encoding problem (bad request); the credential
/// variants mean the client must re-authenticate; `Store` is an internal
/// fault and must be logged, never reported as a credential mismatch.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Credential header present but not decodable
    #[error("malformed credential: {0}")]
    Malformed(&'static str),

    /// Credential absent where one is required
    #[error("missing credentials")]
    MissingCredentials,

    /// Credential decoded but did not match any user or secret
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Session token or bearer assertion past its expiration
    #[error("token expired")]
    TokenExpired,

    /// Persistent store failure during a lookup
    #[error("store error: {0}")]
    Store(#[from] DbError),

    /// Secret generation or assertion signing failure
    #[error("credential generation failed: {0}")]
    Generation(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DbError {
    /// SQLite error
    #[error("database error: {0}")]
    Sqlite(rusqlite::Error),

    /// Unique-constraint violation on insert
    #[error("duplicate key")]
    Duplicate,

    /// Record not found
    #[error("record not found")]
    NotFound,

    /// Connection-level failure
    #[error("database connection error: {0}")]
    Connection(String),
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        // SQLITE_CONSTRAINT_PRIMARYKEY / SQLITE_CONSTRAINT_UNIQUE
        if let rusqlite::Error::SqliteFailure(f, _) = &err {
            if f.extended_code == 1555 || f.extended_code == 2067 {
                return DbError::Duplicate;
            }
        }
        DbError::Sqlite(err)
    }
}

impl From<tokio_rusqlite::Error> for DbError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::Rusqlite(e) => DbError::from(e),
            other => DbError::Connection(other.to_string()),
        }
    }
}

/// Cache-related errors
///
/// These never escape the cache boundary as request failures; callers log
/// them and fall through to the persistent store.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CacheError {
    /// Networked-tier transport or protocol failure
    #[error("cache backend error: {0}")]
    Backend(String),

    /// Batch invalidation finished with some keys undeleted
    #[error("cache invalidation incomplete: {failed}/{total} keys failed, last error: {last}")]
    Invalidation {
        failed: usize,
        total: usize,
        last: String,
    },
}
