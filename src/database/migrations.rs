//! Database schema for waypost
//!
//! The schema is applied as one idempotent batch at startup. Foreign keys
//! are switched on for the connection so user deletion cascades to owned
//! paths and session tokens.

/// Schema creation batch
pub const CREATE_SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    username            TEXT NOT NULL UNIQUE,
    is_admin            INTEGER NOT NULL DEFAULT 0,
    password_hash       TEXT NOT NULL,
    api_key_secret_hash TEXT NOT NULL,
    api_key_fingerprint TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS paths (
    path    TEXT PRIMARY KEY,
    target  TEXT NOT NULL,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_paths_user_id ON paths(user_id);

CREATE TABLE IF NOT EXISTS session_tokens (
    token      TEXT PRIMARY KEY,
    username   TEXT NOT NULL UNIQUE REFERENCES users(username) ON DELETE CASCADE,
    expires_at INTEGER NOT NULL
);
"#;
