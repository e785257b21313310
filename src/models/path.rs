//! Redirect path domain models

use serde::{Deserialize, Serialize};

/// A redirect mapping as stored in the database
///
/// Paths are never mutated in place; changing a target means deleting and
/// recreating the entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    /// Unique short key
    pub path: String,

    /// Target URL the key resolves to
    pub target: String,

    /// Owning user id
    pub user_id: i64,
}

/// The path/target pair shown to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathInfo {
    pub path: String,
    pub target: String,
}

/// Request body for creating a redirect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePathRequest {
    pub path: String,
    pub target: String,
}

/// Request body for deleting a redirect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletePathRequest {
    pub path: String,
}
