//! User domain models
//!
//! `User` is the internal representation loaded from the store; it carries
//! credential hashes and is never serialized to clients. `UserInfo` is the
//! outward-facing projection.

use serde::{Deserialize, Serialize};

use super::path::PathInfo;

/// A user as stored in the database
///
/// The password and the API-key secret are hashed with independent salts and
/// kept in separate columns so rotating one never invalidates the other. The
/// fingerprint is a stable, non-secret identifier used to index API-key
/// lookups without touching the secret's hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Database row id
    pub id: i64,

    /// Unique, case-sensitive username
    pub username: String,

    /// Whether this user bypasses ownership checks
    pub is_admin: bool,

    /// Argon2 hash of the password (PHC string)
    pub password_hash: String,

    /// Argon2 hash of the API-key secret (PHC string)
    pub api_key_secret_hash: String,

    /// Unique, indexed API-key fingerprint
    pub api_key_fingerprint: String,
}

/// Field set for inserting a new user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub is_admin: bool,
    pub password_hash: String,
    pub api_key_secret_hash: String,
    pub api_key_fingerprint: String,
}

/// Outward-facing user projection: name, admin flag and owned redirects
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,

    pub is_admin: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<PathInfo>,
}

/// Request body for creating a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub create_user: String,
    pub create_password: String,
}

/// Request body for changing a password and/or regenerating an API key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatchUserRequest {
    #[serde(default)]
    pub new_password: Option<String>,

    #[serde(default)]
    pub new_api_key: bool,
}

/// Response carrying a freshly generated API key in its wire form
///
/// The key is only returned once, at creation or regeneration time; it
/// cannot be recovered later.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiKeyResponse {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_info_serialization_omits_empty_paths() {
        let info = UserInfo {
            username: "alice".to_string(),
            is_admin: false,
            paths: vec![],
        };

        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("paths"));
    }

    #[test]
    fn test_user_info_serialization_with_paths() {
        let info = UserInfo {
            username: "alice".to_string(),
            is_admin: true,
            paths: vec![PathInfo {
                path: "gl".to_string(),
                target: "http://google.com".to_string(),
            }],
        };

        let json = serde_json::to_string(&info).unwrap();
        let parsed: UserInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info, parsed);
    }

    #[test]
    fn test_patch_user_request_defaults() {
        let req: PatchUserRequest = serde_json::from_str("{}").unwrap();
        assert!(req.new_password.is_none());
        assert!(!req.new_api_key);
    }

    #[test]
    fn test_api_key_response_omits_empty_key() {
        let json = serde_json::to_string(&ApiKeyResponse::default()).unwrap();
        assert_eq!(json, "{}");
    }
}
