//! Request-scoped credential and identity types
//!
//! `Credential` is the tagged result of parsing one request's
//! credential-bearing headers. `Identity` is what the authentication
//! middleware attaches to the request as a typed extension: the resolved
//! user (or anonymous) plus the resource owner the request targets. The two
//! are deliberately separate values so the permission step can compare "who
//! is asking" against "whose resource is this".

use super::user::User;

/// One request's parsed credential
///
/// At most one variant is honored per request; precedence is decided by the
/// resolver, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Raw session token from the session-token header
    SessionToken(String),

    /// Decoded API key: non-secret fingerprint plus plaintext secret
    ApiKey { fingerprint: String, secret: String },

    /// Basic credentials from the Authorization header
    Basic { username: String, password: String },

    /// Signed bearer assertion from the Authorization header, unverified
    Bearer(String),
}

/// The identity attached to a request after authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// The resolved user; `None` for anonymous access
    pub user: Option<User>,

    /// Username segment of the route the request targets, empty when the
    /// route has no owner concept
    pub requested_owner: String,
}

impl Identity {
    /// Identity for an authenticated user
    pub fn authenticated(user: User, requested_owner: impl Into<String>) -> Self {
        Self {
            user: Some(user),
            requested_owner: requested_owner.into(),
        }
    }

    /// Identity for a request on an anonymous-permitted route
    pub fn anonymous(requested_owner: impl Into<String>) -> Self {
        Self {
            user: None,
            requested_owner: requested_owner.into(),
        }
    }

    /// Username of the caller, empty for anonymous
    pub fn username(&self) -> &str {
        self.user.as_ref().map(|u| u.username.as_str()).unwrap_or("")
    }

    /// Whether the caller is an authenticated admin
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.is_admin)
    }

    /// Whether no credential was presented
    pub fn is_anonymous(&self) -> bool {
        self.user.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(name: &str, admin: bool) -> User {
        User {
            id: 1,
            username: name.to_string(),
            is_admin: admin,
            password_hash: "hash".to_string(),
            api_key_secret_hash: "hash".to_string(),
            api_key_fingerprint: "fp".to_string(),
        }
    }

    #[test]
    fn test_authenticated_identity() {
        let identity = Identity::authenticated(test_user("alice", false), "alice");
        assert_eq!(identity.username(), "alice");
        assert!(!identity.is_admin());
        assert!(!identity.is_anonymous());
    }

    #[test]
    fn test_admin_identity() {
        let identity = Identity::authenticated(test_user("root", true), "");
        assert!(identity.is_admin());
    }

    #[test]
    fn test_anonymous_identity() {
        let identity = Identity::anonymous("");
        assert!(identity.is_anonymous());
        assert_eq!(identity.username(), "");
        assert!(!identity.is_admin());
    }
}
