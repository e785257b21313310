//! Multi-scheme authentication resolver
//!
//! One credential scheme is honored per request, in fixed precedence:
//! the session-token header first, then the API-key header, then the
//! `Authorization` header (Basic or Bearer). If the highest-precedence
//! header present is malformed the request fails; schemes are never
//! combined or retried. Scheme enablement is read from configuration at
//! construction; a disabled scheme's header is treated as absent.
//!
//! The only side effect on the authentication path is the best-effort
//! session-token renewal write; every other branch is read-only.

use std::sync::Arc;

use axum::http::{header, HeaderMap};
use chrono::Utc;

use crate::config::{AuthConfig, AuthSchemesConfig};
use crate::database::{TokenStore, UserStore};
use crate::error::AuthError;
use crate::models::{Credential, SessionToken, User};

use super::assertion::{AssertionError, AssertionSigner};
use super::codec;
use super::secret;

/// Header carrying a raw session token
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

/// Header carrying an API key in its wire form
pub const API_KEY_HEADER: &str = "x-api-key";

/// Terminal state of a successful authentication pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// A credential was presented and resolved to a user
    Authenticated(User),

    /// No credential was presented and the route permits that
    Anonymous,
}

/// The authentication state machine
pub struct AuthResolver {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn TokenStore>,
    signer: AssertionSigner,
    schemes: AuthSchemesConfig,
    session_token_ttl_secs: i64,
    renewal_window_secs: i64,
}

impl AuthResolver {
    /// Create a resolver over the given stores
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenStore>,
        signer: AssertionSigner,
        config: &AuthConfig,
    ) -> Self {
        Self {
            users,
            tokens,
            signer,
            schemes: config.schemes.clone(),
            session_token_ttl_secs: config.session_token_ttl_secs,
            renewal_window_secs: config.renewal_window_secs,
        }
    }

    /// Authenticate one request's headers
    ///
    /// Returns the resolved user, the distinguished anonymous outcome for a
    /// credential-less request on an anonymous-permitted route, or the
    /// rejection. Store failures surface as [`AuthError::Store`], distinct
    /// from credential mismatches.
    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
        allow_anonymous: bool,
    ) -> Result<AuthOutcome, AuthError> {
        match self.extract_credential(headers)? {
            Some(credential) => self
                .resolve(credential)
                .await
                .map(AuthOutcome::Authenticated),
            None if allow_anonymous => Ok(AuthOutcome::Anonymous),
            None => Err(AuthError::MissingCredentials),
        }
    }

    /// Pick the single credential to evaluate, by precedence
    fn extract_credential(&self, headers: &HeaderMap) -> Result<Option<Credential>, AuthError> {
        if self.schemes.session_token {
            if let Some(value) = headers.get(SESSION_TOKEN_HEADER) {
                let token = value
                    .to_str()
                    .map_err(|_| AuthError::Malformed("session token is not valid ascii"))?
                    .trim();
                if token.is_empty() {
                    return Err(AuthError::Malformed("empty session token"));
                }
                return Ok(Some(Credential::SessionToken(token.to_string())));
            }
        }

        if self.schemes.api_key {
            if let Some(value) = headers.get(API_KEY_HEADER) {
                let raw = value
                    .to_str()
                    .map_err(|_| AuthError::Malformed("api key is not valid ascii"))?;
                let (fingerprint, secret) = codec::decode_api_key(raw.trim())
                    .map_err(|_| AuthError::Malformed("invalid api key encoding"))?;
                return Ok(Some(Credential::ApiKey {
                    fingerprint,
                    secret,
                }));
            }
        }

        if let Some(value) = headers.get(header::AUTHORIZATION) {
            let raw = value
                .to_str()
                .map_err(|_| AuthError::Malformed("authorization header is not valid ascii"))?;
            let (scheme, payload) = raw
                .split_once(' ')
                .ok_or(AuthError::Malformed("authorization header missing scheme"))?;

            return match scheme {
                "Basic" if self.schemes.basic => {
                    let (username, password) = codec::decode_basic(payload.trim())
                        .map_err(|_| AuthError::Malformed("invalid basic credentials"))?;
                    Ok(Some(Credential::Basic { username, password }))
                }
                "Bearer" if self.schemes.bearer => {
                    Ok(Some(Credential::Bearer(payload.trim().to_string())))
                }
                // A disabled scheme's header is treated as absent
                "Basic" | "Bearer" => Ok(None),
                _ => Err(AuthError::Malformed("unsupported authorization scheme")),
            };
        }

        Ok(None)
    }

    /// Resolve the selected credential to a user
    async fn resolve(&self, credential: Credential) -> Result<User, AuthError> {
        match credential {
            Credential::SessionToken(token) => self.resolve_session_token(&token).await,

            Credential::ApiKey {
                fingerprint,
                secret,
            } => {
                let user = self
                    .users
                    .get_user_by_fingerprint(&fingerprint)
                    .await?
                    .ok_or(AuthError::InvalidCredentials)?;

                if !secret::verify_secret(&user.api_key_secret_hash, &secret) {
                    return Err(AuthError::InvalidCredentials);
                }

                Ok(user)
            }

            Credential::Basic { username, password } => {
                let user = self
                    .users
                    .get_user(&username)
                    .await?
                    .ok_or(AuthError::InvalidCredentials)?;

                if !secret::verify_secret(&user.password_hash, &password) {
                    return Err(AuthError::InvalidCredentials);
                }

                Ok(user)
            }

            Credential::Bearer(assertion) => {
                let claims = self.signer.verify(&assertion).map_err(|e| match e {
                    AssertionError::Expired => AuthError::TokenExpired,
                    _ => AuthError::InvalidCredentials,
                })?;

                // The user must be re-loaded: a user deleted after the
                // assertion was issued must not remain authenticated.
                self.users
                    .get_user(&claims.sub)
                    .await?
                    .ok_or(AuthError::InvalidCredentials)
            }
        }
    }

    /// Resolve a raw session token, renewing it when it is close to expiry
    async fn resolve_session_token(&self, token: &str) -> Result<User, AuthError> {
        let record = self
            .tokens
            .get_token(token)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let now = Utc::now().timestamp();

        if record.is_expired(now) {
            return Err(AuthError::TokenExpired);
        }

        if record.needs_renewal(now, self.renewal_window_secs) {
            let renewed = now + self.session_token_ttl_secs;
            // Best effort: the current request succeeds either way
            if let Err(e) = self.tokens.update_token_expiry(&record.token, renewed).await {
                tracing::warn!(
                    username = %record.username,
                    error = %e,
                    "failed to persist session token renewal"
                );
            }
        }

        // The stored owner must still resolve to a live user
        self.users
            .get_user(&record.username)
            .await?
            .ok_or(AuthError::InvalidCredentials)
    }

    /// Lazily create, or return, the session token for a user
    ///
    /// An existing token whose expiration is inside the renewal window (or
    /// already past) is re-issued with a later expiration, keeping the same
    /// token string.
    pub async fn issue_session_token(&self, username: &str) -> Result<SessionToken, AuthError> {
        let now = Utc::now().timestamp();

        if let Some(existing) = self.tokens.get_token_for_user(username).await? {
            if existing.is_expired(now) || existing.needs_renewal(now, self.renewal_window_secs) {
                let renewed = now + self.session_token_ttl_secs;
                match self
                    .tokens
                    .update_token_expiry(&existing.token, renewed)
                    .await
                {
                    Ok(()) => {
                        return Ok(SessionToken::new(existing.token, username, renewed));
                    }
                    Err(e) => {
                        tracing::warn!(
                            username = %username,
                            error = %e,
                            "failed to persist session token renewal"
                        );
                        return Ok(existing);
                    }
                }
            }
            return Ok(existing);
        }

        let token = secret::generate_secret(secret::SECRET_BYTES)
            .map_err(|e| AuthError::Generation(e.to_string()))?;
        let record = SessionToken::new(token, username, now + self.session_token_ttl_secs);

        match self.tokens.insert_token(&record).await {
            Ok(()) => Ok(record),
            // A concurrent request created one first; return the winner
            Err(crate::error::DbError::Duplicate) => self
                .tokens
                .get_token_for_user(username)
                .await?
                .ok_or(AuthError::Store(crate::error::DbError::NotFound)),
            Err(e) => Err(e.into()),
        }
    }

    /// Destroy the session token owned by a user, if any
    pub async fn revoke_session_token(&self, username: &str) -> Result<(), AuthError> {
        self.tokens
            .delete_token_for_user(username)
            .await
            .map_err(Into::into)
    }

    /// Issue a signed bearer assertion for a user
    pub fn issue_assertion(&self, user: &User) -> Result<String, AuthError> {
        self.signer
            .sign(&user.username, user.is_admin)
            .map_err(|e| AuthError::Generation(e.to_string()))
    }
}
