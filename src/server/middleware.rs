//! HTTP middleware for waypost
//!
//! This module provides the middleware layers wired per endpoint group:
//! - Authentication: runs the resolver over the request headers and
//!   attaches a typed [`Identity`] extension
//! - Permission: evaluates the pure authorization table against that
//!   identity
//! - Request/response logging

use axum::{
    extract::{RawPathParams, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Instant;

use crate::auth::{authorize, AuthOutcome, AuthResolver};
use crate::error::{AuthError, DbError};
use crate::models::Identity;

/// State for the authentication middleware of one endpoint group
#[derive(Clone)]
pub struct AuthLayerState {
    pub resolver: Arc<AuthResolver>,

    /// Whether a credential-less request passes as the anonymous identity
    pub allow_anonymous: bool,
}

/// State for the permission middleware of one endpoint group
#[derive(Clone)]
pub struct PermissionLayerState {
    pub admin_only: bool,
}

/// Authentication middleware function
///
/// Resolves the request's credential headers and attaches the resulting
/// [`Identity`] — the resolved user plus the `:user` path segment the
/// request targets — as a request extension. Rejections map to 400/401/500
/// per the error taxonomy.
pub async fn auth_middleware(
    State(state): State<AuthLayerState>,
    params: RawPathParams,
    mut request: Request,
    next: Next,
) -> Result<Response, ErrorResponse> {
    let requested_owner = params
        .iter()
        .find(|(name, _)| *name == "user")
        .map(|(_, value)| value.to_string())
        .unwrap_or_default();

    let outcome = state
        .resolver
        .authenticate(request.headers(), state.allow_anonymous)
        .await
        .map_err(ErrorResponse::from)?;

    let identity = match outcome {
        AuthOutcome::Authenticated(user) => Identity::authenticated(user, requested_owner),
        AuthOutcome::Anonymous => Identity::anonymous(requested_owner),
    };

    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// Permission middleware function
///
/// Evaluates the authorization table for the identity attached by the
/// authentication middleware. A request that reaches this layer without an
/// identity is treated as anonymous.
pub async fn permission_middleware(
    State(state): State<PermissionLayerState>,
    request: Request,
    next: Next,
) -> Result<Response, ErrorResponse> {
    let identity = request
        .extensions()
        .get::<Identity>()
        .cloned()
        .unwrap_or_else(|| Identity::anonymous(""));

    if !authorize(&identity, state.admin_only) {
        return Err(ErrorResponse::forbidden());
    }

    Ok(next.run(request).await)
}

/// Logging middleware function
///
/// Logs request and response details: method, path, status and duration.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        path = %uri.path(),
        status = %status.as_u16(),
        duration_ms = %elapsed.as_millis(),
        "Request completed"
    );

    response
}

/// JSON error response carrying one of the taxonomy's status codes
pub struct ErrorResponse {
    status: StatusCode,
    message: String,
}

impl ErrorResponse {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    pub fn forbidden() -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: "forbidden".to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: "not found".to_string(),
        }
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal error".to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AuthError> for ErrorResponse {
    fn from(error: AuthError) -> Self {
        match error {
            // Client encoding problems resolve locally, never logged as
            // faults
            AuthError::Malformed(detail) => Self::bad_request(detail),
            AuthError::MissingCredentials => Self::unauthorized("missing credentials"),
            AuthError::InvalidCredentials => Self::unauthorized("invalid credentials"),
            AuthError::TokenExpired => Self::unauthorized("token expired"),
            AuthError::Store(e) => {
                tracing::error!(error = %e, "store failure during authentication");
                Self::internal()
            }
            AuthError::Generation(e) => {
                tracing::error!(error = %e, "credential generation failure");
                Self::internal()
            }
        }
    }
}

impl From<DbError> for ErrorResponse {
    fn from(error: DbError) -> Self {
        match error {
            DbError::Duplicate => Self::conflict("duplicate key"),
            DbError::NotFound => Self::not_found(),
            other => {
                tracing::error!(error = %other, "store failure");
                Self::internal()
            }
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message
        });
        (
            self.status,
            [(header::CONTENT_TYPE, "application/json")],
            serde_json::to_string(&body).unwrap(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test 1: AuthError variants map to the taxonomy's status codes
    #[test]
    fn test_auth_error_mapping() {
        let resp = ErrorResponse::from(AuthError::Malformed("bad"));
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = ErrorResponse::from(AuthError::MissingCredentials);
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = ErrorResponse::from(AuthError::InvalidCredentials);
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = ErrorResponse::from(AuthError::TokenExpired);
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.message.contains("token expired"));

        let resp = ErrorResponse::from(AuthError::Store(DbError::NotFound));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    // Test 2: DbError variants map to conflict/not-found/internal
    #[test]
    fn test_db_error_mapping() {
        let resp = ErrorResponse::from(DbError::Duplicate);
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = ErrorResponse::from(DbError::NotFound);
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = ErrorResponse::from(DbError::Connection("closed".to_string()));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    // Test 3: the response body is a JSON error envelope
    #[tokio::test]
    async fn test_error_response_body() {
        let resp = ErrorResponse::bad_request("invalid username").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "invalid username");
    }
}
