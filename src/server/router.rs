//! HTTP router for waypost
//!
//! Builds the axum router from the per-group endpoint configuration. Each
//! enabled group gets its own sub-router; groups with `auth` set are
//! wrapped in the authentication and permission middleware, so the policy
//! is decided entirely at construction time.

use axum::{
    extract::{Extension, Path, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::{self, AuthResolver};
use crate::cache::RedirectCache;
use crate::config::{EndpointConfig, ValidationRules};
use crate::database::{PathStore, UserStore};
use crate::error::DbError;
use crate::models::{
    ApiKeyResponse, CreatePathRequest, CreateUserRequest, DeletePathRequest, Identity, NewUser,
    PatchUserRequest, PathEntry, SessionToken, UserInfo,
};

use super::middleware::{
    auth_middleware, logging_middleware, permission_middleware, AuthLayerState, ErrorResponse,
    PermissionLayerState,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Authentication state machine
    pub resolver: Arc<AuthResolver>,

    /// User store
    pub users: Arc<dyn UserStore>,

    /// Path store; in production this is the caching decorator
    pub paths: Arc<dyn PathStore>,

    /// Redirect cache, used directly for batch invalidation on user
    /// deletion
    pub cache: Arc<RedirectCache>,

    /// Immutable input validation rules
    pub rules: Arc<ValidationRules>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Response carrying a freshly signed bearer assertion
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtResponse {
    pub jwt: String,
}

/// Build the main application router
///
/// Disabled groups are simply not registered; their routes answer 404.
pub fn build_router(state: AppState, endpoints: &HashMap<String, EndpointConfig>) -> Router {
    let mut router = Router::new().route("/health", get(health_handler));

    let group = |name: &str| endpoints.get(name).cloned().unwrap_or_default();

    let ep = group("redirect");
    if ep.enabled {
        let routes = Router::new().route("/go/:path", get(redirect_handler));
        router = router.merge(guard(routes, &state, &ep));
    }

    let ep = group("create_users");
    if ep.enabled {
        let routes = Router::new().route("/api/users", post(create_user_handler));
        router = router.merge(guard(routes, &state, &ep));
    }

    let ep = group("list_users");
    if ep.enabled {
        let routes = Router::new().route("/api/users", get(list_users_handler));
        router = router.merge(guard(routes, &state, &ep));
    }

    let ep = group("manage_users");
    if ep.enabled {
        let routes = Router::new()
            .route("/api/users/:user", get(get_user_handler))
            .route("/api/users/:user", patch(update_user_handler))
            .route("/api/users/:user", delete(delete_user_handler));
        router = router.merge(guard(routes, &state, &ep));
    }

    let ep = group("manage_paths");
    if ep.enabled {
        let routes = Router::new()
            .route("/api/path", post(create_path_handler))
            .route("/api/path", delete(delete_path_handler));
        router = router.merge(guard(routes, &state, &ep));
    }

    let ep = group("session");
    if ep.enabled {
        let routes = Router::new()
            .route("/api/auth/token", get(get_session_token_handler))
            .route("/api/auth/token", delete(delete_session_token_handler));
        router = router.merge(guard(routes, &state, &ep));
    }

    let ep = group("jwt");
    if ep.enabled {
        let routes = Router::new().route("/api/auth/jwt", get(get_jwt_handler));
        router = router.merge(guard(routes, &state, &ep));
    }

    router
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

/// Wrap a group's routes in the auth and permission middleware when the
/// group requires authentication
fn guard(
    routes: Router<AppState>,
    state: &AppState,
    ep: &EndpointConfig,
) -> Router<AppState> {
    if !ep.auth {
        return routes;
    }

    let auth_state = AuthLayerState {
        resolver: Arc::clone(&state.resolver),
        allow_anonymous: ep.allow_anonymous,
    };
    let permission_state = PermissionLayerState {
        admin_only: ep.admin_only,
    };

    // The outermost route layer runs first: authenticate, then authorize
    routes
        .route_layer(middleware::from_fn_with_state(
            permission_state,
            permission_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(auth_state, auth_middleware))
}

// =============================================================================
// Health
// =============================================================================

/// Health check endpoint handler
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Redirect
// =============================================================================

/// Resolve a short path and redirect to its target
async fn redirect_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, ErrorResponse> {
    match state.paths.get_target(&path).await {
        Ok(Some(target)) => {
            Ok((StatusCode::FOUND, [(header::LOCATION, target)]).into_response())
        }
        Ok(None) => Err(ErrorResponse::not_found()),
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// Users
// =============================================================================

/// Create a user and return its API key, exactly once
async fn create_user_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<ApiKeyResponse>, ErrorResponse> {
    if !state.rules.valid_username(&req.create_user) {
        return Err(ErrorResponse::bad_request("invalid username"));
    }
    if !state.rules.valid_password(&req.create_password) {
        return Err(ErrorResponse::bad_request("invalid password"));
    }

    let password_hash = auth::hash_secret(&req.create_password).map_err(internal)?;

    let secret = auth::generate_secret(auth::SECRET_BYTES).map_err(internal)?;
    let fingerprint = auth::generate_secret(auth::FINGERPRINT_BYTES).map_err(internal)?;
    let secret_hash = auth::hash_secret(&secret).map_err(internal)?;

    let user = NewUser {
        username: req.create_user,
        is_admin: false,
        password_hash,
        api_key_secret_hash: secret_hash,
        api_key_fingerprint: fingerprint.clone(),
    };

    match state.users.insert_user(&user).await {
        Ok(()) => Ok(Json(ApiKeyResponse {
            api_key: auth::encode_api_key(&fingerprint, &secret),
        })),
        Err(DbError::Duplicate) => Err(ErrorResponse::conflict("user already exists")),
        Err(e) => Err(e.into()),
    }
}

/// Fetch a user with their redirects
async fn get_user_handler(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<UserInfo>, ErrorResponse> {
    match state.users.get_user_info(&user).await? {
        Some(info) => Ok(Json(info)),
        None => Err(ErrorResponse::not_found()),
    }
}

/// List all users
async fn list_users_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserInfo>>, ErrorResponse> {
    let users = state.users.list_users().await?;
    Ok(Json(users))
}

/// Change a user's password and/or regenerate their API key
async fn update_user_handler(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(req): Json<PatchUserRequest>,
) -> Result<Json<ApiKeyResponse>, ErrorResponse> {
    let mut response = ApiKeyResponse::default();

    if let Some(new_password) = &req.new_password {
        if !state.rules.valid_password(new_password) {
            return Err(ErrorResponse::bad_request("invalid password"));
        }

        let password_hash = auth::hash_secret(new_password).map_err(internal)?;
        state.users.update_password(&user, &password_hash).await?;
    }

    if req.new_api_key {
        let secret = auth::generate_secret(auth::SECRET_BYTES).map_err(internal)?;
        let fingerprint = auth::generate_secret(auth::FINGERPRINT_BYTES).map_err(internal)?;
        let secret_hash = auth::hash_secret(&secret).map_err(internal)?;

        state
            .users
            .update_api_key(&user, &fingerprint, &secret_hash)
            .await?;

        response.api_key = auth::encode_api_key(&fingerprint, &secret);
    }

    Ok(Json(response))
}

/// Delete a user; cascades to their paths and session token
async fn delete_user_handler(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<StatusCode, ErrorResponse> {
    // Collect the user's redirects first so the cache can be invalidated
    // after the cascade removes them
    let owned: Vec<String> = match state.users.get_user_info(&user).await? {
        Some(info) => info.paths.into_iter().map(|p| p.path).collect(),
        None => Vec::new(),
    };

    state.users.delete_user(&user).await?;

    if !owned.is_empty() {
        if let Err(e) = state.cache.invalidate(&owned).await {
            tracing::warn!(username = %user, error = %e, "failed to invalidate deleted user's paths");
        }
    }

    Ok(StatusCode::OK)
}

// =============================================================================
// Paths
// =============================================================================

/// Create a redirect owned by the caller
async fn create_path_handler(
    State(state): State<AppState>,
    identity: Option<Extension<Identity>>,
    Json(req): Json<CreatePathRequest>,
) -> Result<StatusCode, ErrorResponse> {
    let Some(user) = identity.and_then(|Extension(i)| i.user) else {
        return Err(ErrorResponse::unauthorized("authentication required"));
    };

    if req.path.is_empty() || req.target.is_empty() {
        return Err(ErrorResponse::bad_request("path and target are required"));
    }

    let entry = PathEntry {
        path: req.path,
        target: req.target,
        user_id: user.id,
    };

    match state.paths.insert_path(&entry).await {
        Ok(()) => Ok(StatusCode::OK),
        Err(DbError::Duplicate) => Err(ErrorResponse::conflict("path already exists")),
        Err(e) => Err(e.into()),
    }
}

/// Delete a redirect; admins may delete anyone's
async fn delete_path_handler(
    State(state): State<AppState>,
    identity: Option<Extension<Identity>>,
    Json(req): Json<DeletePathRequest>,
) -> Result<StatusCode, ErrorResponse> {
    let Some(user) = identity.and_then(|Extension(i)| i.user) else {
        return Err(ErrorResponse::unauthorized("authentication required"));
    };

    let owner = if user.is_admin { None } else { Some(user.id) };
    state.paths.delete_path(&req.path, owner).await?;

    Ok(StatusCode::OK)
}

// =============================================================================
// Session tokens and assertions
// =============================================================================

/// Lazily create, or return, the caller's session token
async fn get_session_token_handler(
    State(state): State<AppState>,
    identity: Option<Extension<Identity>>,
) -> Result<Json<SessionToken>, ErrorResponse> {
    let Some(user) = identity.and_then(|Extension(i)| i.user) else {
        return Err(ErrorResponse::bad_request("no authenticated user"));
    };

    let token = state.resolver.issue_session_token(&user.username).await?;
    Ok(Json(token))
}

/// Destroy the caller's session token
async fn delete_session_token_handler(
    State(state): State<AppState>,
    identity: Option<Extension<Identity>>,
) -> Result<StatusCode, ErrorResponse> {
    let Some(user) = identity.and_then(|Extension(i)| i.user) else {
        return Err(ErrorResponse::bad_request("no authenticated user"));
    };

    state.resolver.revoke_session_token(&user.username).await?;
    Ok(StatusCode::OK)
}

/// Issue a signed bearer assertion for the caller
async fn get_jwt_handler(
    State(state): State<AppState>,
    identity: Option<Extension<Identity>>,
) -> Result<Json<JwtResponse>, ErrorResponse> {
    let Some(user) = identity.and_then(|Extension(i)| i.user) else {
        return Err(ErrorResponse::bad_request("no authenticated user"));
    };

    let jwt = state.resolver.issue_assertion(&user)?;
    Ok(Json(JwtResponse { jwt }))
}

fn internal(error: impl std::fmt::Display) -> ErrorResponse {
    tracing::error!(error = %error, "credential material generation failed");
    ErrorResponse::internal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AssertionSigner;
    use crate::config::AuthConfig;
    use crate::database::{MockPathStore, MockTokenStore, MockUserStore};
    use crate::models::PathInfo;
    use axum_test::TestServer;

    fn open(name: &str) -> (String, EndpointConfig) {
        (
            name.to_string(),
            EndpointConfig {
                enabled: true,
                auth: false,
                admin_only: false,
                allow_anonymous: false,
            },
        )
    }

    fn open_endpoints() -> HashMap<String, EndpointConfig> {
        HashMap::from([
            open("redirect"),
            open("create_users"),
            open("list_users"),
            open("manage_users"),
        ])
    }

    fn test_state(users: MockUserStore, paths: MockPathStore) -> AppState {
        let config = AuthConfig::default();
        let resolver = AuthResolver::new(
            Arc::new(MockUserStore::new()),
            Arc::new(MockTokenStore::new()),
            AssertionSigner::new(b"test-secret", config.assertion_ttl_secs),
            &config,
        );

        AppState {
            resolver: Arc::new(resolver),
            users: Arc::new(users),
            paths: Arc::new(paths),
            cache: Arc::new(RedirectCache::disabled()),
            rules: Arc::new(ValidationRules::defaults()),
        }
    }

    fn test_server(users: MockUserStore, paths: MockPathStore) -> TestServer {
        let app = build_router(test_state(users, paths), &open_endpoints());
        TestServer::new(app).unwrap()
    }

    // Test 1: Health endpoint returns OK
    #[tokio::test]
    async fn test_health_endpoint() {
        let server = test_server(MockUserStore::new(), MockPathStore::new());

        let response = server.get("/health").await;
        response.assert_status_ok();

        let body: HealthResponse = response.json();
        assert_eq!(body.status, "healthy");
        assert!(!body.version.is_empty());
    }

    // Test 2: A known path answers with a redirect
    #[tokio::test]
    async fn test_redirect_found() {
        let mut paths = MockPathStore::new();
        paths
            .expect_get_target()
            .returning(|_| Ok(Some("http://google.com".to_string())));

        let server = test_server(MockUserStore::new(), paths);

        let response = server.get("/go/gl").await;
        response.assert_status(StatusCode::FOUND);
        assert_eq!(response.header("location"), "http://google.com");
    }

    // Test 3: An unknown path is 404
    #[tokio::test]
    async fn test_redirect_not_found() {
        let mut paths = MockPathStore::new();
        paths.expect_get_target().returning(|_| Ok(None));

        let server = test_server(MockUserStore::new(), paths);

        let response = server.get("/go/missing").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    // Test 4: A store failure during redirect is an internal error
    #[tokio::test]
    async fn test_redirect_store_failure() {
        let mut paths = MockPathStore::new();
        paths
            .expect_get_target()
            .returning(|_| Err(DbError::Connection("closed".to_string())));

        let server = test_server(MockUserStore::new(), paths);

        let response = server.get("/go/gl").await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    }

    // Test 5: Creating a user returns a decodable API key
    #[tokio::test]
    async fn test_create_user_returns_api_key() {
        let mut users = MockUserStore::new();
        users.expect_insert_user().times(1).returning(|_| Ok(()));

        let server = test_server(users, MockPathStore::new());

        let response = server
            .post("/api/users")
            .json(&serde_json::json!({
                "create_user": "alice",
                "create_password": "superpassword"
            }))
            .await;
        response.assert_status_ok();

        let body: ApiKeyResponse = response.json();
        assert!(!body.api_key.is_empty());
        let (fingerprint, secret) = auth::decode_api_key(&body.api_key).unwrap();
        assert!(!fingerprint.is_empty());
        assert!(!secret.is_empty());
    }

    // Test 6: Invalid usernames and passwords are rejected up front
    #[tokio::test]
    async fn test_create_user_validation() {
        let mut users = MockUserStore::new();
        users.expect_insert_user().never();

        let server = test_server(users, MockPathStore::new());

        let response = server
            .post("/api/users")
            .json(&serde_json::json!({
                "create_user": "Not Valid",
                "create_password": "superpassword"
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .post("/api/users")
            .json(&serde_json::json!({
                "create_user": "alice",
                "create_password": "short"
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    // Test 7: A duplicate username is a conflict
    #[tokio::test]
    async fn test_create_user_duplicate() {
        let mut users = MockUserStore::new();
        users
            .expect_insert_user()
            .returning(|_| Err(DbError::Duplicate));

        let server = test_server(users, MockPathStore::new());

        let response = server
            .post("/api/users")
            .json(&serde_json::json!({
                "create_user": "alice",
                "create_password": "superpassword"
            }))
            .await;
        response.assert_status(StatusCode::CONFLICT);
    }

    // Test 8: Fetching a user returns their info, 404 when absent
    #[tokio::test]
    async fn test_get_user() {
        let mut users = MockUserStore::new();
        users.expect_get_user_info().returning(|name| {
            if name == "alice" {
                Ok(Some(UserInfo {
                    username: "alice".to_string(),
                    is_admin: false,
                    paths: vec![PathInfo {
                        path: "gl".to_string(),
                        target: "http://google.com".to_string(),
                    }],
                }))
            } else {
                Ok(None)
            }
        });

        let server = test_server(users, MockPathStore::new());

        let response = server.get("/api/users/alice").await;
        response.assert_status_ok();
        let body: UserInfo = response.json();
        assert_eq!(body.username, "alice");
        assert_eq!(body.paths.len(), 1);

        let response = server.get("/api/users/bob").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    // Test 9: Listing users
    #[tokio::test]
    async fn test_list_users() {
        let mut users = MockUserStore::new();
        users.expect_list_users().returning(|| {
            Ok(vec![
                UserInfo {
                    username: "alice".to_string(),
                    is_admin: false,
                    paths: vec![],
                },
                UserInfo {
                    username: "bob".to_string(),
                    is_admin: true,
                    paths: vec![],
                },
            ])
        });

        let server = test_server(users, MockPathStore::new());

        let response = server.get("/api/users").await;
        response.assert_status_ok();
        let body: Vec<UserInfo> = response.json();
        assert_eq!(body.len(), 2);
    }

    // Test 10: Deleting a user invalidates their cached paths
    #[tokio::test]
    async fn test_delete_user() {
        let mut users = MockUserStore::new();
        users.expect_get_user_info().returning(|_| {
            Ok(Some(UserInfo {
                username: "alice".to_string(),
                is_admin: false,
                paths: vec![PathInfo {
                    path: "gl".to_string(),
                    target: "http://google.com".to_string(),
                }],
            }))
        });
        users.expect_delete_user().times(1).returning(|_| Ok(()));

        let server = test_server(users, MockPathStore::new());

        let response = server.delete("/api/users/alice").await;
        response.assert_status_ok();
    }

    // Test 11: Disabled groups are not routed
    #[tokio::test]
    async fn test_disabled_group_not_routed() {
        let endpoints = HashMap::from([open("redirect")]);
        let app = build_router(
            test_state(MockUserStore::new(), MockPathStore::new()),
            &endpoints,
        );
        let server = TestServer::new(app).unwrap();

        let response = server.get("/api/users").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    // Test 12: Path creation without an identity is unauthorized even on a
    // misconfigured open group
    #[tokio::test]
    async fn test_create_path_requires_identity() {
        let endpoints = HashMap::from([open("manage_paths")]);
        let app = build_router(
            test_state(MockUserStore::new(), MockPathStore::new()),
            &endpoints,
        );
        let server = TestServer::new(app).unwrap();

        let response = server
            .post("/api/path")
            .json(&serde_json::json!({
                "path": "gl",
                "target": "http://google.com"
            }))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }
}
