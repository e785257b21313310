//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use waypost::auth::{AssertionSigner, AuthResolver};
use waypost::cache::RedirectCache;
use waypost::config::{AuthConfig, EndpointConfig, ValidationRules};
use waypost::database::{PathStore, SqliteDatabase, TokenStore, UserStore};
use waypost::redirect::CachingPathStore;
use waypost::server::{build_router, AppState};

pub const TEST_SIGNING_SECRET: &str = "integration-test-signing-secret";

/// Create an in-memory database for testing
pub async fn create_test_database() -> Arc<SqliteDatabase> {
    Arc::new(
        SqliteDatabase::in_memory()
            .await
            .expect("Failed to create test database"),
    )
}

/// Authentication configuration used by the integration suite
pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        signing_secret: Some(TEST_SIGNING_SECRET.to_string()),
        ..Default::default()
    }
}

/// Create a resolver over the given database
pub fn create_resolver(db: &Arc<SqliteDatabase>, config: &AuthConfig) -> Arc<AuthResolver> {
    let secret = config
        .signing_secret
        .clone()
        .unwrap_or_else(|| TEST_SIGNING_SECRET.to_string());

    Arc::new(AuthResolver::new(
        Arc::clone(db) as Arc<dyn UserStore>,
        Arc::clone(db) as Arc<dyn TokenStore>,
        AssertionSigner::new(secret.as_bytes(), config.assertion_ttl_secs),
        config,
    ))
}

/// Create a test application state over the database with the given cache
pub fn create_test_state_with_cache(
    db: &Arc<SqliteDatabase>,
    cache: Arc<RedirectCache>,
) -> AppState {
    let auth_config = test_auth_config();
    let paths: Arc<dyn PathStore> = Arc::new(CachingPathStore::new(
        Arc::clone(db) as Arc<dyn PathStore>,
        Arc::clone(&cache),
    ));

    AppState {
        resolver: create_resolver(db, &auth_config),
        users: Arc::clone(db) as Arc<dyn UserStore>,
        paths,
        cache,
        rules: Arc::new(ValidationRules::defaults()),
    }
}

/// Create a test application state with caching disabled
pub fn create_test_state(db: &Arc<SqliteDatabase>) -> AppState {
    create_test_state_with_cache(db, Arc::new(RedirectCache::disabled()))
}

fn endpoint(enabled: bool, auth: bool, admin_only: bool) -> EndpointConfig {
    EndpointConfig {
        enabled,
        auth,
        admin_only,
        allow_anonymous: false,
    }
}

/// Endpoint layout used by the integration suite: public redirects, open
/// registration, everything else authenticated
pub fn test_endpoints() -> HashMap<String, EndpointConfig> {
    HashMap::from([
        ("redirect".to_string(), endpoint(true, false, false)),
        ("create_users".to_string(), endpoint(true, false, false)),
        ("manage_users".to_string(), endpoint(true, true, false)),
        ("list_users".to_string(), endpoint(true, true, true)),
        ("manage_paths".to_string(), endpoint(true, true, false)),
        ("session".to_string(), endpoint(true, true, false)),
        ("jwt".to_string(), endpoint(true, true, false)),
    ])
}

/// Start a server on an OS-assigned port, returning its address
pub async fn run_test_server(
    state: AppState,
    endpoints: &HashMap<String, EndpointConfig>,
) -> SocketAddr {
    let app = build_router(state, endpoints);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// HTTP client that does not follow redirects, so Location headers stay
/// observable
pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Encode basic-auth credentials for an Authorization header
pub fn basic_auth(username: &str, password: &str) -> String {
    use base64::{engine::general_purpose::STANDARD, Engine};
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
}

/// Create a user through the API and return its API key wire form
pub async fn create_user(
    client: &reqwest::Client,
    addr: SocketAddr,
    name: &str,
    password: &str,
) -> String {
    let response = client
        .post(format!("http://{}/api/users", addr))
        .json(&serde_json::json!({
            "create_user": name,
            "create_password": password
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    body["api_key"].as_str().unwrap().to_string()
}
