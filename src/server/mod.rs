//! HTTP server components for waypost
//!
//! This module provides the HTTP server infrastructure including:
//! - Router configuration and route handlers
//! - Authentication, permission and logging middleware
//! - Server lifecycle management

pub mod middleware;
pub mod router;

pub use middleware::ErrorResponse;
pub use router::{build_router, AppState, HealthResponse, JwtResponse};

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::config::{EndpointConfig, ServerConfig};

/// HTTP server for waypost
///
/// Manages the axum server lifecycle: binding to the configured address,
/// applying the outer middleware layers and handling graceful shutdown.
pub struct Server {
    config: ServerConfig,
    endpoints: HashMap<String, EndpointConfig>,
    state: AppState,
}

impl Server {
    /// Create a new server instance
    pub fn new(
        config: ServerConfig,
        endpoints: HashMap<String, EndpointConfig>,
        state: AppState,
    ) -> Self {
        Self {
            config,
            endpoints,
            state,
        }
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(
            self.config.host.parse().unwrap_or([0, 0, 0, 0].into()),
            self.config.port,
        )
    }

    /// Run the server until the shutdown future resolves
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let addr = self.bind_addr();
        let app = build_router(self.state, &self.endpoints);

        let app = app
            .layer(tower_http::trace::TraceLayer::new_for_http())
            .layer(tower_http::compression::CompressionLayer::new());

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(e.to_string()))?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to address
    #[error("Failed to bind to address: {0}")]
    Bind(String),

    /// Failed to serve requests
    #[error("Server error: {0}")]
    Serve(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AssertionSigner, AuthResolver};
    use crate::cache::RedirectCache;
    use crate::config::{AuthConfig, ValidationRules};
    use crate::database::{MockPathStore, MockTokenStore, MockUserStore};
    use std::sync::Arc;
    use std::time::Duration;

    fn create_test_state() -> AppState {
        let config = AuthConfig::default();
        let resolver = AuthResolver::new(
            Arc::new(MockUserStore::new()),
            Arc::new(MockTokenStore::new()),
            AssertionSigner::new(b"test-secret", config.assertion_ttl_secs),
            &config,
        );

        AppState {
            resolver: Arc::new(resolver),
            users: Arc::new(MockUserStore::new()),
            paths: Arc::new(MockPathStore::new()),
            cache: Arc::new(RedirectCache::disabled()),
            rules: Arc::new(ValidationRules::defaults()),
        }
    }

    // Test 1: Server can be created with config
    #[test]
    fn test_server_new() {
        let config = ServerConfig::default();
        let server = Server::new(config, HashMap::new(), create_test_state());
        assert_eq!(server.bind_addr().port(), 8080);
    }

    // Test 2: Server bind address calculation
    #[test]
    fn test_server_bind_addr() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 9090,
        };
        let server = Server::new(config, HashMap::new(), create_test_state());
        assert_eq!(server.bind_addr().to_string(), "127.0.0.1:9090");
    }

    // Test 3: Server graceful shutdown
    #[tokio::test]
    async fn test_server_graceful_shutdown() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign a port
        };
        let server = Server::new(config, HashMap::new(), create_test_state());

        let shutdown = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
        };

        let handle = tokio::spawn(async move { server.run(shutdown).await });

        let result = handle.await.unwrap();
        assert!(result.is_ok());
    }

    // Test 4: ServerError display messages
    #[test]
    fn test_server_error_display() {
        let bind_err = ServerError::Bind("address in use".to_string());
        assert_eq!(
            bind_err.to_string(),
            "Failed to bind to address: address in use"
        );

        let serve_err = ServerError::Serve("connection reset".to_string());
        assert_eq!(serve_err.to_string(), "Server error: connection reset");
    }
}
