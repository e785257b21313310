//! waypost - a self-hosted URL redirection (go links) service
//!
//! This is the main entry point for the waypost application.

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use waypost::auth::{self, AssertionSigner, AuthResolver};
use waypost::cache::RedirectCache;
use waypost::config::{Config, ValidationRules};
use waypost::database::{PathStore, SqliteDatabase, TokenStore, UserStore};
use waypost::redirect::CachingPathStore;
use waypost::server::{AppState, Server};
use waypost::telemetry::init_tracing;

/// waypost - a self-hosted URL redirection (go links) service
#[derive(Parser, Debug)]
#[command(name = "waypost")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "WAYPOST_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_config(&args)?;

    init_tracing(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting waypost");

    // Immutable validation rules, compiled once
    let rules = Arc::new(ValidationRules::from_config(&config.user_rules)?);

    // Persistent store
    let database = Arc::new(SqliteDatabase::new(&config.database.path).await?);
    info!(path = %config.database.path, "Database initialized");

    // Redirect cache; a disabled or unreachable cache degrades to a no-op
    let cache = Arc::new(RedirectCache::from_config(&config.cache).await);
    info!(cache_enabled = config.cache.enabled, "Redirect cache initialized");

    // The caching decorator is wired in here; handlers only see PathStore
    let paths: Arc<dyn PathStore> = Arc::new(CachingPathStore::new(
        Arc::clone(&database) as Arc<dyn PathStore>,
        Arc::clone(&cache),
    ));

    // Assertion signing key: configured, or generated per process
    let signing_secret = match &config.auth.signing_secret {
        Some(secret) => secret.clone(),
        None => {
            warn!("no signing secret configured, bearer assertions will not survive restarts");
            auth::generate_secret(auth::SECRET_BYTES)?
        }
    };
    let signer = AssertionSigner::new(signing_secret.as_bytes(), config.auth.assertion_ttl_secs);

    let resolver = Arc::new(AuthResolver::new(
        Arc::clone(&database) as Arc<dyn UserStore>,
        Arc::clone(&database) as Arc<dyn TokenStore>,
        signer,
        &config.auth,
    ));
    info!(
        session_token = config.auth.schemes.session_token,
        api_key = config.auth.schemes.api_key,
        basic = config.auth.schemes.basic,
        bearer = config.auth.schemes.bearer,
        "Authentication resolver initialized"
    );

    let state = AppState {
        resolver,
        users: Arc::clone(&database) as Arc<dyn UserStore>,
        paths,
        cache,
        rules,
    };

    let server = Server::new(config.server.clone(), config.endpoints.clone(), state);

    info!(
        host = %config.server.host,
        port = %config.server.port,
        "Starting HTTP server"
    );

    server.run(shutdown_signal()).await?;

    info!("waypost shutdown complete");
    Ok(())
}

/// Load configuration from file or environment
fn load_config(args: &Args) -> anyhow::Result<Config> {
    match &args.config {
        Some(path) => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from file: {}", path);
            Config::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
        None => {
            eprintln!("Loading configuration from environment variables");
            Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
    }
}

/// Create a future that resolves when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
