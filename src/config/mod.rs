//! Configuration management for waypost
//!
//! This module handles loading, parsing, and validating application
//! configuration from YAML files and environment variables. Configuration is
//! read once at startup and never mutated afterwards.

pub mod rules;

pub use rules::ValidationRules;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Redirect cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Per-endpoint-group toggles
    #[serde(default = "default_endpoints")]
    pub endpoints: HashMap<String, EndpointConfig>,

    /// Username and password validation rules
    #[serde(default)]
    pub user_rules: UserRulesConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // First, expand environment variables in the YAML string
        let expanded = expand_env_vars(yaml);
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from environment variables with prefix WAYPOST_
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.endpoints = default_endpoints();

        if let Ok(host) = std::env::var("WAYPOST_SERVER_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("WAYPOST_SERVER_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid port number".to_string()))?;
        }

        if let Ok(path) = std::env::var("WAYPOST_DATABASE_PATH") {
            config.database.path = path;
        }

        if let Ok(secret) = std::env::var("WAYPOST_AUTH_SIGNING_SECRET") {
            config.auth.signing_secret = Some(secret);
        }

        if let Ok(enabled) = std::env::var("WAYPOST_CACHE_ENABLED") {
            config.cache.enabled = enabled.parse().unwrap_or(false);
        }
        if let Ok(url) = std::env::var("WAYPOST_CACHE_REDIS_URL") {
            config.cache.redis_url = Some(url);
        }

        Ok(config)
    }

    /// Look up an endpoint group, falling back to a disabled default
    pub fn endpoint(&self, name: &str) -> EndpointConfig {
        self.endpoints.get(name).cloned().unwrap_or_default()
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// Which credential schemes are honored
    #[serde(default)]
    pub schemes: AuthSchemesConfig,

    /// Session token lifetime in seconds
    #[serde(default = "default_session_token_ttl")]
    pub session_token_ttl_secs: i64,

    /// Trailing window before expiration during which a read renews the
    /// session token
    #[serde(default = "default_renewal_window")]
    pub renewal_window_secs: i64,

    /// Signed bearer assertion lifetime in seconds
    #[serde(default = "default_assertion_ttl")]
    pub assertion_ttl_secs: i64,

    /// HMAC secret for signing bearer assertions; a random one is generated
    /// at startup when unset (assertions then do not survive restarts)
    pub signing_secret: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            schemes: AuthSchemesConfig::default(),
            session_token_ttl_secs: default_session_token_ttl(),
            renewal_window_secs: default_renewal_window(),
            assertion_ttl_secs: default_assertion_ttl(),
            signing_secret: None,
        }
    }
}

fn default_session_token_ttl() -> i64 {
    30 * 24 * 3600 // 30 days
}

fn default_renewal_window() -> i64 {
    3 * 24 * 3600 // 3 days
}

fn default_assertion_ttl() -> i64 {
    3600
}

/// Per-scheme enablement, read at resolver construction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSchemesConfig {
    #[serde(default = "default_scheme_enabled")]
    pub session_token: bool,

    #[serde(default = "default_scheme_enabled")]
    pub api_key: bool,

    #[serde(default = "default_scheme_enabled")]
    pub basic: bool,

    #[serde(default = "default_scheme_enabled")]
    pub bearer: bool,
}

impl Default for AuthSchemesConfig {
    fn default() -> Self {
        Self {
            session_token: true,
            api_key: true,
            basic: true,
            bearer: true,
        }
    }
}

fn default_scheme_enabled() -> bool {
    true
}

/// Redirect cache configuration
///
/// With `enabled` false every cache operation degrades to a no-op miss.
/// A zero local capacity or TTL disables the in-process tier only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Redis connection URL for the networked tier
    pub redis_url: Option<String>,

    /// Key prefix for the networked tier
    #[serde(default = "default_cache_prefix")]
    pub key_prefix: String,

    /// Maximum entries in the in-process tier
    #[serde(default = "default_local_capacity")]
    pub local_capacity: u64,

    /// Per-entry TTL of the in-process tier in seconds
    #[serde(default = "default_local_ttl")]
    pub local_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            redis_url: None,
            key_prefix: default_cache_prefix(),
            local_capacity: default_local_capacity(),
            local_ttl_secs: default_local_ttl(),
        }
    }
}

fn default_cache_prefix() -> String {
    "waypost:go:".to_string()
}

fn default_local_capacity() -> u64 {
    1000
}

fn default_local_ttl() -> u64 {
    60
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "/data/waypost.db".to_string()
}

/// Configuration of one endpoint group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndpointConfig {
    /// Whether the group's routes are registered at all
    #[serde(default)]
    pub enabled: bool,

    /// Whether the authentication middleware guards the group
    #[serde(default)]
    pub auth: bool,

    /// Whether only admins may call the group
    #[serde(default)]
    pub admin_only: bool,

    /// Whether a request without credentials passes authentication as the
    /// distinguished anonymous identity instead of being rejected
    #[serde(default)]
    pub allow_anonymous: bool,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            auth: false,
            admin_only: false,
            allow_anonymous: false,
        }
    }
}

impl EndpointConfig {
    fn open() -> Self {
        Self {
            enabled: true,
            auth: false,
            admin_only: false,
            allow_anonymous: false,
        }
    }

    fn authenticated() -> Self {
        Self {
            enabled: true,
            auth: true,
            admin_only: false,
            allow_anonymous: false,
        }
    }

    fn admin() -> Self {
        Self {
            enabled: true,
            auth: true,
            admin_only: true,
            allow_anonymous: false,
        }
    }
}

fn default_endpoints() -> HashMap<String, EndpointConfig> {
    HashMap::from([
        ("redirect".to_string(), EndpointConfig::open()),
        ("create_users".to_string(), EndpointConfig::admin()),
        ("manage_users".to_string(), EndpointConfig::authenticated()),
        ("list_users".to_string(), EndpointConfig::admin()),
        ("manage_paths".to_string(), EndpointConfig::authenticated()),
        ("session".to_string(), EndpointConfig::authenticated()),
        ("jwt".to_string(), EndpointConfig::authenticated()),
    ])
}

/// Username and password validation rule configuration
///
/// Zero-valued fields fall back to the built-in defaults; negative lengths
/// disable the corresponding bound. Compiled into an immutable
/// [`ValidationRules`] at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserRulesConfig {
    #[serde(default)]
    pub username_regex: String,

    #[serde(default)]
    pub username_min_len: i32,

    #[serde(default)]
    pub username_max_len: i32,

    #[serde(default)]
    pub password_regex: String,

    #[serde(default)]
    pub password_min_len: i32,

    #[serde(default)]
    pub password_max_len: i32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
