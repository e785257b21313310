//! Redirect cache for waypost
//!
//! A two-tier cache in front of the path store: a bounded in-process tier
//! (TinyLFU eviction with a fixed capacity and per-entry TTL) and a
//! networked Redis tier with a fixed one-hour TTL on write. The cache
//! always fails open: a disabled configuration or a broken backend degrades
//! every operation to a miss, never to a request failure.

pub mod redis;

pub use redis::RedisTier;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::CacheConfig;
use crate::error::CacheError;

/// Fixed TTL applied to every networked-tier write
pub const REMOTE_TTL: Duration = Duration::from_secs(3600);

/// Networked cache tier
///
/// Implementations must be safe for concurrent use; the in-process tier in
/// front of them handles its own synchronization.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteTier: Send + Sync {
    /// Fetch a cached target
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a target with a TTL
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Delete a cached target; deleting an absent key is not an error
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Two-tier redirect cache
///
/// `get` consults the in-process tier first and then the networked tier. A
/// networked hit does not repopulate the in-process tier; that fill happens
/// only through [`RedirectCache::fill_local`], which the resolver calls on
/// its store-fallback path, so the fill policy stays explicit and testable
/// at the resolver layer.
pub struct RedirectCache {
    local: Option<moka::future::Cache<String, String>>,
    remote: Option<Arc<dyn RemoteTier>>,
}

impl RedirectCache {
    /// Cache with every operation degraded to a no-op miss
    pub fn disabled() -> Self {
        Self {
            local: None,
            remote: None,
        }
    }

    /// Build both tiers from configuration
    ///
    /// A zero local capacity or TTL leaves the in-process tier off; an
    /// unreachable or unconfigured Redis leaves the networked tier off.
    /// Neither is fatal.
    pub async fn from_config(config: &CacheConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }

        let local = if config.local_capacity > 0 && config.local_ttl_secs > 0 {
            Some(
                moka::future::Cache::builder()
                    .max_capacity(config.local_capacity)
                    .time_to_live(Duration::from_secs(config.local_ttl_secs))
                    .build(),
            )
        } else {
            tracing::warn!("cache enabled, but no local cache configured");
            None
        };

        let remote: Option<Arc<dyn RemoteTier>> = match &config.redis_url {
            Some(url) => match RedisTier::connect(url, &config.key_prefix).await {
                Ok(tier) => Some(Arc::new(tier)),
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        "cannot reach the configured redis instance, using local cache only"
                    );
                    None
                }
            },
            None => {
                tracing::warn!("cache enabled, but no redis url configured");
                None
            }
        };

        Self { local, remote }
    }

    /// Assemble a cache from explicit tiers
    pub fn with_tiers(
        local: Option<moka::future::Cache<String, String>>,
        remote: Option<Arc<dyn RemoteTier>>,
    ) -> Self {
        Self { local, remote }
    }

    /// Look up a target for a path
    ///
    /// Networked-tier transport errors are logged and reported as a miss so
    /// callers always fall through to the persistent store.
    pub async fn get(&self, path: &str) -> Option<String> {
        if let Some(local) = &self.local {
            if let Some(target) = local.get(path).await {
                return Some(target);
            }
        }

        if let Some(remote) = &self.remote {
            match remote.get(path).await {
                Ok(Some(target)) => return Some(target),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "networked cache read failed, treating as miss");
                }
            }
        }

        None
    }

    /// Populate the in-process tier
    pub async fn fill_local(&self, path: &str, target: &str) {
        if let Some(local) = &self.local {
            local.insert(path.to_string(), target.to_string()).await;
        }
    }

    /// Write a mapping to the networked tier with the fixed TTL
    ///
    /// The in-process tier is untouched here; see [`RedirectCache::fill_local`].
    pub async fn put(&self, path: &str, target: &str) -> Result<(), CacheError> {
        match &self.remote {
            Some(remote) => remote.set(path, target, REMOTE_TTL).await,
            None => Ok(()),
        }
    }

    /// Best-effort deletion of the given paths from the networked tier
    ///
    /// Failures do not abort the batch; they are aggregated into a single
    /// error. A key that slips through simply expires via its TTL.
    pub async fn invalidate(&self, paths: &[String]) -> Result<(), CacheError> {
        let Some(remote) = &self.remote else {
            return Ok(());
        };

        let mut failed = 0usize;
        let mut last = String::new();

        for path in paths {
            if let Err(e) = remote.delete(path).await {
                failed += 1;
                last = e.to_string();
            }
        }

        if failed > 0 {
            return Err(CacheError::Invalidation {
                failed,
                total: paths.len(),
                last,
            });
        }

        Ok(())
    }
}
