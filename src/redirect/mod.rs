//! Cache-aside redirect resolution
//!
//! `CachingPathStore` composes an inner [`PathStore`] with a
//! [`RedirectCache`] and implements the same interface, so the caching
//! behavior is selected at wiring time rather than baked into the store.
//! The cache is advisory throughout: a redirect must succeed even when
//! every cache operation fails.

use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::RedirectCache;
use crate::database::PathStore;
use crate::error::DbError;
use crate::models::PathEntry;

/// A `PathStore` decorated with the two-tier redirect cache
pub struct CachingPathStore {
    inner: Arc<dyn PathStore>,
    cache: Arc<RedirectCache>,
}

impl CachingPathStore {
    /// Wrap a path store with a cache
    pub fn new(inner: Arc<dyn PathStore>, cache: Arc<RedirectCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl PathStore for CachingPathStore {
    /// Resolve a path, cache first
    ///
    /// On a cache miss the persistent store answers; a store hit fills the
    /// in-process tier and writes the networked tier before returning.
    /// Cache write failures are logged, never surfaced: the redirect must
    /// succeed even if caching fails.
    async fn get_target(&self, path: &str) -> Result<Option<String>, DbError> {
        if let Some(target) = self.cache.get(path).await {
            return Ok(Some(target));
        }

        match self.inner.get_target(path).await? {
            Some(target) => {
                self.cache.fill_local(path, &target).await;
                if let Err(e) = self.cache.put(path, &target).await {
                    tracing::warn!(path = %path, error = %e, "failed to cache resolved target");
                }
                Ok(Some(target))
            }
            None => Ok(None),
        }
    }

    /// Write-through insert
    ///
    /// The durable insert runs first so a duplicate-key failure reaches the
    /// caller before the cache is trusted with the mapping.
    async fn insert_path(&self, entry: &PathEntry) -> Result<(), DbError> {
        self.inner.insert_path(entry).await?;

        if let Err(e) = self.cache.put(&entry.path, &entry.target).await {
            tracing::warn!(path = %entry.path, error = %e, "failed to cache new path");
        }

        Ok(())
    }

    /// Delete with best-effort invalidation
    ///
    /// If invalidation fails, the networked tier's TTL is the safety net.
    async fn delete_path(&self, path: &str, owner: Option<i64>) -> Result<(), DbError> {
        self.inner.delete_path(path, owner).await?;

        if let Err(e) = self.cache.invalidate(&[path.to_string()]).await {
            tracing::warn!(path = %path, error = %e, "failed to invalidate deleted path");
        }

        Ok(())
    }
}
