//! Redis-backed networked cache tier
//!
//! Uses a connection manager so a Redis outage does not pin requests on
//! reconnect loops; individual command failures surface as `CacheError`
//! and are downgraded to misses by the caller.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::CacheError;

use super::RemoteTier;

/// Networked cache tier backed by Redis
pub struct RedisTier {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisTier {
    /// Connect to a Redis instance
    ///
    /// Fails if the URL does not parse or the initial connection cannot be
    /// established; the manager reconnects on its own afterwards.
    pub async fn connect(url: &str, prefix: &str) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::Backend(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;

        Ok(Self {
            conn,
            prefix: prefix.to_string(),
        })
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl RemoteTier for RedisTier {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(self.make_key(key))
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(self.make_key(key), value, ttl.as_secs())
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(self.make_key(key))
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test 1: an unparseable URL fails fast without touching the network
    #[tokio::test]
    async fn test_connect_bad_url() {
        let result = RedisTier::connect("not a redis url", "waypost:go:").await;
        assert!(matches!(result, Err(CacheError::Backend(_))));
    }
}
