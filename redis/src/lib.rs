//! Redis-backed [`Cache`] for Conference Central.
//!
//! Keys are stored under a configurable namespace prefix
//! (`conference:RECENT_ANNOUNCEMENTS` by default) so several deployments can
//! share one Redis instance.
//!
//! # Example
//!
//! ```no_run
//! use conference_redis::RedisCache;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = RedisCache::new("redis://127.0.0.1:6379").await?;
//! # Ok(())
//! # }
//! ```

use conference_core::cache::{Cache, CacheError};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::future::Future;
use std::pin::Pin;

/// Default key namespace.
pub const DEFAULT_PREFIX: &str = "conference";

#[allow(clippy::needless_pass_by_value)]
fn unavailable(context: &str, e: redis::RedisError) -> CacheError {
    CacheError::Unavailable(format!("{context}: {e}"))
}

/// Cache over a Redis connection manager.
///
/// The manager reconnects on its own, so a clone of it is taken per command.
#[derive(Clone)]
pub struct RedisCache {
    conn_manager: ConnectionManager,
    prefix: String,
}

impl RedisCache {
    /// Connect to Redis at `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the client cannot be created or
    /// the first connection fails.
    pub async fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client =
            Client::open(redis_url).map_err(|e| unavailable("Failed to create Redis client", e))?;
        let conn_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| unavailable("Failed to create Redis connection manager", e))?;

        Ok(Self {
            conn_manager,
            prefix: DEFAULT_PREFIX.to_string(),
        })
    }

    /// Use a different key namespace.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{key}", self.prefix)
    }

    /// Round-trip a `PING`, for health checks.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if Redis does not answer.
    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn_manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable("Redis ping failed", e))?;
        Ok(())
    }
}

impl Cache for RedisCache {
    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>, CacheError>> + Send + '_>> {
        let key = self.namespaced(key);
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let value: Option<Vec<u8>> = conn
                .get(&key)
                .await
                .map_err(|e| unavailable("Failed to read from Redis", e))?;
            Ok(value)
        })
    }

    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + '_>> {
        let key = self.namespaced(key);
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let _: () = conn
                .set(&key, value)
                .await
                .map_err(|e| unavailable("Failed to write to Redis", e))?;
            tracing::debug!(key = %key, "Cache entry written");
            Ok(())
        })
    }

    fn delete(&self, key: &str)
    -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + '_>> {
        let key = self.namespaced(key);
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let _: () = conn
                .del(&key)
                .await
                .map_err(|e| unavailable("Failed to delete from Redis", e))?;
            tracing::debug!(key = %key, "Cache entry removed");
            Ok(())
        })
    }
}
