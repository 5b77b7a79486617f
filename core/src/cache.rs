//! Key-value cache for derived state.
//!
//! The cache holds values that are recomputed from the entity store by
//! background jobs (the sold-out announcement and the featured speaker).
//! Reads never fall back to the store: a missing key means "nothing to show".

use serde::{Serialize, de::DeserializeOwned};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Cache key of the "nearly sold out" announcement.
pub const ANNOUNCEMENT_KEY: &str = "RECENT_ANNOUNCEMENTS";

/// Cache key of the featured speaker.
pub const FEATURED_SPEAKER_KEY: &str = "FEATURED_SPEAKER";

/// Errors that can occur during cache operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The cache backend could not be reached or rejected the command.
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    /// A cached value could not be (de)serialized.
    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

/// Byte-level cache.
pub trait Cache: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the backend fails.
    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>, CacheError>> + Send + '_>>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the backend fails.
    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + '_>>;

    /// Remove a value. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the backend fails.
    fn delete(&self, key: &str)
    -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + '_>>;
}

/// Read a JSON value from `cache`.
///
/// # Errors
///
/// Returns [`CacheError`] if the backend fails or the stored bytes do not
/// decode as `T`.
pub async fn get_json<T: DeserializeOwned>(
    cache: &dyn Cache,
    key: &str,
) -> Result<Option<T>, CacheError> {
    match cache.get(key).await? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CacheError::Serialization(e.to_string())),
        None => Ok(None),
    }
}

/// Write `value` as JSON to `cache`.
///
/// # Errors
///
/// Returns [`CacheError`] if the value does not serialize or the backend fails.
pub async fn set_json<T: Serialize + Sync>(
    cache: &dyn Cache,
    key: &str,
    value: &T,
) -> Result<(), CacheError> {
    let bytes = serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
    cache.set(key, bytes).await
}
