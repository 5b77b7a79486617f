//! In-memory cache.

#![allow(clippy::unwrap_used)] // Poisoned locks only happen after a test already panicked

use conference_core::cache::{Cache, CacheError};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// `HashMap`-backed [`Cache`] that can be switched into a failing mode.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCache {
    data: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with [`CacheError::Unavailable`] until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Whether `key` holds a value.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().unwrap().contains_key(key)
    }

    /// Raw bytes stored under `key`.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.data.read().unwrap().get(key).cloned()
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("cache switched off".to_string()));
        }
        Ok(())
    }
}

impl Cache for InMemoryCache {
    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>, CacheError>> + Send + '_>> {
        let result = self.check().map(|()| self.raw(key));
        Box::pin(async move { result })
    }

    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + '_>> {
        let result = self.check().map(|()| {
            self.data.write().unwrap().insert(key.to_string(), value);
        });
        Box::pin(async move { result })
    }

    fn delete(&self, key: &str)
    -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + '_>> {
        let result = self.check().map(|()| {
            self.data.write().unwrap().remove(key);
        });
        Box::pin(async move { result })
    }
}
