//! The conference service: every caller-facing operation.
//!
//! `ConferenceService` owns handles to the three collaborators (entity store,
//! cache, work queue) and is shared behind an `Arc` by the HTTP layer. Its
//! operations are split by area:
//!
//! - [`crate::registration`]: seat registration and wishlists
//! - [`crate::conferences`]: conference lifecycle and filtered queries
//! - [`crate::sessions`]: session creation and catalog queries
//! - [`crate::profiles`]: profile read and update
//! - [`crate::recompute`]: reads of derived state
//!
//! Writes that touch more than one entity go through
//! [`run_transactional`](crate::transaction::run_transactional). Jobs are
//! enqueued only after the write they describe has committed; a failed
//! enqueue is logged and does not fail the request.

use crate::retry::RetryPolicy;
use crate::transaction::{Transaction, run_transactional};
use conference_core::cache::Cache;
use conference_core::error::{ConferenceError, Result};
use conference_core::job::{Job, WorkQueue};
use conference_core::key::{EntityKey, EntityKind};
use conference_core::store::EntityStore;
use std::sync::Arc;

/// Retry budget for optimistic transactions when none is configured.
pub const DEFAULT_TRANSACTION_RETRIES: usize = 10;

/// Caller-facing conference operations.
#[derive(Clone)]
pub struct ConferenceService {
    pub(crate) store: Arc<dyn EntityStore>,
    pub(crate) cache: Arc<dyn Cache>,
    pub(crate) queue: Arc<dyn WorkQueue>,
    pub(crate) policy: RetryPolicy,
}

impl ConferenceService {
    /// Create a service over the given collaborators.
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>, cache: Arc<dyn Cache>, queue: Arc<dyn WorkQueue>) -> Self {
        Self {
            store,
            cache,
            queue,
            policy: RetryPolicy::transactional(DEFAULT_TRANSACTION_RETRIES),
        }
    }

    /// Replace the transaction retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The entity store this service writes to.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// The cache holding derived state.
    #[must_use]
    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    pub(crate) async fn transact<T, F>(&self, keys: Vec<EntityKey>, body: F) -> Result<T>
    where
        F: FnMut(&mut Transaction) -> Result<T> + Send,
        T: Send,
    {
        run_transactional(self.store.as_ref(), &self.policy, keys, body).await
    }

    /// Enqueue a job after a committed write. Failures are logged only.
    pub(crate) async fn enqueue_after_commit(&self, job: Job) {
        let name = job.name();
        if let Err(error) = self.queue.enqueue(job).await {
            tracing::warn!(job = name, error = %error, "Failed to enqueue background job");
        }
    }
}

/// Decode a client-supplied key that must address an entity of `kind`.
///
/// Keys that do not decode, or decode to another kind, do not resolve to
/// anything and are reported as `NotFound`.
pub(crate) fn decode_key(raw: &str, kind: EntityKind, resource: &'static str) -> Result<EntityKey> {
    match EntityKey::from_urlsafe(raw) {
        Ok(key) if key.kind() == kind => Ok(key),
        _ => Err(ConferenceError::not_found(resource, raw)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use conference_core::key::KeyId;

    #[test]
    fn keys_of_the_wrong_kind_do_not_resolve() {
        let conf = EntityKey::profile("org").child(EntityKind::Conference, KeyId::Id(1));
        let raw = conf.to_urlsafe();

        assert_eq!(decode_key(&raw, EntityKind::Conference, "conference").unwrap(), conf);
        assert_eq!(
            decode_key(&raw, EntityKind::Session, "session"),
            Err(ConferenceError::not_found("session", &raw))
        );
        assert!(matches!(
            decode_key("%%%", EntityKind::Conference, "conference"),
            Err(ConferenceError::NotFound { .. })
        ));
    }
}
