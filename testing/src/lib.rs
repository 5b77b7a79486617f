//! # Conference Testing
//!
//! In-memory collaborators and fixtures for testing Conference Central
//! without Postgres or Redis.
//!
//! - [`InMemoryEntityStore`]: optimistic versioned store with conflict injection
//! - [`InMemoryCache`]: `HashMap` cache with a failure switch
//! - [`InMemoryJobQueue`]: work queue and job source with redelivery and dead letters
//! - [`RecordingMailer`]: captures outgoing mail
//! - [`TestBackend`]: all of the above wired into a `ConferenceService`
//!
//! ## Example
//!
//! ```
//! use conference_testing::{TestBackend, caller, conference_form};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = TestBackend::new();
//! let alice = caller("alice");
//! let conf = backend.service.create_conference(&alice, conference_form("RustConf", 10)).await?;
//! assert!(backend.service.register_for_conference(&alice, &conf.key.to_urlsafe()).await?);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod mailer;
pub mod queue;
pub mod store;

pub use cache::InMemoryCache;
pub use mailer::RecordingMailer;
pub use queue::InMemoryJobQueue;
pub use store::InMemoryEntityStore;

use conference_core::model::{Caller, ConferenceForm, SessionForm};
use conference_runtime::retry::RetryPolicy;
use conference_runtime::worker::JobHandler;
use conference_runtime::ConferenceService;
use std::sync::Arc;
use std::time::Duration;

/// Caller fixture: user id `name`, email `name@example.com`.
#[must_use]
pub fn caller(name: &str) -> Caller {
    Caller::new(name, format!("{name}@example.com"), name)
}

/// Conference form with a name and capacity.
#[must_use]
pub fn conference_form(name: &str, max_attendees: i32) -> ConferenceForm {
    ConferenceForm {
        name: Some(name.to_string()),
        max_attendees: Some(max_attendees),
        ..ConferenceForm::default()
    }
}

/// Session form with a name and an optional speaker.
#[must_use]
pub fn session_form(name: &str, speaker: Option<&str>) -> SessionForm {
    SessionForm {
        name: Some(name.to_string()),
        speaker: speaker.map(ToString::to_string),
        ..SessionForm::default()
    }
}

/// Retry policy with short delays for tests.
#[must_use]
pub fn fast_retry_policy(max_retries: usize) -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(max_retries)
        .initial_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(5))
        .jitter(true)
        .build()
}

/// A `ConferenceService` over in-memory collaborators, with handles to each
/// collaborator for assertions.
#[derive(Clone)]
pub struct TestBackend {
    /// Entity store.
    pub store: InMemoryEntityStore,
    /// Derived-state cache.
    pub cache: InMemoryCache,
    /// Job queue.
    pub queue: InMemoryJobQueue,
    /// Outgoing mail.
    pub mailer: RecordingMailer,
    /// The service under test.
    pub service: Arc<ConferenceService>,
}

impl Default for TestBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TestBackend {
    /// Backend with a fast 10-retry transaction policy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_retry_policy(fast_retry_policy(10))
    }

    /// Backend with a custom transaction policy.
    #[must_use]
    pub fn with_retry_policy(policy: RetryPolicy) -> Self {
        let store = InMemoryEntityStore::new();
        let cache = InMemoryCache::new();
        let queue = InMemoryJobQueue::new();
        let mailer = RecordingMailer::new();
        let service = ConferenceService::new(
            Arc::new(store.clone()),
            Arc::new(cache.clone()),
            Arc::new(queue.clone()),
        )
        .with_retry_policy(policy);

        Self {
            store,
            cache,
            queue,
            mailer,
            service: Arc::new(service),
        }
    }

    /// Job handler over this backend's store, cache and mailer.
    #[must_use]
    pub fn job_handler(&self) -> JobHandler {
        JobHandler::new(
            Arc::new(self.store.clone()),
            Arc::new(self.cache.clone()),
            Arc::new(self.mailer.clone()),
        )
    }
}
