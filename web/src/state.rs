//! Application state for Axum handlers.

use conference_runtime::ConferenceService;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cheap to clone: the service sits behind an `Arc` and owns its own
/// collaborator handles.
#[derive(Clone)]
pub struct AppState {
    /// Conference operations.
    pub service: Arc<ConferenceService>,
}

impl AppState {
    /// Create state over a shared service.
    #[must_use]
    pub const fn new(service: Arc<ConferenceService>) -> Self {
        Self { service }
    }
}
