//! Domain error taxonomy.
//!
//! Every operation reports failures as a [`ConferenceError`]. The web layer
//! maps each variant onto exactly one HTTP status.

use crate::cache::CacheError;
use crate::filter::FilterError;
use crate::job::QueueError;
use crate::store::StoreError;
use thiserror::Error;

/// Result alias for domain operations.
pub type Result<T> = std::result::Result<T, ConferenceError>;

/// Errors surfaced by conference operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConferenceError {
    /// No authenticated caller.
    #[error("Authorization required")]
    Unauthenticated,

    /// The referenced entity does not exist.
    #[error("No {resource} found with key: {key}")]
    NotFound {
        /// Kind of thing that was looked up ("conference", "session", ...).
        resource: &'static str,
        /// The key as supplied by the caller.
        key: String,
    },

    /// The request contradicts current state (already registered, sold out, ...).
    #[error("{0}")]
    Conflict(String),

    /// Malformed input.
    #[error("{0}")]
    InvalidArgument(String),

    /// The caller may not perform the operation.
    #[error("{0}")]
    PermissionDenied(String),

    /// Store failure or exhausted transaction retries.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConferenceError {
    /// Missing entity of the given resource type.
    #[must_use]
    pub fn not_found(resource: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            resource,
            key: key.to_string(),
        }
    }

    /// Conflict with current state.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Malformed input.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Forbidden operation.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::PermissionDenied(message.into())
    }

    /// Internal failure.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Short machine-readable code for the variant.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::NotFound { .. } => "not_found",
            Self::Conflict(_) => "conflict",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::PermissionDenied(_) => "permission_denied",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<StoreError> for ConferenceError {
    fn from(error: StoreError) -> Self {
        Self::Internal(error.to_string())
    }
}

impl From<FilterError> for ConferenceError {
    fn from(error: FilterError) -> Self {
        Self::InvalidArgument(error.to_string())
    }
}

impl From<CacheError> for ConferenceError {
    fn from(error: CacheError) -> Self {
        Self::Internal(error.to_string())
    }
}

impl From<QueueError> for ConferenceError {
    fn from(error: QueueError) -> Self {
        Self::Internal(error.to_string())
    }
}
