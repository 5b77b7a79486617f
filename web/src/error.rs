//! Error types for web handlers.
//!
//! [`AppError`] bridges [`ConferenceError`] and HTTP responses. Every domain
//! variant maps onto exactly one status code and is rendered as a JSON
//! `{code, message}` body.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use conference_core::error::ConferenceError;
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler(State(state): State<AppState>, Path(key): Path<String>)
///     -> Result<Json<Conference>, AppError>
/// {
///     Ok(Json(state.service.get_conference(&key).await?))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Create a new error with a source error.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into(), "invalid_argument".to_string())
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code of this error.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Status code for each domain error.
const fn status_for(error: &ConferenceError) -> StatusCode {
    match error {
        ConferenceError::Unauthenticated => StatusCode::UNAUTHORIZED,
        ConferenceError::NotFound { .. } => StatusCode::NOT_FOUND,
        ConferenceError::Conflict(_) => StatusCode::CONFLICT,
        ConferenceError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        ConferenceError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        ConferenceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ConferenceError> for AppError {
    fn from(err: ConferenceError) -> Self {
        let status = status_for(&err);
        let code = err.code().to_string();
        if let ConferenceError::Internal(_) = err {
            // Store and cache details stay in the log.
            return Self::new(status, "An internal error occurred".to_string(), code)
                .with_source(anyhow::Error::new(err));
        }
        Self::new(status, err.to_string(), code)
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: String,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Internal server error"
                );
            }
        } else {
            tracing::debug!(status = %self.status, code = %self.code, message = %self.message, "Request rejected");
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[invalid_argument] Invalid input");
    }

    #[test]
    fn test_domain_errors_map_to_one_status_each() {
        let cases = [
            (ConferenceError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (ConferenceError::not_found("conference", "abc"), StatusCode::NOT_FOUND),
            (ConferenceError::conflict("No seats available."), StatusCode::CONFLICT),
            (ConferenceError::invalid("bad date"), StatusCode::BAD_REQUEST),
            (ConferenceError::forbidden("Only the owner can update the conference."), StatusCode::FORBIDDEN),
            (ConferenceError::internal("db down"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (domain, status) in cases {
            let code = domain.code();
            let err = AppError::from(domain);
            assert_eq!(err.status(), status);
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn test_not_found_message_names_resource() {
        let err = AppError::from(ConferenceError::not_found("conference", "abc"));
        assert_eq!(err.to_string(), "[not_found] No conference found with key: abc");
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AppError::from(ConferenceError::internal("connection refused"));
        assert_eq!(err.message, "An internal error occurred");
        assert!(std::error::Error::source(&err).is_some());
    }
}
