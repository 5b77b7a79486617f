//! Axum HTTP adapter for Conference Central.
//!
//! A thin shell over [`ConferenceService`](conference_runtime::ConferenceService):
//! handlers extract the caller and inputs, call one service operation, and
//! map the result onto HTTP.
//!
//! # Request Flow
//!
//! 1. **Correlation ID** assigned and recorded on the request span
//! 2. **Caller** read from the `X-User-Id` / `X-User-Email` / `X-User-Name`
//!    headers (401 when the id is missing)
//! 3. **Service call** with the decoded path, query or JSON body
//! 4. **Result** serialized as JSON; a [`ConferenceError`](conference_core::error::ConferenceError)
//!    becomes a `{code, message}` body with its status (401/404/409/400/403/500)
//!
//! # Example
//!
//! ```ignore
//! use conference_web::{AppState, build_router};
//!
//! let app = build_router(AppState::new(service));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::AppError;
pub use extractors::AuthenticatedCaller;
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};
pub use routes::build_router;
pub use state::AppState;
