//! HTTP request handlers, organized by area.
//!
//! Handlers only extract inputs, call [`ConferenceService`](conference_runtime::ConferenceService)
//! and serialize the result. Errors flow through [`AppError`](crate::AppError).

pub mod announcements;
pub mod conferences;
pub mod health;
pub mod profile;
pub mod sessions;

pub use health::{health_check, readiness_check};
