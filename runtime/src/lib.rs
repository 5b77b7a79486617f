//! # Conference Runtime
//!
//! The operations of Conference Central on top of the collaborator traits
//! defined in `conference-core`.
//!
//! - [`ConferenceService`]: every caller-facing operation (registration,
//!   wishlists, conference and session lifecycle, catalog queries, profiles,
//!   derived-state reads)
//! - [`transaction`]: optimistic read-modify-write with bounded retry
//! - [`recompute`]: announcement and featured-speaker recomputation
//! - [`worker`]: job worker and announcement scheduler
//! - [`mailer`]: outgoing mail
//! - [`retry`], [`metrics`]: retry policy and Prometheus metrics

pub mod conferences;
pub mod mailer;
pub mod metrics;
pub mod profiles;
pub mod recompute;
pub mod registration;
pub mod retry;
pub mod service;
pub mod sessions;
pub mod transaction;
pub mod worker;

pub use mailer::{ConsoleMailer, Mail, Mailer};
pub use retry::RetryPolicy;
pub use service::ConferenceService;
pub use worker::{AnnouncementScheduler, JobHandler, JobWorker};
