//! # Conference Core
//!
//! Domain model and collaborator traits for Conference Central, a conference
//! management backend.
//!
//! This crate performs no I/O. It defines:
//!
//! - [`key`]: hierarchical entity keys (`Profile → Conference → Session`)
//! - [`model`]: profiles, conferences, sessions and their input forms
//! - [`filter`]: the filter compiler turning client clauses into a [`filter::ConferenceQuery`]
//! - [`store`]: the [`store::EntityStore`] trait with optimistic versioned commits
//! - [`cache`]: the [`cache::Cache`] trait for derived state
//! - [`job`]: background [`job::Job`]s with the [`job::WorkQueue`] / [`job::JobSource`] traits
//! - [`error`]: the caller-facing [`error::ConferenceError`] taxonomy
//!
//! Operations that combine these live in `conference-runtime`.

pub mod cache;
pub mod error;
pub mod filter;
pub mod job;
pub mod key;
pub mod model;
pub mod store;

pub use error::{ConferenceError, Result};
pub use key::{EntityKey, EntityKind, KeyId};
pub use model::{Caller, Conference, Entity, FeaturedSpeaker, Profile, Session};
