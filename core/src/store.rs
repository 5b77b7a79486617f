//! Entity store trait and related types.
//!
//! The store holds [`Entity`] values addressed by [`EntityKey`], each with a
//! monotonically increasing [`Version`] used for optimistic concurrency.
//! Multi-entity writes go through [`EntityStore::commit`], which applies a
//! batch of [`Write`]s atomically: either every expected version matches and
//! all writes land, or nothing is written and [`StoreError::Conflict`] is
//! returned. Transaction retry on conflict lives in the runtime crate.
//!
//! # Implementations
//!
//! - `PostgresEntityStore` (in `conference-postgres`): production storage
//! - `InMemoryEntityStore` (in `conference-testing`): fast, deterministic testing
//!
//! # Dyn Compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` so the store can be shared as
//! `Arc<dyn EntityStore>`.

use crate::filter::ConferenceQuery;
use crate::key::{EntityKey, EntityKind};
use crate::model::{Conference, Entity, Session};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// An expected version did not match: another writer got there first.
    #[error("Concurrency conflict on {key}")]
    Conflict {
        /// First key whose version check failed.
        key: EntityKey,
    },

    /// Backend connection or query failure.
    #[error("Database error: {0}")]
    Database(String),

    /// Stored data could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Entity version for optimistic concurrency control.
///
/// The first stored version of an entity is 1. Every successful write
/// increments it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// Version of a freshly inserted entity.
    pub const FIRST: Self = Self(1);

    /// Create a version with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw version number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The version after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An entity together with the version it was read at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Versioned<T> {
    /// Stored version.
    pub version: Version,
    /// Stored value.
    pub value: T,
}

/// Precondition attached to a write.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// The entity must not exist yet.
    Absent,
    /// The entity must currently be at this version.
    Exactly(Version),
    /// No check.
    Any,
}

/// A single conditional write inside a commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Write {
    /// New entity value (its key is the write target).
    pub entity: Entity,
    /// Version precondition.
    pub expected: ExpectedVersion,
}

impl Write {
    /// Write that must create `entity`.
    #[must_use]
    pub const fn insert(entity: Entity) -> Self {
        Self {
            entity,
            expected: ExpectedVersion::Absent,
        }
    }

    /// Write that must replace `entity` at `version`.
    #[must_use]
    pub const fn update(entity: Entity, version: Version) -> Self {
        Self {
            entity,
            expected: ExpectedVersion::Exactly(version),
        }
    }
}

/// Equality filters over sessions. Unset fields match everything.
///
/// Results are ordered by session name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionQuery {
    /// Restrict to children of this conference.
    pub conference: Option<EntityKey>,
    /// Exact speaker.
    pub speaker: Option<String>,
    /// Exact session type.
    pub type_of_session: Option<String>,
    /// Exact duration in minutes.
    pub duration: Option<i32>,
    /// Exact start time.
    pub start_time: Option<NaiveTime>,
}

impl SessionQuery {
    /// Query matching every session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one conference.
    #[must_use]
    pub fn in_conference(mut self, conference: EntityKey) -> Self {
        self.conference = Some(conference);
        self
    }

    /// Restrict to one speaker.
    #[must_use]
    pub fn by_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }

    /// Restrict to one session type.
    #[must_use]
    pub fn of_type(mut self, type_of_session: impl Into<String>) -> Self {
        self.type_of_session = Some(type_of_session.into());
        self
    }

    /// Restrict to one duration.
    #[must_use]
    pub const fn lasting(mut self, minutes: i32) -> Self {
        self.duration = Some(minutes);
        self
    }

    /// Restrict to one start time.
    #[must_use]
    pub const fn starting_at(mut self, time: NaiveTime) -> Self {
        self.start_time = Some(time);
        self
    }

    /// Evaluates the query against a single session.
    #[must_use]
    pub fn matches(&self, session: &Session) -> bool {
        if let Some(conf) = &self.conference {
            if !conf.is_parent_of(&session.key) {
                return false;
            }
        }
        if let Some(speaker) = &self.speaker {
            if session.speaker.as_deref() != Some(speaker.as_str()) {
                return false;
            }
        }
        if let Some(kind) = &self.type_of_session {
            if session.type_of_session.as_deref() != Some(kind.as_str()) {
                return false;
            }
        }
        if self.duration.is_some() && session.duration != self.duration {
            return false;
        }
        if self.start_time.is_some() && session.start_time != self.start_time {
            return false;
        }
        true
    }
}

/// Persistent storage for profiles, conferences and sessions.
pub trait EntityStore: Send + Sync {
    /// Load a single entity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] or [`StoreError::Serialization`] on backend failure.
    fn get(
        &self,
        key: EntityKey,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Versioned<Entity>>, StoreError>> + Send + '_>>;

    /// Load several entities. The result has one slot per requested key, in order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] or [`StoreError::Serialization`] on backend failure.
    fn get_many(
        &self,
        keys: Vec<EntityKey>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Option<Versioned<Entity>>>, StoreError>> + Send + '_>>;

    /// Unconditionally insert or replace one entity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] or [`StoreError::Serialization`] on backend failure.
    fn put(
        &self,
        entity: Entity,
    ) -> Pin<Box<dyn Future<Output = Result<Version, StoreError>> + Send + '_>>;

    /// Atomically apply `writes`, checking every version precondition.
    ///
    /// # Errors
    ///
    /// - `Conflict`: some precondition failed; nothing was written
    /// - `Database` / `Serialization`: backend failure; nothing was written
    fn commit(
        &self,
        writes: Vec<Write>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Allocate a fresh numeric id and return the key of a new `kind`
    /// entity under `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    fn allocate_key(
        &self,
        kind: EntityKind,
        parent: Option<EntityKey>,
    ) -> Pin<Box<dyn Future<Output = Result<EntityKey, StoreError>> + Send + '_>>;

    /// Direct children of `parent` with the given kind, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] or [`StoreError::Serialization`] on backend failure.
    fn children(
        &self,
        parent: EntityKey,
        kind: EntityKind,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Entity>, StoreError>> + Send + '_>>;

    /// Conferences matching a compiled filter query, in the query's order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] or [`StoreError::Serialization`] on backend failure.
    fn query_conferences(
        &self,
        query: ConferenceQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Conference>, StoreError>> + Send + '_>>;

    /// Sessions matching `query`, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] or [`StoreError::Serialization`] on backend failure.
    fn query_sessions(
        &self,
        query: SessionQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Session>, StoreError>> + Send + '_>>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::key::KeyId;

    fn session(conf: &EntityKey, id: i64, speaker: &str, minutes: i32) -> Session {
        Session {
            key: conf.child(EntityKind::Session, KeyId::Id(id)),
            name: format!("s{id}"),
            highlights: None,
            speaker: Some(speaker.to_string()),
            duration: Some(minutes),
            type_of_session: Some("Talk".to_string()),
            date: None,
            start_time: NaiveTime::from_hms_opt(10, 0, 0),
        }
    }

    #[test]
    fn conflict_error_display() {
        let key = EntityKey::profile("bob");
        let err = StoreError::Conflict { key: key.clone() };
        assert_eq!(err.to_string(), format!("Concurrency conflict on {key}"));
    }

    #[test]
    fn session_query_combines_filters() {
        let conf = EntityKey::profile("org").child(EntityKind::Conference, KeyId::Id(1));
        let other = EntityKey::profile("org").child(EntityKind::Conference, KeyId::Id(2));
        let s = session(&conf, 10, "Ada", 45);

        assert!(SessionQuery::new().matches(&s));
        assert!(SessionQuery::new().in_conference(conf.clone()).by_speaker("Ada").matches(&s));
        assert!(!SessionQuery::new().in_conference(other).matches(&s));
        assert!(!SessionQuery::new().by_speaker("Grace").matches(&s));
        assert!(!SessionQuery::new().lasting(30).matches(&s));
        assert!(
            SessionQuery::new()
                .of_type("Talk")
                .starting_at(NaiveTime::from_hms_opt(10, 0, 0).unwrap())
                .matches(&s)
        );
    }

    #[test]
    fn versions_increase() {
        assert_eq!(Version::FIRST.next(), Version::new(2));
        assert!(Version::new(3) > Version::FIRST);
    }
}
