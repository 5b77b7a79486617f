//! In-memory entity store.

#![allow(clippy::unwrap_used)] // Poisoned locks only happen after a test already panicked

use conference_core::filter::ConferenceQuery;
use conference_core::key::{EntityKey, EntityKind, KeyId};
use conference_core::model::{Conference, Entity, Session};
use conference_core::store::{
    EntityStore, ExpectedVersion, SessionQuery, StoreError, Version, Versioned, Write,
};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct State {
    entities: BTreeMap<EntityKey, (Version, Entity)>,
    next_id: i64,
    injected_conflicts: usize,
    commits: usize,
}

/// In-memory [`EntityStore`] with real optimistic version checks.
///
/// Commits are atomic under a single lock. [`fail_next_commits`](Self::fail_next_commits)
/// makes the next commits report a conflict without writing, to exercise
/// transaction retry.
///
/// # Example
///
/// ```
/// use conference_testing::InMemoryEntityStore;
/// use conference_core::store::EntityStore;
/// use conference_core::key::EntityKind;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryEntityStore::new();
/// let key = store.allocate_key(EntityKind::Conference, None).await?;
/// assert!(store.get(key).await?.is_none());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryEntityStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryEntityStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` non-empty commits fail with a conflict.
    pub fn fail_next_commits(&self, n: usize) {
        self.state.lock().unwrap().injected_conflicts = n;
    }

    /// Number of commits that were applied.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.state.lock().unwrap().commits
    }

    /// Number of stored entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entities.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored version of `key`, if present.
    #[must_use]
    pub fn version_of(&self, key: &EntityKey) -> Option<Version> {
        self.state.lock().unwrap().entities.get(key).map(|(v, _)| *v)
    }

    /// Snapshot of every stored conference.
    #[must_use]
    pub fn conferences(&self) -> Vec<Conference> {
        self.state
            .lock()
            .unwrap()
            .entities
            .values()
            .filter_map(|(_, e)| e.clone().into_conference())
            .collect()
    }

    fn read(&self, key: &EntityKey) -> Option<Versioned<Entity>> {
        self.state
            .lock()
            .unwrap()
            .entities
            .get(key)
            .map(|(version, entity)| Versioned {
                version: *version,
                value: entity.clone(),
            })
    }
}

impl EntityStore for InMemoryEntityStore {
    fn get(
        &self,
        key: EntityKey,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Versioned<Entity>>, StoreError>> + Send + '_>> {
        Box::pin(async move { Ok(self.read(&key)) })
    }

    fn get_many(
        &self,
        keys: Vec<EntityKey>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Option<Versioned<Entity>>>, StoreError>> + Send + '_>>
    {
        Box::pin(async move { Ok(keys.iter().map(|k| self.read(k)).collect()) })
    }

    fn put(
        &self,
        entity: Entity,
    ) -> Pin<Box<dyn Future<Output = Result<Version, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            let key = entity.key().clone();
            let version = state
                .entities
                .get(&key)
                .map_or(Version::FIRST, |(v, _)| v.next());
            state.entities.insert(key, (version, entity));
            Ok(version)
        })
    }

    fn commit(
        &self,
        writes: Vec<Write>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            let Some(first) = writes.first() else {
                return Ok(());
            };

            if state.injected_conflicts > 0 {
                state.injected_conflicts -= 1;
                return Err(StoreError::Conflict {
                    key: first.entity.key().clone(),
                });
            }

            for write in &writes {
                let key = write.entity.key();
                let current = state.entities.get(key).map(|(v, _)| *v);
                let ok = match write.expected {
                    ExpectedVersion::Absent => current.is_none(),
                    ExpectedVersion::Exactly(expected) => current == Some(expected),
                    ExpectedVersion::Any => true,
                };
                if !ok {
                    return Err(StoreError::Conflict { key: key.clone() });
                }
            }

            for write in writes {
                let key = write.entity.key().clone();
                let version = state
                    .entities
                    .get(&key)
                    .map_or(Version::FIRST, |(v, _)| v.next());
                state.entities.insert(key, (version, write.entity));
            }
            state.commits += 1;
            Ok(())
        })
    }

    fn allocate_key(
        &self,
        kind: EntityKind,
        parent: Option<EntityKey>,
    ) -> Pin<Box<dyn Future<Output = Result<EntityKey, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = KeyId::Id(state.next_id);
            Ok(match parent {
                Some(parent) => parent.child(kind, id),
                None => EntityKey::root(kind, id),
            })
        })
    }

    fn children(
        &self,
        parent: EntityKey,
        kind: EntityKind,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Entity>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            Ok(state
                .entities
                .iter()
                .filter(|(key, _)| key.kind() == kind && parent.is_parent_of(key))
                .map(|(_, (_, entity))| entity.clone())
                .collect())
        })
    }

    fn query_conferences(
        &self,
        query: ConferenceQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Conference>, StoreError>> + Send + '_>> {
        Box::pin(async move { Ok(query.apply(self.conferences())) })
    }

    fn query_sessions(
        &self,
        query: SessionQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Session>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut sessions: Vec<Session> = self
                .state
                .lock()
                .unwrap()
                .entities
                .values()
                .filter_map(|(_, e)| e.clone().into_session())
                .filter(|s| query.matches(s))
                .collect();
            sessions.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.key.cmp(&b.key)));
            Ok(sessions)
        })
    }
}
