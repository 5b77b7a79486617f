//! Optimistic read-modify-write transactions over the entity store.
//!
//! [`run_transactional`] loads a fixed set of keys, hands a [`Transaction`]
//! snapshot to a synchronous body, and commits whatever the body changed with
//! per-entity version checks. If another writer committed first the store
//! reports [`StoreError::Conflict`]; the snapshot is discarded, the keys are
//! re-read and the body runs again, up to the policy's retry budget.
//!
//! The body must be a pure function of the snapshot: it may run several times
//! and only the run that commits has any effect. Side effects such as
//! enqueueing jobs belong after `run_transactional` returns.
//!
//! A body that returns an error aborts without writing anything.

use crate::metrics;
use crate::retry::RetryPolicy;
use conference_core::error::{ConferenceError, Result};
use conference_core::key::EntityKey;
use conference_core::model::{Caller, Conference, Entity, Profile, Session};
use conference_core::store::{EntityStore, StoreError, Version, Versioned, Write};
use std::time::Instant;
use tokio::time::sleep;

#[derive(Debug)]
struct Slot {
    key: EntityKey,
    version: Option<Version>,
    original: Option<Entity>,
    current: Option<Entity>,
}

/// Snapshot of the entities a transaction reads and writes.
///
/// Accessors are typed: asking for a conference under a key that holds
/// something else (or nothing) yields `NotFound`.
#[derive(Debug)]
pub struct Transaction {
    slots: Vec<Slot>,
}

impl Transaction {
    fn new(keys: &[EntityKey], loaded: Vec<Option<Versioned<Entity>>>) -> Self {
        let slots = keys
            .iter()
            .cloned()
            .zip(loaded)
            .map(|(key, entry)| {
                let (version, original) = match entry {
                    Some(Versioned { version, value }) => (Some(version), Some(value)),
                    None => (None, None),
                };
                Slot {
                    key,
                    version,
                    current: original.clone(),
                    original,
                }
            })
            .collect();
        Self { slots }
    }

    fn slot(&self, key: &EntityKey) -> Result<&Slot> {
        self.slots
            .iter()
            .find(|s| &s.key == key)
            .ok_or_else(|| ConferenceError::internal(format!("key {key} was not loaded in this transaction")))
    }

    fn slot_mut(&mut self, key: &EntityKey) -> Result<&mut Slot> {
        self.slots
            .iter_mut()
            .find(|s| &s.key == key)
            .ok_or_else(|| ConferenceError::internal(format!("key {key} was not loaded in this transaction")))
    }

    /// The conference stored under `key`.
    ///
    /// # Errors
    ///
    /// `NotFound` if no conference is stored there.
    pub fn conference(&self, key: &EntityKey) -> Result<&Conference> {
        match &self.slot(key)?.current {
            Some(Entity::Conference(c)) => Ok(c),
            _ => Err(ConferenceError::not_found("conference", key)),
        }
    }

    /// Mutable access to the conference stored under `key`.
    ///
    /// # Errors
    ///
    /// `NotFound` if no conference is stored there.
    pub fn conference_mut(&mut self, key: &EntityKey) -> Result<&mut Conference> {
        match &mut self.slot_mut(key)?.current {
            Some(Entity::Conference(c)) => Ok(c),
            _ => Err(ConferenceError::not_found("conference", key)),
        }
    }

    /// The session stored under `key`.
    ///
    /// # Errors
    ///
    /// `NotFound` if no session is stored there.
    pub fn session(&self, key: &EntityKey) -> Result<&Session> {
        match &self.slot(key)?.current {
            Some(Entity::Session(s)) => Ok(s),
            _ => Err(ConferenceError::not_found("session", key)),
        }
    }

    /// The caller's stored profile, without creating one.
    #[must_use]
    pub fn profile(&self, caller: &Caller) -> Option<&Profile> {
        match self.slot(&caller.profile_key()).ok()?.current.as_ref()? {
            Entity::Profile(p) => Some(p),
            _ => None,
        }
    }

    /// The caller's profile, created in the snapshot on first use.
    ///
    /// # Errors
    ///
    /// `Internal` if the profile key was not part of the transaction or holds
    /// another kind of entity.
    pub fn profile_mut(&mut self, caller: &Caller) -> Result<&mut Profile> {
        let key = caller.profile_key();
        let slot = self.slot_mut(&key)?;
        if slot.current.is_none() {
            slot.current = Some(Entity::Profile(Profile::for_caller(caller)));
        }
        match &mut slot.current {
            Some(Entity::Profile(p)) => Ok(p),
            _ => Err(ConferenceError::internal(format!("entity at {key} is not a profile"))),
        }
    }

    /// Writes for every slot whose entity changed, each guarded by the
    /// version it was read at.
    fn into_writes(self) -> Vec<Write> {
        self.slots
            .into_iter()
            .filter(|slot| slot.current != slot.original)
            .filter_map(|slot| {
                let entity = slot.current?;
                Some(match slot.version {
                    Some(version) => Write::update(entity, version),
                    None => Write::insert(entity),
                })
            })
            .collect()
    }
}

/// Run `body` as an optimistic transaction over `keys`.
///
/// # Errors
///
/// - whatever `body` returns, unchanged and without writing
/// - `Internal` when the store fails or conflicts outlast `policy.max_retries`
pub async fn run_transactional<T, F>(
    store: &dyn EntityStore,
    policy: &RetryPolicy,
    keys: Vec<EntityKey>,
    mut body: F,
) -> Result<T>
where
    F: FnMut(&mut Transaction) -> Result<T> + Send,
    T: Send,
{
    let mut keys = keys;
    keys.sort();
    keys.dedup();

    let started = Instant::now();
    let mut attempt = 0;

    let outcome = loop {
        let loaded = store.get_many(keys.clone()).await?;
        let mut txn = Transaction::new(&keys, loaded);

        let value = match body(&mut txn) {
            Ok(value) => value,
            Err(err) => break Err(err),
        };

        let writes = txn.into_writes();
        if writes.is_empty() {
            break Ok(value);
        }

        match store.commit(writes).await {
            Ok(()) => break Ok(value),
            Err(StoreError::Conflict { key }) if attempt < policy.max_retries => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt,
                    key = %key,
                    delay_ms = delay.as_millis(),
                    "Transaction conflict, retrying"
                );
                metrics::record_transaction_retry();
                sleep(delay).await;
                attempt += 1;
            }
            Err(StoreError::Conflict { key }) => {
                tracing::error!(attempt, key = %key, "Transaction conflict after max retries");
                break Err(ConferenceError::internal(format!(
                    "transaction on {key} could not commit after {} attempts",
                    attempt + 1
                )));
            }
            Err(err) => break Err(err.into()),
        }
    };

    metrics::record_transaction_duration(started.elapsed());
    outcome
}
