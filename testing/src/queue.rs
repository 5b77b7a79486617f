//! In-memory job queue.

#![allow(clippy::unwrap_used)] // Poisoned locks only happen after a test already panicked

use conference_core::job::{Delivery, Job, JobSource, QueueError, WorkQueue};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// Default number of deliveries before a job is dead-lettered.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    pending: VecDeque<Delivery>,
    in_flight: HashMap<i64, Delivery>,
    enqueued: Vec<Job>,
    dead: Vec<(Job, String)>,
    refuse_enqueue: bool,
}

/// In-memory [`WorkQueue`] and [`JobSource`].
///
/// Records every enqueued job for assertions, redelivers nacked jobs
/// immediately, and dead-letters a job after `max_attempts` failed
/// deliveries.
#[derive(Clone, Debug)]
pub struct InMemoryJobQueue {
    state: Arc<Mutex<State>>,
    max_attempts: u32,
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryJobQueue {
    /// Create an empty queue with [`DEFAULT_MAX_ATTEMPTS`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_attempts(DEFAULT_MAX_ATTEMPTS)
    }

    /// Create an empty queue with a custom delivery limit.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            max_attempts,
        }
    }

    /// Every job ever enqueued, in order.
    #[must_use]
    pub fn enqueued(&self) -> Vec<Job> {
        self.state.lock().unwrap().enqueued.clone()
    }

    /// Jobs waiting for delivery.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    /// Dead-lettered jobs with their last error.
    #[must_use]
    pub fn dead_letters(&self) -> Vec<(Job, String)> {
        self.state.lock().unwrap().dead.clone()
    }

    /// Make `enqueue` fail until reset.
    pub fn refuse_enqueue(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_enqueue = refuse;
    }
}

impl WorkQueue for InMemoryJobQueue {
    fn enqueue(&self, job: Job) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            if state.refuse_enqueue {
                return Err(QueueError::Unavailable("queue refusing jobs".to_string()));
            }
            state.next_id += 1;
            let id = state.next_id;
            state.enqueued.push(job.clone());
            state.pending.push_back(Delivery { id, job, attempt: 1 });
            Ok(())
        })
    }
}

impl JobSource for InMemoryJobQueue {
    fn next_delivery(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Delivery>, QueueError>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            let Some(delivery) = state.pending.pop_front() else {
                return Ok(None);
            };
            state.in_flight.insert(delivery.id, delivery.clone());
            Ok(Some(delivery))
        })
    }

    fn ack(&self, id: i64) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state
                .in_flight
                .remove(&id)
                .map(|_| ())
                .ok_or(QueueError::UnknownDelivery(id))
        })
    }

    fn nack(
        &self,
        id: i64,
        error: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            let delivery = state
                .in_flight
                .remove(&id)
                .ok_or(QueueError::UnknownDelivery(id))?;
            if delivery.attempt >= self.max_attempts {
                state.dead.push((delivery.job, error));
            } else {
                state.pending.push_back(Delivery {
                    attempt: delivery.attempt + 1,
                    ..delivery
                });
            }
            Ok(())
        })
    }
}
