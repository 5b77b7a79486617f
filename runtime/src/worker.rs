//! Background job execution.
//!
//! - [`JobHandler`] runs a single [`Job`] against the store, cache and mailer.
//! - [`JobWorker`] drains a [`JobSource`], acking successes and nacking
//!   failures so the source can redeliver or dead-letter them.
//! - [`AnnouncementScheduler`] enqueues a `RefreshAnnouncement` job on a
//!   fixed interval.
//!
//! Both loops run as spawned tasks and stop when the shutdown channel fires.

use crate::mailer::{Mail, MailError, Mailer};
use crate::metrics;
use crate::recompute::{refresh_announcement, set_featured_speaker};
use conference_core::cache::Cache;
use conference_core::error::ConferenceError;
use conference_core::job::{Delivery, Job, JobSource, QueueError, WorkQueue};
use conference_core::store::EntityStore;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Errors raised while running a job.
#[derive(Error, Debug)]
pub enum JobError {
    /// A store or cache operation failed.
    #[error(transparent)]
    Domain(#[from] ConferenceError),

    /// The mail could not be delivered.
    #[error(transparent)]
    Mail(#[from] MailError),
}

/// Executes jobs.
#[derive(Clone)]
pub struct JobHandler {
    store: Arc<dyn EntityStore>,
    cache: Arc<dyn Cache>,
    mailer: Arc<dyn Mailer>,
}

impl JobHandler {
    /// Create a handler over the given collaborators.
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>, cache: Arc<dyn Cache>, mailer: Arc<dyn Mailer>) -> Self {
        Self { store, cache, mailer }
    }

    /// Run one job to completion.
    ///
    /// # Errors
    ///
    /// Returns [`JobError`] if any collaborator fails. Every job is safe to
    /// run again after a failure.
    pub async fn handle(&self, job: &Job) -> Result<(), JobError> {
        match job {
            Job::SendConfirmationEmail { email, conference_info } => {
                self.mailer
                    .send(Mail::conference_confirmation(email, conference_info))
                    .await?;
            }
            Job::SetFeaturedSpeaker { conference_key, speaker } => {
                set_featured_speaker(self.store.as_ref(), self.cache.as_ref(), conference_key, speaker)
                    .await?;
            }
            Job::RefreshAnnouncement => {
                refresh_announcement(self.store.as_ref(), self.cache.as_ref()).await?;
            }
        }
        Ok(())
    }
}

/// Pulls jobs from a [`JobSource`] and runs them.
pub struct JobWorker {
    source: Arc<dyn JobSource>,
    handler: JobHandler,
    poll_interval: Duration,
    shutdown: broadcast::Receiver<()>,
}

impl JobWorker {
    /// Create a worker. `poll_interval` is how long to wait when the source
    /// is empty or failing.
    #[must_use]
    pub fn new(
        source: Arc<dyn JobSource>,
        handler: JobHandler,
        poll_interval: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            source,
            handler,
            poll_interval,
            shutdown,
        }
    }

    /// Take and run at most one job. Returns `false` when the source was empty.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the source fails to deliver, ack or nack.
    /// Job failures are not errors here; they are nacked.
    pub async fn run_once(&self) -> Result<bool, QueueError> {
        let Some(delivery) = self.source.next_delivery().await? else {
            return Ok(false);
        };
        self.process(delivery).await?;
        Ok(true)
    }

    async fn process(&self, delivery: Delivery) -> Result<(), QueueError> {
        let name = delivery.job.name();
        match self.handler.handle(&delivery.job).await {
            Ok(()) => {
                metrics::record_job_processed(name);
                debug!(job = name, id = delivery.id, attempt = delivery.attempt, "Job completed");
                self.source.ack(delivery.id).await
            }
            Err(err) => {
                metrics::record_job_failed(name);
                warn!(
                    job = name,
                    id = delivery.id,
                    attempt = delivery.attempt,
                    error = %err,
                    "Job failed"
                );
                self.source.nack(delivery.id, err.to_string()).await
            }
        }
    }

    /// Spawn the worker loop as a background task.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&mut self) {
        info!("Job worker started");
        loop {
            let idle = match self.run_once().await {
                Ok(found) => !found,
                Err(e) => {
                    error!(error = %e, "Job source failed");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = self.shutdown.recv() => break,
                    () = tokio::time::sleep(self.poll_interval) => {}
                }
            } else if !matches!(self.shutdown.try_recv(), Err(broadcast::error::TryRecvError::Empty)) {
                break;
            }
        }
        info!("Job worker stopped");
    }
}

/// Enqueues `RefreshAnnouncement` on a fixed interval, starting immediately.
pub struct AnnouncementScheduler {
    queue: Arc<dyn WorkQueue>,
    interval: Duration,
    shutdown: broadcast::Receiver<()>,
}

impl AnnouncementScheduler {
    /// Create a scheduler.
    #[must_use]
    pub fn new(queue: Arc<dyn WorkQueue>, interval: Duration, shutdown: broadcast::Receiver<()>) -> Self {
        Self {
            queue,
            interval,
            shutdown,
        }
    }

    /// Spawn the scheduler loop as a background task.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&mut self) {
        info!(interval_secs = self.interval.as_secs(), "Announcement scheduler started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.queue.enqueue(Job::RefreshAnnouncement).await {
                        warn!(error = %e, "Failed to schedule announcement refresh");
                    }
                }
            }
        }
        info!("Announcement scheduler stopped");
    }
}
