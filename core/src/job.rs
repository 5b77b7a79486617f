//! Background jobs and the queue traits that carry them.
//!
//! Request handlers enqueue [`Job`]s through a [`WorkQueue`] after their
//! writes commit. Workers pull [`Delivery`]s from a [`JobSource`], run them
//! and acknowledge. Delivery is at-least-once, so every job must be
//! idempotent.

use crate::key::EntityKey;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// A unit of background work.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum Job {
    /// Mail the organizer a confirmation for a newly created conference.
    SendConfirmationEmail {
        /// Recipient.
        email: String,
        /// Human-readable summary of the conference.
        conference_info: String,
    },
    /// Re-evaluate the featured speaker for one conference.
    SetFeaturedSpeaker {
        /// Conference the speaker presents at.
        conference_key: EntityKey,
        /// Speaker of the session that was just created.
        speaker: String,
    },
    /// Recompute the "nearly sold out" announcement.
    RefreshAnnouncement,
}

impl Job {
    /// Stable job name for logs and metrics labels.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SendConfirmationEmail { .. } => "send_confirmation_email",
            Self::SetFeaturedSpeaker { .. } => "set_featured_speaker",
            Self::RefreshAnnouncement => "refresh_announcement",
        }
    }
}

/// A job handed to a worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    /// Queue-assigned id, used to ack or nack.
    pub id: i64,
    /// The job itself.
    pub job: Job,
    /// 1 on first delivery, incremented on each redelivery.
    pub attempt: u32,
}

/// Errors that can occur during queue operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The queue backend failed.
    #[error("Queue unavailable: {0}")]
    Unavailable(String),

    /// A job payload could not be (de)serialized.
    #[error("Job serialization error: {0}")]
    Serialization(String),

    /// Ack or nack for a delivery the queue does not know.
    #[error("Unknown delivery: {0}")]
    UnknownDelivery(i64),
}

/// Producer side of the job queue.
pub trait WorkQueue: Send + Sync {
    /// Enqueue a job for asynchronous execution.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the job could not be recorded.
    fn enqueue(&self, job: Job) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + '_>>;
}

/// Consumer side of the job queue.
pub trait JobSource: Send + Sync {
    /// Take the next ready job, or `None` if the queue is currently empty.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] on backend failure.
    fn next_delivery(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Delivery>, QueueError>> + Send + '_>>;

    /// Mark a delivery as done.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] on backend failure or unknown id.
    fn ack(&self, id: i64) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + '_>>;

    /// Report a failed delivery. The queue redelivers it later or, once its
    /// attempts are exhausted, parks it as dead.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] on backend failure or unknown id.
    fn nack(
        &self,
        id: i64,
        error: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + '_>>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn jobs_are_tagged_on_the_wire() {
        let json = serde_json::to_value(Job::RefreshAnnouncement).unwrap();
        assert_eq!(json, serde_json::json!({ "job": "refresh_announcement" }));

        let job = Job::SendConfirmationEmail {
            email: "a@example.com".to_string(),
            conference_info: "RustConf".to_string(),
        };
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["job"], "send_confirmation_email");
        assert_eq!(job.name(), "send_confirmation_email");
    }
}
