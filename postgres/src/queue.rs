//! Durable job queue on the `jobs` table.
//!
//! Workers claim the oldest ready row with `FOR UPDATE SKIP LOCKED`, so any
//! number of workers can poll the same table without handing out a job twice.
//! A failed job goes back to `pending` with an exponential delay until it has
//! been tried `max_attempts` times, after which it is parked as `dead` for
//! inspection and manual requeue.

use chrono::{DateTime, Utc};
use conference_core::job::{Delivery, Job, JobSource, QueueError, WorkQueue};
use sqlx::{PgPool, Row};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Default number of deliveries before a job is dead-lettered.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default delay before the first redelivery. Doubles on every attempt.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(5);

#[allow(clippy::needless_pass_by_value)]
fn unavailable(context: &str, e: sqlx::Error) -> QueueError {
    QueueError::Unavailable(format!("{context}: {e}"))
}

/// A dead-lettered job.
#[derive(Debug, Clone)]
pub struct DeadJob {
    /// Row id.
    pub id: i64,
    /// The job that kept failing.
    pub job: Job,
    /// Deliveries made.
    pub attempts: i32,
    /// Error from the last delivery.
    pub last_error: Option<String>,
    /// When the job was first enqueued.
    pub created_at: DateTime<Utc>,
    /// When the job was parked.
    pub failed_at: DateTime<Utc>,
}

/// [`WorkQueue`] and [`JobSource`] backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PostgresJobQueue {
    pool: PgPool,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl PostgresJobQueue {
    /// Create a queue with the default attempt limit and backoff.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self {
            pool,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Set how many deliveries a job gets before it is dead-lettered.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the delay before the first redelivery.
    #[must_use]
    pub const fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// List dead-lettered jobs, oldest failure first.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the query fails or a payload no longer
    /// deserializes.
    pub async fn list_dead(&self, limit: usize) -> Result<Vec<DeadJob>, QueueError> {
        #[allow(clippy::cast_possible_wrap)]
        let rows = sqlx::query(
            r"
            SELECT id, payload, attempts, last_error, created_at, updated_at
            FROM jobs
            WHERE status = 'dead'
            ORDER BY updated_at ASC
            LIMIT $1
            ",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| unavailable("Failed to list dead jobs", e))?;

        rows.iter()
            .map(|row| {
                let payload: serde_json::Value = row.get("payload");
                Ok(DeadJob {
                    id: row.get("id"),
                    job: serde_json::from_value(payload)
                        .map_err(|e| QueueError::Serialization(e.to_string()))?,
                    attempts: row.get("attempts"),
                    last_error: row.get("last_error"),
                    created_at: row.get("created_at"),
                    failed_at: row.get("updated_at"),
                })
            })
            .collect()
    }

    /// Move a dead job back to `pending` with a fresh attempt budget.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::UnknownDelivery`] if no dead job has this id.
    pub async fn requeue_dead(&self, id: i64) -> Result<(), QueueError> {
        let result = sqlx::query(
            r"
            UPDATE jobs
            SET status = 'pending', attempts = 0, available_at = now(), updated_at = now()
            WHERE id = $1 AND status = 'dead'
            ",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| unavailable("Failed to requeue job", e))?;

        if result.rows_affected() == 0 {
            return Err(QueueError::UnknownDelivery(id));
        }
        tracing::info!(job_id = id, "Dead job requeued");
        Ok(())
    }

    /// Return `running` rows whose worker disappeared to `pending`.
    ///
    /// A job left `running` longer than `stale_after` is assumed abandoned.
    /// Returns the number of rows released.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the update fails.
    pub async fn release_stale(&self, stale_after: Duration) -> Result<u64, QueueError> {
        let result = sqlx::query(
            r"
            UPDATE jobs
            SET status = 'pending', available_at = now(), updated_at = now()
            WHERE status = 'running'
              AND updated_at < now() - make_interval(secs => $1)
            ",
        )
        .bind(stale_after.as_secs_f64())
        .execute(&self.pool)
        .await
        .map_err(|e| unavailable("Failed to release stale jobs", e))?;

        let released = result.rows_affected();
        if released > 0 {
            tracing::warn!(released, "Released stale running jobs");
        }
        Ok(released)
    }
}

impl WorkQueue for PostgresJobQueue {
    fn enqueue(&self, job: Job) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + '_>> {
        Box::pin(async move {
            let payload =
                serde_json::to_value(&job).map_err(|e| QueueError::Serialization(e.to_string()))?;
            let (id,): (i64,) =
                sqlx::query_as("INSERT INTO jobs (job_type, payload) VALUES ($1, $2) RETURNING id")
                    .bind(job.name())
                    .bind(payload)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| unavailable("Failed to enqueue job", e))?;

            tracing::debug!(job_id = id, job = job.name(), "Job enqueued");
            Ok(())
        })
    }
}

impl JobSource for PostgresJobQueue {
    fn next_delivery(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Delivery>, QueueError>> + Send + '_>> {
        Box::pin(async move {
            let row: Option<(i64, serde_json::Value, i32)> = sqlx::query_as(
                r"
                UPDATE jobs
                SET status = 'running', attempts = attempts + 1, updated_at = now()
                WHERE id = (
                    SELECT id FROM jobs
                    WHERE status = 'pending' AND available_at <= now()
                    ORDER BY available_at, id
                    FOR UPDATE SKIP LOCKED
                    LIMIT 1
                )
                RETURNING id, payload, attempts
                ",
            )
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| unavailable("Failed to claim job", e))?;

            let Some((id, payload, attempts)) = row else {
                return Ok(None);
            };
            let job: Job =
                serde_json::from_value(payload).map_err(|e| QueueError::Serialization(e.to_string()))?;
            Ok(Some(Delivery {
                id,
                job,
                attempt: u32::try_from(attempts).unwrap_or(u32::MAX),
            }))
        })
    }

    fn ack(&self, id: i64) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + '_>> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM jobs WHERE id = $1 AND status = 'running'")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| unavailable("Failed to ack job", e))?;

            if result.rows_affected() == 0 {
                return Err(QueueError::UnknownDelivery(id));
            }
            Ok(())
        })
    }

    fn nack(
        &self,
        id: i64,
        error: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + '_>> {
        Box::pin(async move {
            let row: Option<(String, String, i32)> = sqlx::query_as(
                r"
                UPDATE jobs
                SET status = CASE WHEN attempts >= $3 THEN 'dead' ELSE 'pending' END,
                    last_error = $2,
                    available_at = now()
                        + make_interval(secs => $4 * power(2, greatest(attempts - 1, 0))),
                    updated_at = now()
                WHERE id = $1 AND status = 'running'
                RETURNING status, job_type, attempts
                ",
            )
            .bind(id)
            .bind(&error)
            .bind(i32::try_from(self.max_attempts).unwrap_or(i32::MAX))
            .bind(self.retry_backoff.as_secs_f64())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| unavailable("Failed to nack job", e))?;

            let Some((status, job_type, attempts)) = row else {
                return Err(QueueError::UnknownDelivery(id));
            };

            if status == "dead" {
                tracing::warn!(
                    job_id = id,
                    job = %job_type,
                    attempts,
                    error = %error,
                    "Job moved to dead letters"
                );
                metrics::counter!("conference_jobs_dead_lettered_total", "job" => job_type)
                    .increment(1);
            } else {
                tracing::debug!(job_id = id, job = %job_type, attempts, "Job scheduled for redelivery");
            }
            Ok(())
        })
    }
}
