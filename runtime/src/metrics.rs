//! Prometheus metrics for Conference Central.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `conference_registrations_total{outcome}` - registration changes (registered, unregistered)
//! - `conference_registration_conflicts_total` - registrations rejected as duplicate or sold out
//! - `conference_transaction_retries_total` - optimistic commits retried after a version conflict
//! - `conference_jobs_processed_total{job}` - background jobs completed
//! - `conference_jobs_failed_total{job}` - background job attempts that failed
//! - `conference_jobs_dead_lettered_total{job}` - jobs parked after exhausting their attempts
//! - `conference_announcement_refreshes_total` - announcement recomputations
//! - `conference_featured_speaker_updates_total` - featured speaker cache writes
//!
//! ## Histograms
//! - `conference_transaction_duration_seconds` - wall time of a transactional operation
//!
//! # Example
//!
//! ```rust,no_run
//! use conference_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! let body = server.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder plus the address its scrape endpoint is served on.
///
/// The HTTP endpoint itself is mounted by the server binary, which calls
/// [`MetricsServer::render`] for each scrape.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server for `addr`.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Address the scrape endpoint should bind to.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed. An already
    /// installed recorder (common in tests) is not an error.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if this instance did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(
        "conference_registrations_total",
        "Registration changes by outcome (registered, unregistered)"
    );
    describe_counter!(
        "conference_registration_conflicts_total",
        "Registrations rejected because the caller was already registered or no seats were left"
    );
    describe_counter!(
        "conference_transaction_retries_total",
        "Optimistic commits retried after a version conflict"
    );
    describe_histogram!(
        "conference_transaction_duration_seconds",
        "Wall time of a transactional read-modify-write, including retries"
    );
    describe_counter!(
        "conference_jobs_processed_total",
        "Background jobs completed, by job"
    );
    describe_counter!(
        "conference_jobs_failed_total",
        "Background job attempts that failed, by job"
    );
    describe_counter!(
        "conference_jobs_dead_lettered_total",
        "Jobs parked as dead after exhausting their attempts, by job"
    );
    describe_counter!(
        "conference_announcement_refreshes_total",
        "Announcement recomputations"
    );
    describe_counter!(
        "conference_featured_speaker_updates_total",
        "Featured speaker cache writes"
    );
}

/// Record a successful registration.
pub fn record_registered() {
    counter!("conference_registrations_total", "outcome" => "registered").increment(1);
}

/// Record a successful unregistration.
pub fn record_unregistered() {
    counter!("conference_registrations_total", "outcome" => "unregistered").increment(1);
}

/// Record a registration refused with `Conflict`.
pub fn record_registration_conflict() {
    counter!("conference_registration_conflicts_total").increment(1);
}

/// Record one retried commit.
pub fn record_transaction_retry() {
    counter!("conference_transaction_retries_total").increment(1);
}

/// Record the duration of a transactional operation.
pub fn record_transaction_duration(duration: Duration) {
    histogram!("conference_transaction_duration_seconds").record(duration.as_secs_f64());
}

/// Record a completed job.
pub fn record_job_processed(job: &'static str) {
    counter!("conference_jobs_processed_total", "job" => job).increment(1);
}

/// Record a failed job attempt.
pub fn record_job_failed(job: &'static str) {
    counter!("conference_jobs_failed_total", "job" => job).increment(1);
}

/// Record an announcement recomputation.
pub fn record_announcement_refresh() {
    counter!("conference_announcement_refreshes_total").increment(1);
}

/// Record a featured speaker cache write.
pub fn record_featured_speaker_update() {
    counter!("conference_featured_speaker_updates_total").increment(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn server_starts_and_renders_business_metrics() {
        let mut server = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        server.start().unwrap();

        record_registered();
        record_job_processed("refresh_announcement");

        // Another test may own the global recorder; then there is nothing to render.
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("conference_registrations_total"));
            assert!(rendered.contains("conference_jobs_processed_total"));
        }
    }
}
