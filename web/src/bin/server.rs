//! Conference Central HTTP server.
//!
//! Wires the Postgres entity store and job queue, the Redis cache, the job
//! workers and the announcement scheduler behind the Axum router, and serves
//! Prometheus metrics on a separate port.

use anyhow::Context;
use axum::{Router, routing::get};
use conference_core::cache::Cache;
use conference_core::job::{JobSource, WorkQueue};
use conference_core::store::EntityStore;
use conference_postgres::{PostgresEntityStore, PostgresJobQueue, migrate};
use conference_redis::RedisCache;
use conference_runtime::metrics::MetricsServer;
use conference_runtime::retry::{RetryPolicy, retry_with_backoff};
use conference_runtime::{AnnouncementScheduler, ConferenceService, ConsoleMailer, JobHandler, JobWorker};
use conference_web::{AppState, Config, build_router};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Running jobs older than this at startup belonged to a worker that died.
const STALE_JOB_AFTER: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,conference=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Conference Central server");

    let config = Config::from_env();
    info!(
        http = %config.server_addr(),
        metrics = %config.metrics_addr(),
        redis_url = %config.redis.url,
        "Configuration loaded"
    );

    let mut metrics = MetricsServer::new(config.metrics_addr());
    metrics.start().context("Failed to start metrics recorder")?;
    let metrics = Arc::new(metrics);

    let pool = connect_postgres(&config).await?;
    migrate(&pool).await.context("Failed to run migrations")?;
    info!("Database migrations applied");

    let cache = RedisCache::new(&config.redis.url)
        .await
        .context("Failed to connect to Redis")?
        .with_prefix(config.redis.key_prefix.clone());
    cache.ping().await.context("Redis did not answer PING")?;
    info!("Cache connected");

    let store: Arc<dyn EntityStore> = Arc::new(PostgresEntityStore::new(pool.clone()));
    let cache: Arc<dyn Cache> = Arc::new(cache);
    let queue = Arc::new(
        PostgresJobQueue::new(pool.clone())
            .with_max_attempts(config.jobs.max_attempts)
            .with_retry_backoff(config.job_retry_backoff()),
    );
    if let Err(e) = queue.release_stale(STALE_JOB_AFTER).await {
        warn!(error = %e, "Could not release stale jobs");
    }

    let service = ConferenceService::new(
        store.clone(),
        cache.clone(),
        queue.clone() as Arc<dyn WorkQueue>,
    )
    .with_retry_policy(RetryPolicy::transactional(config.transactions.max_retries));

    let (shutdown_tx, _) = broadcast::channel::<()>(4);
    let mut background = spawn_background(&config, &store, &cache, &queue, &shutdown_tx);
    background.push(spawn_metrics_endpoint(&config, metrics, &shutdown_tx).await?);

    let app = build_router(AppState::new(Arc::new(service)));
    let listener = tokio::net::TcpListener::bind(config.server_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.server_addr()))?;
    info!(address = %config.server_addr(), "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped, draining background tasks");
    let _ = shutdown_tx.send(());
    let drained = tokio::time::timeout(config.shutdown_timeout(), async {
        for handle in background {
            if let Err(e) = handle.await {
                error!(error = %e, "Background task panicked");
            }
        }
    })
    .await;
    if drained.is_err() {
        warn!(
            timeout_secs = config.server.shutdown_timeout,
            "Background tasks did not stop in time"
        );
    }

    pool.close().await;
    info!("Server stopped");
    Ok(())
}

/// Connect to Postgres, retrying while the database comes up.
async fn connect_postgres(config: &Config) -> anyhow::Result<PgPool> {
    let options = PgPoolOptions::new()
        .max_connections(config.postgres.max_connections)
        .acquire_timeout(Duration::from_secs(config.postgres.connect_timeout));
    let policy = RetryPolicy::builder()
        .max_retries(5)
        .initial_delay(Duration::from_millis(500))
        .max_delay(Duration::from_secs(10))
        .build();

    let url = config.postgres.url.clone();
    let pool = retry_with_backoff(policy, || {
        let options = options.clone();
        let url = url.clone();
        async move { options.connect(&url).await }
    })
    .await
    .context("Failed to connect to Postgres")?;

    info!(max_connections = config.postgres.max_connections, "Database connected");
    Ok(pool)
}

/// Start the job workers and the announcement scheduler.
fn spawn_background(
    config: &Config,
    store: &Arc<dyn EntityStore>,
    cache: &Arc<dyn Cache>,
    queue: &Arc<PostgresJobQueue>,
    shutdown: &broadcast::Sender<()>,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::with_capacity(config.jobs.workers + 1);

    for _ in 0..config.jobs.workers {
        let handler = JobHandler::new(store.clone(), cache.clone(), Arc::new(ConsoleMailer::new()));
        let worker = JobWorker::new(
            queue.clone() as Arc<dyn JobSource>,
            handler,
            config.job_poll_interval(),
            shutdown.subscribe(),
        );
        handles.push(worker.spawn());
    }

    let scheduler = AnnouncementScheduler::new(
        queue.clone() as Arc<dyn WorkQueue>,
        config.announcement_interval(),
        shutdown.subscribe(),
    );
    handles.push(scheduler.spawn());

    info!(workers = config.jobs.workers, "Background workers started");
    handles
}

/// Serve `GET /metrics` on the metrics port until shutdown.
async fn spawn_metrics_endpoint(
    config: &Config,
    metrics: Arc<MetricsServer>,
    shutdown: &broadcast::Sender<()>,
) -> anyhow::Result<JoinHandle<()>> {
    let router = Router::new().route(
        "/metrics",
        get(move || {
            let metrics = metrics.clone();
            async move { metrics.render().unwrap_or_default() }
        }),
    );
    let listener = tokio::net::TcpListener::bind(config.metrics_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.metrics_addr()))?;
    info!(address = %config.metrics_addr(), "Metrics endpoint listening");

    let mut stop = shutdown.subscribe();
    Ok(tokio::spawn(async move {
        let served = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await;
        if let Err(e) = served {
            error!(error = %e, "Metrics endpoint failed");
        }
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
