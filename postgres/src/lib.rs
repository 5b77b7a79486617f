//! `PostgreSQL` backends for Conference Central.
//!
//! - [`PostgresEntityStore`]: profiles, conferences and sessions as JSONB rows
//!   with per-row versions, atomic multi-row commits and filter queries
//!   translated to SQL.
//! - [`PostgresJobQueue`]: a durable job table claimed with
//!   `FOR UPDATE SKIP LOCKED`, with redelivery backoff and dead-lettering.
//!
//! Both share one pool. Run [`migrate`] once at startup.
//!
//! # Example
//!
//! ```no_run
//! use conference_postgres::{PostgresEntityStore, PostgresJobQueue, migrate};
//! use sqlx::PgPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = PgPool::connect("postgres://localhost/conference").await?;
//! migrate(&pool).await?;
//! let store = PostgresEntityStore::new(pool.clone());
//! let queue = PostgresJobQueue::new(pool);
//! # Ok(())
//! # }
//! ```

mod sql;
pub mod queue;
pub mod store;

pub use queue::{DeadJob, PostgresJobQueue};
pub use store::PostgresEntityStore;

use sqlx::PgPool;

/// Apply the bundled schema migrations.
///
/// # Errors
///
/// Returns the migration error if any script fails.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
