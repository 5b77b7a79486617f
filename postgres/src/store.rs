//! `PostgreSQL` entity store.

use crate::sql;
use conference_core::filter::ConferenceQuery;
use conference_core::key::{EntityKey, EntityKind, KeyId};
use conference_core::model::{Conference, Entity, Session};
use conference_core::store::{
    EntityStore, ExpectedVersion, SessionQuery, StoreError, Version, Versioned, Write,
};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

#[allow(clippy::needless_pass_by_value)]
fn db_error(context: &str, e: sqlx::Error) -> StoreError {
    StoreError::Database(format!("{context}: {e}"))
}

fn encode(entity: &Entity) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(entity).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode(data: serde_json::Value) -> Result<Entity, StoreError> {
    serde_json::from_value(data).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[allow(clippy::cast_sign_loss)]
const fn version_from_db(version: i64) -> Version {
    Version::new(version as u64)
}

#[allow(clippy::cast_possible_wrap)]
const fn version_to_db(version: Version) -> i64 {
    version.value() as i64
}

/// Column values derived from an entity's key.
struct KeyColumns {
    key: String,
    kind: &'static str,
    parent_key: Option<String>,
    key_id: Option<i64>,
}

impl KeyColumns {
    fn of(key: &EntityKey) -> Self {
        Self {
            key: key.to_urlsafe(),
            kind: key.kind().as_str(),
            parent_key: key.parent().map(|p| p.to_urlsafe()),
            key_id: match key.id() {
                KeyId::Id(id) => Some(*id),
                KeyId::Name(_) => None,
            },
        }
    }
}

/// [`EntityStore`] over the `entities` table.
///
/// Each entity is one row holding its JSON document and a version. Commits
/// run in a single database transaction: inserts use
/// `ON CONFLICT DO NOTHING` and updates are guarded by `WHERE version = $n`,
/// so a zero row count means another writer won and the whole batch is rolled
/// back with [`StoreError::Conflict`].
#[derive(Clone)]
pub struct PostgresEntityStore {
    pool: PgPool,
}

impl PostgresEntityStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Access the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn upsert<'e, E>(executor: E, entity: &Entity) -> Result<Version, StoreError>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let columns = KeyColumns::of(entity.key());
        let (version,): (i64,) = sqlx::query_as(
            r"
            INSERT INTO entities (key, kind, parent_key, key_id, version, data)
            VALUES ($1, $2, $3, $4, 1, $5)
            ON CONFLICT (key) DO UPDATE
            SET data = EXCLUDED.data,
                version = entities.version + 1,
                updated_at = now()
            RETURNING version
            ",
        )
        .bind(&columns.key)
        .bind(columns.kind)
        .bind(&columns.parent_key)
        .bind(columns.key_id)
        .bind(encode(entity)?)
        .fetch_one(executor)
        .await
        .map_err(|e| db_error("Failed to save entity", e))?;

        Ok(version_from_db(version))
    }

    async fn apply(tx: &mut Transaction<'_, Postgres>, write: &Write) -> Result<(), StoreError> {
        let key = write.entity.key();
        let applied = match write.expected {
            ExpectedVersion::Absent => {
                let columns = KeyColumns::of(key);
                sqlx::query(
                    r"
                    INSERT INTO entities (key, kind, parent_key, key_id, version, data)
                    VALUES ($1, $2, $3, $4, 1, $5)
                    ON CONFLICT (key) DO NOTHING
                    ",
                )
                .bind(&columns.key)
                .bind(columns.kind)
                .bind(&columns.parent_key)
                .bind(columns.key_id)
                .bind(encode(&write.entity)?)
                .execute(&mut **tx)
                .await
                .map_err(|e| db_error("Failed to insert entity", e))?
                .rows_affected()
                    == 1
            }
            ExpectedVersion::Exactly(version) => {
                sqlx::query(
                    r"
                    UPDATE entities
                    SET data = $3, version = version + 1, updated_at = now()
                    WHERE key = $1 AND version = $2
                    ",
                )
                .bind(key.to_urlsafe())
                .bind(version_to_db(version))
                .bind(encode(&write.entity)?)
                .execute(&mut **tx)
                .await
                .map_err(|e| db_error("Failed to update entity", e))?
                .rows_affected()
                    == 1
            }
            ExpectedVersion::Any => {
                Self::upsert(&mut **tx, &write.entity).await?;
                true
            }
        };

        if applied {
            Ok(())
        } else {
            Err(StoreError::Conflict { key: key.clone() })
        }
    }

    async fn fetch_entities(
        &self,
        mut builder: sqlx::QueryBuilder<'static, Postgres>,
    ) -> Result<Vec<Entity>, StoreError> {
        let rows: Vec<(serde_json::Value,)> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to query entities", e))?;
        rows.into_iter().map(|(data,)| decode(data)).collect()
    }
}

impl EntityStore for PostgresEntityStore {
    fn get(
        &self,
        key: EntityKey,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Versioned<Entity>>, StoreError>> + Send + '_>>
    {
        Box::pin(async move {
            let row: Option<(i64, serde_json::Value)> =
                sqlx::query_as("SELECT version, data FROM entities WHERE key = $1")
                    .bind(key.to_urlsafe())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| db_error("Failed to load entity", e))?;

            row.map(|(version, data)| {
                Ok(Versioned {
                    version: version_from_db(version),
                    value: decode(data)?,
                })
            })
            .transpose()
        })
    }

    fn get_many(
        &self,
        keys: Vec<EntityKey>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Option<Versioned<Entity>>>, StoreError>> + Send + '_>>
    {
        Box::pin(async move {
            let encoded: Vec<String> = keys.iter().map(EntityKey::to_urlsafe).collect();
            let rows: Vec<(String, i64, serde_json::Value)> =
                sqlx::query_as("SELECT key, version, data FROM entities WHERE key = ANY($1)")
                    .bind(&encoded)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| db_error("Failed to load entities", e))?;

            let mut found: HashMap<String, Versioned<Entity>> = HashMap::with_capacity(rows.len());
            for (key, version, data) in rows {
                found.insert(
                    key,
                    Versioned {
                        version: version_from_db(version),
                        value: decode(data)?,
                    },
                );
            }
            Ok(encoded.iter().map(|key| found.get(key).cloned()).collect())
        })
    }

    fn put(&self, entity: Entity) -> Pin<Box<dyn Future<Output = Result<Version, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let version = Self::upsert(&self.pool, &entity).await?;
            tracing::debug!(key = %entity.key(), %version, "Entity saved");
            Ok(version)
        })
    }

    fn commit(&self, writes: Vec<Write>) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            if writes.is_empty() {
                return Ok(());
            }

            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| db_error("Failed to start transaction", e))?;

            for write in &writes {
                if let Err(e) = Self::apply(&mut tx, write).await {
                    let _ = tx.rollback().await; // Ignore rollback errors
                    return Err(e);
                }
            }

            tx.commit()
                .await
                .map_err(|e| db_error("Failed to commit transaction", e))?;
            tracing::debug!(writes = writes.len(), "Entities committed");
            Ok(())
        })
    }

    fn allocate_key(
        &self,
        kind: EntityKind,
        parent: Option<EntityKey>,
    ) -> Pin<Box<dyn Future<Output = Result<EntityKey, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let (id,): (i64,) = sqlx::query_as("SELECT nextval('entity_ids')")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| db_error("Failed to allocate id", e))?;
            Ok(match parent {
                Some(parent) => parent.child(kind, KeyId::Id(id)),
                None => EntityKey::root(kind, KeyId::Id(id)),
            })
        })
    }

    fn children(
        &self,
        parent: EntityKey,
        kind: EntityKind,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Entity>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let rows: Vec<(serde_json::Value,)> = sqlx::query_as(
                r"
                SELECT data FROM entities
                WHERE parent_key = $1 AND kind = $2
                ORDER BY key_id NULLS LAST, key
                ",
            )
            .bind(parent.to_urlsafe())
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load children", e))?;
            rows.into_iter().map(|(data,)| decode(data)).collect()
        })
    }

    fn query_conferences(
        &self,
        query: ConferenceQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Conference>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let entities = self.fetch_entities(sql::conference_query(&query)).await?;
            Ok(entities.into_iter().filter_map(Entity::into_conference).collect())
        })
    }

    fn query_sessions(
        &self,
        query: SessionQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Session>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let entities = self.fetch_entities(sql::session_query(&query)).await?;
            Ok(entities.into_iter().filter_map(Entity::into_session).collect())
        })
    }
}
