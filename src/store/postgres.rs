//! PostgreSQL store: one `(id uuid, doc jsonb)` table per collection.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::{PgPool, Postgres};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::sql::{quote_identifier, SqlBuilder, SqlParam};
use super::{validate_collection, ResourceStore, StoreError, StoreResult};
use crate::config::StoreConfig;
use crate::query::QuerySpec;
use crate::types::{Document, ID_FIELD, VERSION_FIELD};

pub struct PgStore {
    pool: PgPool,
    /// Collections whose table is known to exist
    ready: RwLock<HashSet<String>>,
    slow_query_threshold: Duration,
}

impl PgStore {
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let url = config.database_url.as_deref().ok_or(StoreError::ConfigMissing("DATABASE_URL"))?;
        url::Url::parse(url).map_err(|_| StoreError::ConfigMissing("valid DATABASE_URL"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await
            .map_err(map_sqlx)?;

        info!("Connected PostgreSQL store ({} max connections)", config.max_connections);
        Ok(Self::from_pool(pool, Duration::from_millis(config.slow_query_threshold_ms)))
    }

    pub fn from_pool(pool: PgPool, slow_query_threshold: Duration) -> Self {
        Self {
            pool,
            ready: RwLock::new(HashSet::new()),
            slow_query_threshold,
        }
    }

    /// Create the collection table on first use
    async fn ensure_collection(&self, collection: &str) -> StoreResult<()> {
        validate_collection(collection)?;
        {
            let ready = self.ready.read().await;
            if ready.contains(collection) {
                return Ok(());
            }
        }

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (id UUID PRIMARY KEY, doc JSONB NOT NULL, created_at TIMESTAMPTZ NOT NULL DEFAULT now())",
            quote_identifier(collection)
        );
        sqlx::query(&ddl).execute(&self.pool).await.map_err(map_sqlx)?;

        self.ready.write().await.insert(collection.to_string());
        info!("Collection table ready: {}", collection);
        Ok(())
    }

    fn observe(&self, what: &str, collection: &str, started: Instant) {
        let elapsed = started.elapsed();
        if elapsed > self.slow_query_threshold {
            tracing::warn!("Slow store call: {} on '{}' took {:?}", what, collection, elapsed);
        }
    }

    /// Close the pool (e.g., on shutdown)
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed PostgreSQL store pool");
    }
}

fn map_sqlx(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        other => StoreError::Sqlx(other),
    }
}

fn into_document(value: Value) -> StoreResult<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Query(format!("expected a JSON object, got {}", other))),
    }
}

fn bind_params<'q>(
    mut q: sqlx::query::QueryScalar<'q, Postgres, Value, PgArguments>,
    params: Vec<SqlParam>,
) -> sqlx::query::QueryScalar<'q, Postgres, Value, PgArguments> {
    for p in params {
        q = match p {
            SqlParam::Path(path) => q.bind(path),
            SqlParam::Json(value) => q.bind(value),
        };
    }
    q
}

#[async_trait]
impl ResourceStore for PgStore {
    async fn find(&self, collection: &str, spec: &QuerySpec) -> StoreResult<Vec<Document>> {
        self.ensure_collection(collection).await?;
        let sql = SqlBuilder::select(collection, spec)?;
        let started = Instant::now();

        let rows = bind_params(sqlx::query_scalar::<_, Value>(&sql.query), sql.params)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        self.observe("find", collection, started);

        rows.into_iter()
            .map(|row| {
                let mut doc = into_document(row)?;
                spec.projection().apply(&mut doc);
                Ok(doc)
            })
            .collect()
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.ensure_collection(collection).await?;
        let Ok(uuid) = Uuid::parse_str(id) else {
            return Ok(None);
        };
        let sql = format!("SELECT doc FROM {} WHERE id = $1", quote_identifier(collection));
        let row = sqlx::query_scalar::<_, Value>(&sql)
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(into_document).transpose()
    }

    async fn create(&self, collection: &str, mut doc: Document) -> StoreResult<Document> {
        self.ensure_collection(collection).await?;
        let id = Uuid::new_v4();
        doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        doc.insert(VERSION_FIELD.to_string(), Value::from(0));

        let sql = format!("INSERT INTO {} (id, doc) VALUES ($1, $2) RETURNING doc", quote_identifier(collection));
        let started = Instant::now();
        let row = sqlx::query_scalar::<_, Value>(&sql)
            .bind(id)
            .bind(Value::Object(doc))
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;
        self.observe("create", collection, started);
        into_document(row)
    }

    async fn update_by_id(&self, collection: &str, id: &str, mut patch: Document) -> StoreResult<Option<Document>> {
        self.ensure_collection(collection).await?;
        let Ok(uuid) = Uuid::parse_str(id) else {
            return Ok(None);
        };
        patch.remove(ID_FIELD);
        patch.remove(VERSION_FIELD);

        // Merge and version bump happen in one statement
        let sql = format!(
            "UPDATE {} SET doc = doc || $2::jsonb || jsonb_build_object('{}', COALESCE((doc->>'{}')::bigint, 0) + 1) \
             WHERE id = $1 RETURNING doc",
            quote_identifier(collection),
            VERSION_FIELD,
            VERSION_FIELD
        );
        let started = Instant::now();
        let row = sqlx::query_scalar::<_, Value>(&sql)
            .bind(uuid)
            .bind(Value::Object(patch))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        self.observe("update", collection, started);
        row.map(into_document).transpose()
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> StoreResult<bool> {
        self.ensure_collection(collection).await?;
        let Ok(uuid) = Uuid::parse_str(id) else {
            return Ok(false);
        };
        let sql = format!("DELETE FROM {} WHERE id = $1", quote_identifier(collection));
        let result = sqlx::query(&sql).bind(uuid).execute(&self.pool).await.map_err(map_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(map_sqlx)?;
        Ok(())
    }
}
