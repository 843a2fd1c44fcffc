//! Postgres-backed [`TrustBackend`].
//!
//! Every store shares one table, partitioned by store name. Metadata is
//! stored as JSONB and must round-trip through serde.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use warden_core::{Error, Result};
use warden_trust::{TrustBackend, TrustRecord};

use super::map_sqlx_error;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS trust_records (
    store       TEXT        NOT NULL,
    subject_id  TEXT        NOT NULL,
    resource_id TEXT        NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL,
    expires_at  TIMESTAMPTZ NOT NULL,
    metadata    JSONB       NOT NULL,
    PRIMARY KEY (store, subject_id, resource_id)
)
"#;

const EXPIRY_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS trust_records_expires_at_idx
    ON trust_records (store, expires_at)
"#;

pub struct PostgresTrustBackend<M> {
    pool: Arc<PgPool>,
    store: String,
    _metadata: PhantomData<fn() -> M>,
}

impl<M> PostgresTrustBackend<M> {
    /// `store` partitions the shared table, e.g. `"trusted_devices"`.
    pub fn new(pool: Arc<PgPool>, store: impl Into<String>) -> Self {
        Self {
            pool,
            store: store.into(),
            _metadata: PhantomData,
        }
    }

    pub fn store(&self) -> &str {
        &self.store
    }

    /// Create the table if missing. Safe to run repeatedly.
    #[instrument(skip(self), fields(store = %self.store), err)]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("trust.migrate", e))?;
        sqlx::query(EXPIRY_INDEX)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("trust.migrate", e))?;
        Ok(())
    }
}

impl<M: DeserializeOwned> PostgresTrustBackend<M> {
    fn record_from_row(row: &PgRow) -> Result<TrustRecord<M>> {
        let decode = |e| map_sqlx_error("trust.decode", e);
        let metadata: serde_json::Value = row.try_get("metadata").map_err(decode)?;

        Ok(TrustRecord {
            subject_id: row.try_get("subject_id").map_err(decode)?,
            resource_id: row.try_get("resource_id").map_err(decode)?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(decode)?,
            expires_at: row.try_get::<DateTime<Utc>, _>("expires_at").map_err(decode)?,
            metadata: serde_json::from_value(metadata)
                .map_err(|e| Error::storage(format!("failed to decode trust metadata: {e}")))?,
        })
    }
}

#[async_trait]
impl<M> TrustBackend<M> for PostgresTrustBackend<M>
where
    M: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    #[instrument(
        skip(self, record),
        fields(store = %self.store, subject_id = %record.subject_id, resource_id = %record.resource_id),
        err
    )]
    async fn upsert(&self, record: TrustRecord<M>) -> Result<TrustRecord<M>> {
        let metadata = serde_json::to_value(&record.metadata)
            .map_err(|e| Error::storage(format!("failed to encode trust metadata: {e}")))?;

        let row = sqlx::query(
            r#"
            INSERT INTO trust_records (store, subject_id, resource_id, created_at, expires_at, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (store, subject_id, resource_id)
            DO UPDATE SET
                expires_at = EXCLUDED.expires_at,
                metadata = EXCLUDED.metadata
            RETURNING subject_id, resource_id, created_at, expires_at, metadata
            "#,
        )
        .bind(&self.store)
        .bind(&record.subject_id)
        .bind(&record.resource_id)
        .bind(record.created_at)
        .bind(record.expires_at)
        .bind(metadata)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("trust.upsert", e))?;

        Self::record_from_row(&row)
    }

    #[instrument(skip(self), fields(store = %self.store), err)]
    async fn find(&self, subject_id: &str, resource_id: &str) -> Result<Option<TrustRecord<M>>> {
        let row = sqlx::query(
            r#"
            SELECT subject_id, resource_id, created_at, expires_at, metadata
            FROM trust_records
            WHERE store = $1 AND subject_id = $2 AND resource_id = $3
            "#,
        )
        .bind(&self.store)
        .bind(subject_id)
        .bind(resource_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("trust.find", e))?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    #[instrument(skip(self), fields(store = %self.store), err)]
    async fn remove(&self, subject_id: &str, resource_id: &str) -> Result<Option<TrustRecord<M>>> {
        let row = sqlx::query(
            r#"
            DELETE FROM trust_records
            WHERE store = $1 AND subject_id = $2 AND resource_id = $3
            RETURNING subject_id, resource_id, created_at, expires_at, metadata
            "#,
        )
        .bind(&self.store)
        .bind(subject_id)
        .bind(resource_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("trust.remove", e))?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    #[instrument(skip(self, expected), fields(store = %self.store), err)]
    async fn remove_if_matches(
        &self,
        subject_id: &str,
        resource_id: &str,
        expected: &M,
    ) -> Result<Option<TrustRecord<M>>> {
        let expected = serde_json::to_value(expected)
            .map_err(|e| Error::storage(format!("failed to encode trust metadata: {e}")))?;

        let row = sqlx::query(
            r#"
            DELETE FROM trust_records
            WHERE store = $1 AND subject_id = $2 AND resource_id = $3 AND metadata = $4
            RETURNING subject_id, resource_id, created_at, expires_at, metadata
            "#,
        )
        .bind(&self.store)
        .bind(subject_id)
        .bind(resource_id)
        .bind(expected)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("trust.remove_if_matches", e))?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    #[instrument(skip(self), fields(store = %self.store), err)]
    async fn remove_all(&self, subject_id: &str) -> Result<usize> {
        let result = sqlx::query("DELETE FROM trust_records WHERE store = $1 AND subject_id = $2")
            .bind(&self.store)
            .bind(subject_id)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("trust.remove_all", e))?;

        Ok(result.rows_affected() as usize)
    }

    #[instrument(skip(self), fields(store = %self.store), err)]
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let result = sqlx::query("DELETE FROM trust_records WHERE store = $1 AND expires_at <= $2")
            .bind(&self.store)
            .bind(now)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("trust.delete_expired", e))?;

        Ok(result.rows_affected() as usize)
    }

    #[instrument(skip(self), fields(store = %self.store), err)]
    async fn list(&self, subject_id: &str) -> Result<Vec<TrustRecord<M>>> {
        let rows = sqlx::query(
            r#"
            SELECT subject_id, resource_id, created_at, expires_at, metadata
            FROM trust_records
            WHERE store = $1 AND subject_id = $2
            ORDER BY created_at ASC, resource_id ASC
            "#,
        )
        .bind(&self.store)
        .bind(subject_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("trust.list", e))?;

        rows.iter().map(Self::record_from_row).collect()
    }
}
