use async_trait::async_trait;
use chrono::{DateTime, Utc};

use warden_core::Result;

use crate::TrustRecord;

/// Storage for trust records.
///
/// `upsert` must be a single atomic create-or-renew: when the pair exists,
/// `expires_at` and `metadata` are replaced and `created_at` is kept.
#[async_trait]
pub trait TrustBackend<M>: Send + Sync
where
    M: Clone + Send + Sync + 'static,
{
    async fn upsert(&self, record: TrustRecord<M>) -> Result<TrustRecord<M>>;

    async fn find(&self, subject_id: &str, resource_id: &str) -> Result<Option<TrustRecord<M>>>;

    /// Remove and return the record, if any.
    async fn remove(&self, subject_id: &str, resource_id: &str) -> Result<Option<TrustRecord<M>>>;

    /// Remove and return the record only if its metadata equals `expected`.
    ///
    /// Compare and delete must be one atomic step: a concurrent `upsert`
    /// either lands before (and the compare fails) or after (and survives).
    async fn remove_if_matches(
        &self,
        subject_id: &str,
        resource_id: &str,
        expected: &M,
    ) -> Result<Option<TrustRecord<M>>>;

    async fn remove_all(&self, subject_id: &str) -> Result<usize>;

    /// Delete every record with `expires_at <= now`.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize>;

    async fn list(&self, subject_id: &str) -> Result<Vec<TrustRecord<M>>>;
}

#[async_trait]
impl<M, B> TrustBackend<M> for std::sync::Arc<B>
where
    M: Clone + Send + Sync + 'static,
    B: TrustBackend<M> + ?Sized,
{
    async fn upsert(&self, record: TrustRecord<M>) -> Result<TrustRecord<M>> {
        (**self).upsert(record).await
    }

    async fn find(&self, subject_id: &str, resource_id: &str) -> Result<Option<TrustRecord<M>>> {
        (**self).find(subject_id, resource_id).await
    }

    async fn remove(&self, subject_id: &str, resource_id: &str) -> Result<Option<TrustRecord<M>>> {
        (**self).remove(subject_id, resource_id).await
    }

    async fn remove_if_matches(
        &self,
        subject_id: &str,
        resource_id: &str,
        expected: &M,
    ) -> Result<Option<TrustRecord<M>>> {
        (**self)
            .remove_if_matches(subject_id, resource_id, expected)
            .await
    }

    async fn remove_all(&self, subject_id: &str) -> Result<usize> {
        (**self).remove_all(subject_id).await
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        (**self).delete_expired(now).await
    }

    async fn list(&self, subject_id: &str) -> Result<Vec<TrustRecord<M>>> {
        (**self).list(subject_id).await
    }
}
