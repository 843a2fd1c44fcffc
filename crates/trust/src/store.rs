//! Generic create-or-renew store over a [`TrustBackend`].

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info};

use warden_core::{Clock, Result};
use warden_observability::{AuthMetrics, NoopMetrics};

use crate::{TrustBackend, TrustRecord, TtlPolicy};

pub struct TrustStore<M, B> {
    name: &'static str,
    backend: B,
    policy: TtlPolicy,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn AuthMetrics>,
    _metadata: PhantomData<fn() -> M>,
}

impl<M, B> TrustStore<M, B>
where
    M: Clone + Send + Sync + 'static,
    B: TrustBackend<M>,
{
    /// `name` labels logs and metrics (e.g. `"trusted_devices"`).
    pub fn new(name: &'static str, backend: B, policy: TtlPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            backend,
            policy,
            clock,
            metrics: Arc::new(NoopMetrics),
            _metadata: PhantomData,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn AuthMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn policy(&self) -> &TtlPolicy {
        &self.policy
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Trust `resource_id` for `subject_id`, creating or renewing the record.
    ///
    /// A TTL outside `(0, max_ttl]` is replaced by the default TTL. Renewal
    /// keeps `created_at` and moves `expires_at` to `now + ttl`.
    pub async fn mark_trusted(
        &self,
        subject_id: &str,
        resource_id: &str,
        ttl: Option<Duration>,
        metadata: M,
    ) -> Result<TrustRecord<M>> {
        let ttl = self.policy.clamp(ttl);
        let now = self.clock.now();

        let record = self
            .backend
            .upsert(TrustRecord {
                subject_id: subject_id.to_string(),
                resource_id: resource_id.to_string(),
                created_at: now,
                expires_at: now + ttl,
                metadata,
            })
            .await?;

        debug!(
            store = self.name,
            subject_id,
            expires_at = %record.expires_at,
            "trust record marked"
        );
        Ok(record)
    }

    pub async fn is_trusted(&self, subject_id: &str, resource_id: &str) -> Result<bool> {
        Ok(self.get(subject_id, resource_id).await?.is_some())
    }

    /// The record, if it exists and has not expired.
    pub async fn get(&self, subject_id: &str, resource_id: &str) -> Result<Option<TrustRecord<M>>> {
        let now = self.clock.now();
        Ok(self
            .backend
            .find(subject_id, resource_id)
            .await?
            .filter(|r| r.is_active(now)))
    }

    /// Idempotent: revoking an unknown pair is not an error.
    pub async fn revoke(&self, subject_id: &str, resource_id: &str) -> Result<bool> {
        Ok(self.backend.remove(subject_id, resource_id).await?.is_some())
    }

    /// Remove and return an active record in one step.
    ///
    /// Expired records are removed too but reported as absent.
    pub async fn take(&self, subject_id: &str, resource_id: &str) -> Result<Option<TrustRecord<M>>> {
        let now = self.clock.now();
        Ok(self
            .backend
            .remove(subject_id, resource_id)
            .await?
            .filter(|r| r.is_active(now)))
    }

    /// Like [`take`](Self::take), but only when the stored metadata equals
    /// `expected`. A record renewed in the meantime is left alone.
    pub async fn take_if_matches(
        &self,
        subject_id: &str,
        resource_id: &str,
        expected: &M,
    ) -> Result<Option<TrustRecord<M>>> {
        let now = self.clock.now();
        Ok(self
            .backend
            .remove_if_matches(subject_id, resource_id, expected)
            .await?
            .filter(|r| r.is_active(now)))
    }

    pub async fn revoke_all(&self, subject_id: &str) -> Result<usize> {
        self.backend.remove_all(subject_id).await
    }

    /// Active records for a subject, oldest first.
    pub async fn list(&self, subject_id: &str) -> Result<Vec<TrustRecord<M>>> {
        let now = self.clock.now();
        let mut records = self.backend.list(subject_id).await?;
        records.retain(|r| r.is_active(now));
        Ok(records)
    }

    /// Delete expired records; returns how many were removed.
    pub async fn cleanup(&self) -> Result<usize> {
        let removed = self.backend.delete_expired(self.clock.now()).await?;
        if removed > 0 {
            info!(store = self.name, removed, "expired trust records removed");
        }
        self.metrics.trust_expired(self.name, removed);
        Ok(removed)
    }
}
