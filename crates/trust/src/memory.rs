use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use warden_core::{Error, Result};

use crate::{TrustBackend, TrustRecord};

/// In-memory trust backend for tests/dev.
///
/// Every operation takes the lock once, so `upsert` is atomic with respect to
/// concurrent marks of the same pair.
#[derive(Debug)]
pub struct InMemoryTrustBackend<M> {
    inner: RwLock<HashMap<(String, String), TrustRecord<M>>>,
}

impl<M> InMemoryTrustBackend<M> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<(String, String), TrustRecord<M>>>> {
        self.inner
            .read()
            .map_err(|_| Error::storage("trust store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<(String, String), TrustRecord<M>>>> {
        self.inner
            .write()
            .map_err(|_| Error::storage("trust store lock poisoned"))
    }
}

impl<M> Default for InMemoryTrustBackend<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<M> TrustBackend<M> for InMemoryTrustBackend<M>
where
    M: Clone + PartialEq + Send + Sync + 'static,
{
    async fn upsert(&self, record: TrustRecord<M>) -> Result<TrustRecord<M>> {
        let mut map = self.write()?;
        let key = (record.subject_id.clone(), record.resource_id.clone());

        let stored = match map.get_mut(&key) {
            Some(existing) => {
                existing.expires_at = record.expires_at;
                existing.metadata = record.metadata;
                existing.clone()
            }
            None => {
                map.insert(key, record.clone());
                record
            }
        };
        Ok(stored)
    }

    async fn find(&self, subject_id: &str, resource_id: &str) -> Result<Option<TrustRecord<M>>> {
        let map = self.read()?;
        Ok(map
            .get(&(subject_id.to_string(), resource_id.to_string()))
            .cloned())
    }

    async fn remove(&self, subject_id: &str, resource_id: &str) -> Result<Option<TrustRecord<M>>> {
        let mut map = self.write()?;
        Ok(map.remove(&(subject_id.to_string(), resource_id.to_string())))
    }

    async fn remove_if_matches(
        &self,
        subject_id: &str,
        resource_id: &str,
        expected: &M,
    ) -> Result<Option<TrustRecord<M>>> {
        let mut map = self.write()?;
        let key = (subject_id.to_string(), resource_id.to_string());
        match map.get(&key) {
            Some(record) if record.metadata == *expected => Ok(map.remove(&key)),
            _ => Ok(None),
        }
    }

    async fn remove_all(&self, subject_id: &str) -> Result<usize> {
        let mut map = self.write()?;
        let before = map.len();
        map.retain(|(s, _), _| s != subject_id);
        Ok(before - map.len())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut map = self.write()?;
        let before = map.len();
        map.retain(|_, r| r.is_active(now));
        Ok(before - map.len())
    }

    async fn list(&self, subject_id: &str) -> Result<Vec<TrustRecord<M>>> {
        let map = self.read()?;
        let mut records: Vec<TrustRecord<M>> = map
            .values()
            .filter(|r| r.subject_id == subject_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }
}
