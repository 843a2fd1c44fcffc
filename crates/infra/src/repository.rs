//! In-memory [`Repository`] for tests/dev.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use warden_core::{Entity, Error, ListQuery, Page, Repository, Result};

struct Table<E: Entity> {
    rows: HashMap<E::Id, E>,
    /// Insertion order, for stable listing.
    order: Vec<E::Id>,
}

impl<E: Entity> Table<E> {
    fn conflict(&self, candidate: &E) -> Option<&'static str> {
        let keys = candidate.unique_keys();
        self.rows
            .values()
            .filter(|row| row.id() != candidate.id())
            .flat_map(|row| row.unique_keys())
            .find_map(|existing| keys.iter().find(|k| **k == existing).map(|k| k.0))
    }
}

/// Process-local table keyed by entity id.
///
/// Unique constraints come from [`Entity::unique_keys`] and are checked
/// under the same write lock as the insert.
pub struct InMemoryRepository<E: Entity> {
    inner: RwLock<Table<E>>,
}

impl<E: Entity> InMemoryRepository<E> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Table {
                rows: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.read().map(|t| t.rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Table<E>>> {
        self.inner
            .read()
            .map_err(|_| Error::storage(format!("{} table lock poisoned", E::RESOURCE)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Table<E>>> {
        self.inner
            .write()
            .map_err(|_| Error::storage(format!("{} table lock poisoned", E::RESOURCE)))
    }
}

impl<E: Entity> Default for InMemoryRepository<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity> Repository<E> for InMemoryRepository<E> {
    async fn create(&self, entity: E) -> Result<E> {
        let mut table = self.write()?;

        if table.rows.contains_key(entity.id()) {
            return Err(Error::conflict(format!(
                "{} '{}' already exists",
                E::RESOURCE,
                entity.id()
            )));
        }
        if let Some(constraint) = table.conflict(&entity) {
            return Err(Error::conflict(format!(
                "{} {constraint} already taken",
                E::RESOURCE
            )));
        }

        table.order.push(entity.id().clone());
        table.rows.insert(entity.id().clone(), entity.clone());
        Ok(entity)
    }

    async fn find_by_id(&self, id: &E::Id) -> Result<Option<E>> {
        Ok(self.read()?.rows.get(id).cloned())
    }

    async fn update(&self, entity: E) -> Result<E> {
        let mut table = self.write()?;

        if !table.rows.contains_key(entity.id()) {
            return Err(Error::NotFound);
        }
        if let Some(constraint) = table.conflict(&entity) {
            return Err(Error::conflict(format!(
                "{} {constraint} already taken",
                E::RESOURCE
            )));
        }

        table.rows.insert(entity.id().clone(), entity.clone());
        Ok(entity)
    }

    async fn delete(&self, id: &E::Id) -> Result<bool> {
        let mut table = self.write()?;
        if table.rows.remove(id).is_none() {
            return Ok(false);
        }
        table.order.retain(|existing| existing != id);
        Ok(true)
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<E>> {
        let table = self.read()?;

        let matching: Vec<&E> = table
            .order
            .iter()
            .filter_map(|id| table.rows.get(id))
            .filter(|row| query.matches(*row))
            .collect();

        let total = matching.len() as u64;
        let offset = query.pagination.offset as usize;
        let limit = query.pagination.limit as usize;
        let items: Vec<E> = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        let has_more = (offset as u64).saturating_add(items.len() as u64) < total;

        Ok(Page {
            items,
            total,
            pagination: query.pagination,
            has_more,
        })
    }
}
