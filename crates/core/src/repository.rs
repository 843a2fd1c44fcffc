//! Narrow per-entity persistence interface.
//!
//! Core services and decorators only see this trait; the concrete store
//! (in-memory, SQL) lives in an adapter crate.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::Result;

/// Pagination parameters for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of records to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(50).min(1000),
            offset: offset.unwrap_or(0),
        }
    }

    /// Everything the store holds, in one page.
    pub fn unbounded() -> Self {
        Self {
            limit: u32::MAX,
            offset: 0,
        }
    }
}

/// Equality filters plus pagination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    /// `(field, value)` pairs; a record matches when every pair matches.
    pub filters: Vec<(String, String)>,
    pub pagination: Pagination,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    /// Whether `entity` satisfies every filter.
    pub fn matches<E: Entity>(&self, entity: &E) -> bool {
        self.filters
            .iter()
            .all(|(field, value)| entity.field(field).is_some_and(|v| v == value.as_str()))
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total matching records across all pages.
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn empty(pagination: Pagination) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            pagination,
            has_more: false,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            pagination: self.pagination,
            has_more: self.has_more,
        }
    }
}

/// Entity repository.
///
/// `create` must enforce the entity's unique constraints atomically and fail
/// with `Error::Conflict` on a violation. `delete` reports whether a record
/// was removed.
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    async fn create(&self, entity: E) -> Result<E>;

    async fn find_by_id(&self, id: &E::Id) -> Result<Option<E>>;

    /// Replace an existing record; `Error::NotFound` if absent.
    async fn update(&self, entity: E) -> Result<E>;

    async fn delete(&self, id: &E::Id) -> Result<bool>;

    async fn list(&self, query: &ListQuery) -> Result<Page<E>>;
}

#[async_trait]
impl<E, R> Repository<E> for Arc<R>
where
    E: Entity,
    R: Repository<E> + ?Sized,
{
    async fn create(&self, entity: E) -> Result<E> {
        (**self).create(entity).await
    }

    async fn find_by_id(&self, id: &E::Id) -> Result<Option<E>> {
        (**self).find_by_id(id).await
    }

    async fn update(&self, entity: E) -> Result<E> {
        (**self).update(entity).await
    }

    async fn delete(&self, id: &E::Id) -> Result<bool> {
        (**self).delete(id).await
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<E>> {
        (**self).list(query).await
    }
}
