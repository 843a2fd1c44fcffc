//! Entity trait: identity + continuity across state changes.

use std::borrow::Cow;

/// Entity marker + minimal interface.
///
/// The optional hooks let storage adapters without a query language (the
/// in-memory repository) filter records and enforce unique constraints.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display + Send + Sync;

    /// Stable resource name used in logs and errors (e.g. `"user"`).
    const RESOURCE: &'static str;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Value of a filterable field, if the entity exposes it.
    fn field(&self, _name: &str) -> Option<Cow<'_, str>> {
        None
    }

    /// Unique constraints as `(constraint name, value)` pairs.
    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}
