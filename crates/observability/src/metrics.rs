//! Metric emission for the authentication pipeline.
//!
//! Components receive an `Arc<dyn AuthMetrics>` at construction time. The wire
//! format is the host's concern: `TracingMetrics` turns every call into a
//! structured event on the `warden::metrics` target, `InMemoryMetrics` keeps
//! counters for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Result of a compensating action run by a decorator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CompensationOutcome {
    /// The already-committed step was undone.
    RolledBack,
    /// Undo failed; a resource was left behind.
    Orphaned,
}

impl CompensationOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            CompensationOutcome::RolledBack => "rolled_back",
            CompensationOutcome::Orphaned => "orphaned",
        }
    }
}

/// Injected metrics sink.
///
/// Labels are plain strings so this crate stays independent of the domain
/// error types.
pub trait AuthMetrics: Send + Sync {
    /// A strategy extracted a credential but rejected it.
    fn strategy_failed(&self, strategy_id: &str, error_kind: &str);

    /// A request was resolved to an authenticated identity.
    fn resolved(&self, strategy_id: &str);

    /// No strategy authenticated the request.
    fn unresolved(&self, attempted: usize);

    /// A decorator ran a compensating action.
    fn compensation(&self, resource: &str, outcome: CompensationOutcome);

    /// A trust store sweep removed expired records.
    fn trust_expired(&self, store: &str, removed: usize);

    /// An after-hook listener failed (non-fatal).
    fn hook_warning(&self, event: &str, listener: &str);
}

impl<M> AuthMetrics for Arc<M>
where
    M: AuthMetrics + ?Sized,
{
    fn strategy_failed(&self, strategy_id: &str, error_kind: &str) {
        (**self).strategy_failed(strategy_id, error_kind)
    }

    fn resolved(&self, strategy_id: &str) {
        (**self).resolved(strategy_id)
    }

    fn unresolved(&self, attempted: usize) {
        (**self).unresolved(attempted)
    }

    fn compensation(&self, resource: &str, outcome: CompensationOutcome) {
        (**self).compensation(resource, outcome)
    }

    fn trust_expired(&self, store: &str, removed: usize) {
        (**self).trust_expired(store, removed)
    }

    fn hook_warning(&self, event: &str, listener: &str) {
        (**self).hook_warning(event, listener)
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl AuthMetrics for NoopMetrics {
    fn strategy_failed(&self, _strategy_id: &str, _error_kind: &str) {}
    fn resolved(&self, _strategy_id: &str) {}
    fn unresolved(&self, _attempted: usize) {}
    fn compensation(&self, _resource: &str, _outcome: CompensationOutcome) {}
    fn trust_expired(&self, _store: &str, _removed: usize) {}
    fn hook_warning(&self, _event: &str, _listener: &str) {}
}

/// Emits each metric as a structured tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetrics;

impl AuthMetrics for TracingMetrics {
    fn strategy_failed(&self, strategy_id: &str, error_kind: &str) {
        ::tracing::debug!(target: "warden::metrics", metric = "strategy_failed", strategy_id, error_kind);
    }

    fn resolved(&self, strategy_id: &str) {
        ::tracing::debug!(target: "warden::metrics", metric = "resolved", strategy_id);
    }

    fn unresolved(&self, attempted: usize) {
        ::tracing::debug!(target: "warden::metrics", metric = "unresolved", attempted);
    }

    fn compensation(&self, resource: &str, outcome: CompensationOutcome) {
        ::tracing::info!(
            target: "warden::metrics",
            metric = "compensation",
            resource,
            outcome = outcome.as_str()
        );
    }

    fn trust_expired(&self, store: &str, removed: usize) {
        ::tracing::info!(target: "warden::metrics", metric = "trust_expired", store, removed);
    }

    fn hook_warning(&self, event: &str, listener: &str) {
        ::tracing::warn!(target: "warden::metrics", metric = "hook_warning", event, listener);
    }
}

/// Counter-based sink for tests and local introspection.
///
/// Keys are `"<metric>:<label>"`, e.g. `"strategy_failed:bearer"`.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    counters: Mutex<HashMap<String, u64>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter (0 when never incremented).
    pub fn get(&self, key: &str) -> u64 {
        self.counters
            .lock()
            .map(|c| c.get(key).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn add(&self, key: String, by: u64) {
        if let Ok(mut counters) = self.counters.lock() {
            *counters.entry(key).or_insert(0) += by;
        }
    }
}

impl AuthMetrics for InMemoryMetrics {
    fn strategy_failed(&self, strategy_id: &str, _error_kind: &str) {
        self.add(format!("strategy_failed:{strategy_id}"), 1);
    }

    fn resolved(&self, strategy_id: &str) {
        self.add(format!("resolved:{strategy_id}"), 1);
    }

    fn unresolved(&self, _attempted: usize) {
        self.add("unresolved".to_string(), 1);
    }

    fn compensation(&self, resource: &str, outcome: CompensationOutcome) {
        self.add(format!("compensation:{resource}:{}", outcome.as_str()), 1);
    }

    fn trust_expired(&self, store: &str, removed: usize) {
        self.add(format!("trust_expired:{store}"), removed as u64);
    }

    fn hook_warning(&self, event: &str, _listener: &str) {
        self.add(format!("hook_warning:{event}"), 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_metrics_count_by_label() {
        let metrics = InMemoryMetrics::new();
        metrics.strategy_failed("bearer", "session_expired");
        metrics.strategy_failed("bearer", "session_not_found");
        metrics.resolved("cookie");
        metrics.trust_expired("trusted_device", 3);

        assert_eq!(metrics.get("strategy_failed:bearer"), 2);
        assert_eq!(metrics.get("resolved:cookie"), 1);
        assert_eq!(metrics.get("trust_expired:trusted_device"), 3);
        assert_eq!(metrics.get("resolved:bearer"), 0);
    }

    #[test]
    fn arc_forwarding_reaches_the_same_counters() {
        let metrics = Arc::new(InMemoryMetrics::new());
        let shared: Arc<dyn AuthMetrics> = metrics.clone();
        shared.compensation("user", CompensationOutcome::Orphaned);
        assert_eq!(metrics.get("compensation:user:orphaned"), 1);
    }
}
