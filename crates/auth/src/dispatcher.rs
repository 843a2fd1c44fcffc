//! Priority-ordered credential resolution.
//!
//! Strategies are tried in ascending priority. The first one that both
//! extracts a credential and authenticates it wins; later strategies never
//! run. A strategy that extracts but fails to authenticate is recorded and
//! skipped.

use std::sync::Arc;

use tracing::{debug, warn};

use warden_core::{CallContext, Error, Result};
use warden_observability::{AuthMetrics, NoopMetrics};

use crate::{AuthContext, AuthStrategy, RequestAccessor};

/// A strategy that claimed the request but could not authenticate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyFailure {
    pub strategy_id: String,
    pub error: Error,
}

/// Whether a route accepts anonymous callers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum AuthRequirement {
    #[default]
    Required,
    Optional,
}

/// Outcome of [`StrategyDispatcher::resolve`].
#[derive(Debug, Clone)]
pub struct Resolution {
    context: AuthContext,
    failures: Vec<StrategyFailure>,
}

impl Resolution {
    pub fn context(&self) -> &AuthContext {
        &self.context
    }

    pub fn is_authenticated(&self) -> bool {
        self.context.is_authenticated()
    }

    /// Every strategy that extracted a credential and rejected it, in the
    /// order they ran.
    pub fn failures(&self) -> &[StrategyFailure] {
        &self.failures
    }

    /// Number of strategies that extracted a credential.
    pub fn attempted(&self) -> usize {
        self.failures.len() + usize::from(self.context.is_authenticated())
    }

    /// The authenticated context, or a single generic `Unauthenticated`.
    ///
    /// Individual strategy failures are deliberately not surfaced to the
    /// caller.
    pub fn require(self) -> Result<AuthContext> {
        if self.context.is_authenticated() {
            Ok(self.context)
        } else {
            Err(Error::Unauthenticated)
        }
    }

    /// The context, anonymous if nothing authenticated.
    pub fn optional(self) -> AuthContext {
        self.context
    }

    pub fn into_requirement(self, requirement: AuthRequirement) -> Result<AuthContext> {
        match requirement {
            AuthRequirement::Required => self.require(),
            AuthRequirement::Optional => Ok(self.optional()),
        }
    }
}

struct Entry {
    priority: i32,
    strategy: Arc<dyn AuthStrategy>,
}

/// Ordered set of authentication strategies.
///
/// Built mutably during bootstrap, then shared behind an `Arc`.
pub struct StrategyDispatcher {
    entries: Vec<Entry>,
    metrics: Arc<dyn AuthMetrics>,
}

impl Default for StrategyDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyDispatcher {
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(NoopMetrics))
    }

    pub fn with_metrics(metrics: Arc<dyn AuthMetrics>) -> Self {
        Self {
            entries: Vec::new(),
            metrics,
        }
    }

    /// Register a strategy.
    ///
    /// Inserted after every strategy with a lower or equal priority, so equal
    /// priorities keep registration order.
    pub fn register(&mut self, strategy: Arc<dyn AuthStrategy>) -> Result<()> {
        let id = strategy.id().to_string();
        if self.entries.iter().any(|e| e.strategy.id() == id) {
            return Err(Error::DuplicateStrategyId(id));
        }

        let priority = strategy.priority();
        if let Some(existing) = self.entries.iter().find(|e| e.priority == priority) {
            warn!(
                priority,
                existing = existing.strategy.id(),
                registered = %id,
                "strategies share a priority; registration order decides"
            );
        }

        let pos = self
            .entries
            .iter()
            .position(|e| e.priority > priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, Entry { priority, strategy });

        Ok(())
    }

    /// Strategy ids in the order they are tried.
    pub fn strategy_ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.strategy.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve the caller behind `request`.
    ///
    /// Cancellation is checked before each `authenticate`; a cancelled call
    /// ends resolution with whatever failures were collected so far.
    pub async fn resolve(&self, ctx: &CallContext, request: &dyn RequestAccessor) -> Resolution {
        let mut failures: Vec<StrategyFailure> = Vec::new();

        for entry in &self.entries {
            let strategy = &entry.strategy;
            let Some(credential) = strategy.extract(request) else {
                continue;
            };

            if !failures.is_empty() {
                debug!(
                    strategy_id = strategy.id(),
                    previous = failures.len(),
                    "request carries credentials for several strategies"
                );
            }

            if ctx.is_cancelled() {
                failures.push(StrategyFailure {
                    strategy_id: strategy.id().to_string(),
                    error: Error::Cancelled,
                });
                break;
            }

            let fingerprint = credential.fingerprint();
            let outcome = match strategy.authenticate(ctx, credential).await {
                Ok(auth) if auth.is_authenticated() => Ok(auth),
                Ok(_) => Err(Error::invalid_credential(
                    "strategy returned an unauthenticated context",
                )),
                Err(err) => Err(err),
            };

            match outcome {
                Ok(auth) => {
                    self.metrics.resolved(strategy.id());
                    return Resolution {
                        context: auth,
                        failures,
                    };
                }
                Err(error) => {
                    debug!(
                        strategy_id = strategy.id(),
                        credential = %fingerprint,
                        error_kind = %error.kind(),
                        "strategy rejected credential"
                    );
                    self.metrics
                        .strategy_failed(strategy.id(), error.kind().as_str());
                    failures.push(StrategyFailure {
                        strategy_id: strategy.id().to_string(),
                        error,
                    });
                }
            }
        }

        self.metrics.unresolved(failures.len());
        Resolution {
            context: AuthContext::anonymous(),
            failures,
        }
    }
}

impl core::fmt::Debug for StrategyDispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StrategyDispatcher")
            .field("strategies", &self.strategy_ids())
            .finish()
    }
}
