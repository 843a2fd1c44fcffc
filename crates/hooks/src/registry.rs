//! Typed listener registry.
//!
//! Registration happens during bootstrap through a shared reference (plugins
//! receive `&HookRegistry`); after [`HookRegistry::seal`] the set of listeners
//! is fixed. Firing snapshots the listener list, so no lock is held while a
//! listener runs.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::warn;

use warden_core::{CallContext, Error, Result};
use warden_observability::{AuthMetrics, NoopMetrics};

use crate::{HookWarning, LifecycleEvent, Phase};

/// Listener for one lifecycle event type.
///
/// Use this for listeners that need to await other services; plain closures
/// go through [`HookRegistry::on`].
#[async_trait]
pub trait HookListener<E: LifecycleEvent>: Send + Sync {
    async fn call(&self, ctx: &CallContext, event: &E) -> Result<()>;
}

struct SyncListener<F>(F);

#[async_trait]
impl<E, F> HookListener<E> for SyncListener<F>
where
    E: LifecycleEvent,
    F: Fn(&CallContext, &E) -> Result<()> + Send + Sync,
{
    async fn call(&self, ctx: &CallContext, event: &E) -> Result<()> {
        (self.0)(ctx, event)
    }
}

struct Registered<E: LifecycleEvent> {
    name: String,
    listener: Arc<dyn HookListener<E>>,
}

impl<E: LifecycleEvent> Clone for Registered<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            listener: self.listener.clone(),
        }
    }
}

/// Listeners for one `(event type, phase)`, stored type-erased.
type Slot = Box<dyn Any + Send + Sync>;

pub struct HookRegistry {
    listeners: RwLock<HashMap<(TypeId, Phase), Slot>>,
    sealed: AtomicBool,
    metrics: Arc<dyn AuthMetrics>,
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(NoopMetrics))
    }

    pub fn with_metrics(metrics: Arc<dyn AuthMetrics>) -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            sealed: AtomicBool::new(false),
            metrics,
        }
    }

    /// Register a synchronous listener.
    pub fn on<E, F>(&self, phase: Phase, name: impl Into<String>, callback: F) -> Result<()>
    where
        E: LifecycleEvent,
        F: Fn(&CallContext, &E) -> Result<()> + Send + Sync + 'static,
    {
        self.listen::<E>(phase, name, Arc::new(SyncListener(callback)))
    }

    /// Register a listener that may await.
    pub fn listen<E: LifecycleEvent>(
        &self,
        phase: Phase,
        name: impl Into<String>,
        listener: Arc<dyn HookListener<E>>,
    ) -> Result<()> {
        if self.is_sealed() {
            return Err(Error::RegistrySealed("hook registry"));
        }

        let mut map = self
            .listeners
            .write()
            .map_err(|_| Error::storage("hook registry lock poisoned"))?;
        let slot = map
            .entry((TypeId::of::<E>(), phase))
            .or_insert_with(|| Box::new(Vec::<Registered<E>>::new()));

        match slot.downcast_mut::<Vec<Registered<E>>>() {
            Some(list) => {
                list.push(Registered {
                    name: name.into(),
                    listener,
                });
                Ok(())
            }
            None => Err(Error::storage("hook slot holds a foreign listener type")),
        }
    }

    /// Freeze the registry; later registrations fail with `RegistrySealed`.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Listener names for `E` in `phase`, in the order they run.
    pub fn listeners<E: LifecycleEvent>(&self, phase: Phase) -> Vec<String> {
        self.snapshot::<E>(phase)
            .into_iter()
            .map(|r| r.name)
            .collect()
    }

    fn snapshot<E: LifecycleEvent>(&self, phase: Phase) -> Vec<Registered<E>> {
        let map = match self.listeners.read() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.get(&(TypeId::of::<E>(), phase))
            .and_then(|slot| slot.downcast_ref::<Vec<Registered<E>>>())
            .cloned()
            .unwrap_or_default()
    }

    /// Run every listener for `E` in `phase`, in registration order.
    ///
    /// `Before`: the first failure stops the chain and is returned as
    /// [`Error::HookRejected`]; callers must propagate it before mutating.
    /// `After`: every listener runs; failures come back as warnings.
    pub async fn fire<E: LifecycleEvent>(
        &self,
        phase: Phase,
        ctx: &CallContext,
        event: &E,
    ) -> Result<Vec<HookWarning>> {
        let mut warnings = Vec::new();

        for registered in self.snapshot::<E>(phase) {
            let Err(error) = registered.listener.call(ctx, event).await else {
                continue;
            };

            match phase {
                Phase::Before => {
                    return Err(Error::HookRejected {
                        event: E::NAME,
                        listener: registered.name,
                        reason: error.to_string(),
                    });
                }
                Phase::After => {
                    warn!(
                        event = E::NAME,
                        listener = %registered.name,
                        error = %error,
                        "after-hook listener failed"
                    );
                    self.metrics.hook_warning(E::NAME, &registered.name);
                    warnings.push(HookWarning {
                        event: E::NAME,
                        listener: registered.name,
                        error,
                    });
                }
            }
        }

        Ok(warnings)
    }
}

impl core::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("sealed", &self.is_sealed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use warden_core::ErrorKind;
    use warden_observability::InMemoryMetrics;

    use super::*;

    struct Thing {
        name: String,
    }

    impl LifecycleEvent for Thing {
        const NAME: &'static str = "thing.changing";
    }

    struct Other;

    impl LifecycleEvent for Other {
        const NAME: &'static str = "other";
    }

    fn recorder(
        log: &Arc<Mutex<Vec<String>>>,
        tag: &'static str,
    ) -> impl Fn(&CallContext, &Thing) -> Result<()> + Send + Sync + 'static {
        let log = log.clone();
        move |_ctx: &CallContext, _event: &Thing| {
            log.lock().unwrap().push(tag.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn before_listeners_run_in_order_and_first_error_aborts() {
        let hooks = HookRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        hooks.on::<Thing, _>(Phase::Before, "first", recorder(&log, "first")).unwrap();
        hooks
            .on::<Thing, _>(Phase::Before, "veto", |_ctx, e: &Thing| {
                Err(Error::validation(format!("{} is reserved", e.name)))
            })
            .unwrap();
        hooks.on::<Thing, _>(Phase::Before, "never", recorder(&log, "never")).unwrap();

        let event = Thing {
            name: "root".to_string(),
        };
        let err = hooks
            .fire(Phase::Before, &CallContext::new(), &event)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::HookRejected);
        let Error::HookRejected {
            event,
            listener,
            reason,
        } = err
        else {
            unreachable!();
        };
        assert_eq!(event, "thing.changing");
        assert_eq!(listener, "veto");
        assert!(reason.contains("root is reserved"));
        assert_eq!(*log.lock().unwrap(), vec!["first".to_string()]);
    }

    #[tokio::test]
    async fn after_listener_failures_become_warnings_and_all_run() {
        let metrics = Arc::new(InMemoryMetrics::new());
        let hooks = HookRegistry::with_metrics(metrics.clone());
        let log = Arc::new(Mutex::new(Vec::new()));

        hooks
            .on::<Thing, _>(Phase::After, "broken", |_ctx, _e: &Thing| {
                Err(Error::storage("mail relay down"))
            })
            .unwrap();
        hooks.on::<Thing, _>(Phase::After, "audit", recorder(&log, "audit")).unwrap();

        let warnings = hooks
            .fire(
                Phase::After,
                &CallContext::new(),
                &Thing {
                    name: "x".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].listener, "broken");
        assert_eq!(warnings[0].error.kind(), ErrorKind::Storage);
        assert_eq!(*log.lock().unwrap(), vec!["audit".to_string()]);
        assert_eq!(metrics.get("hook_warning:thing.changing"), 1);
    }

    #[tokio::test]
    async fn listeners_are_scoped_by_event_type_and_phase() {
        let hooks = HookRegistry::new();
        hooks
            .on::<Other, _>(Phase::Before, "other", |_ctx, _e: &Other| {
                Err(Error::validation("no"))
            })
            .unwrap();

        let event = Thing {
            name: "x".to_string(),
        };
        assert!(hooks.fire(Phase::Before, &CallContext::new(), &event).await.is_ok());
        assert!(hooks.fire(Phase::After, &CallContext::new(), &Other).await.is_ok());
        assert_eq!(hooks.listeners::<Other>(Phase::Before), vec!["other".to_string()]);
        assert!(hooks.listeners::<Thing>(Phase::Before).is_empty());
    }

    #[tokio::test]
    async fn async_listeners_are_awaited_inline() {
        struct Counter(Mutex<usize>);

        #[async_trait]
        impl HookListener<Thing> for Counter {
            async fn call(&self, _ctx: &CallContext, _event: &Thing) -> Result<()> {
                tokio::task::yield_now().await;
                *self.0.lock().unwrap() += 1;
                Ok(())
            }
        }

        let hooks = HookRegistry::new();
        let counter = Arc::new(Counter(Mutex::new(0)));
        hooks.listen::<Thing>(Phase::After, "count", counter.clone()).unwrap();

        let event = Thing {
            name: "x".to_string(),
        };
        hooks.fire(Phase::After, &CallContext::new(), &event).await.unwrap();
        assert_eq!(*counter.0.lock().unwrap(), 1);
    }

    #[test]
    fn registration_after_seal_fails() {
        let hooks = HookRegistry::new();
        hooks.seal();
        let err = hooks
            .on::<Thing, _>(Phase::Before, "late", |_ctx, _e: &Thing| Ok(()))
            .unwrap_err();
        assert_eq!(err, Error::RegistrySealed("hook registry"));
    }
}
