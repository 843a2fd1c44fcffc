use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use warden_core::{Error, Result};

use crate::ServiceSlot;

struct Entry {
    name: &'static str,
    /// `Arc<S::Service>` behind `Any`.
    service: Box<dyn Any + Send + Sync>,
    /// Decorator names, innermost first.
    layers: Vec<String>,
}

impl Entry {
    fn service<S: ServiceSlot>(&self) -> Result<Arc<S::Service>> {
        self.service
            .downcast_ref::<Arc<S::Service>>()
            .cloned()
            .ok_or(Error::SlotEmpty(S::NAME))
    }
}

/// Mutable registry used while plugins initialize.
#[derive(Default)]
pub struct RegistryBuilder {
    entries: HashMap<TypeId, Entry>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the base implementation. Fails if the slot is already filled.
    pub fn provide<S: ServiceSlot>(&mut self, service: Arc<S::Service>) -> Result<()> {
        if self.entries.contains_key(&TypeId::of::<S>()) {
            return Err(Error::conflict(format!(
                "service slot '{}' already provided",
                S::NAME
            )));
        }

        debug!(slot = S::NAME, "service provided");
        self.entries.insert(
            TypeId::of::<S>(),
            Entry {
                name: S::NAME,
                service: Box::new(service),
                layers: Vec::new(),
            },
        );
        Ok(())
    }

    /// Swap the implementation wholesale, dropping decorators applied so far.
    pub fn replace<S: ServiceSlot>(&mut self, service: Arc<S::Service>) -> Result<()> {
        let entry = self
            .entries
            .get_mut(&TypeId::of::<S>())
            .ok_or(Error::SlotEmpty(S::NAME))?;

        if !entry.layers.is_empty() {
            warn!(
                slot = S::NAME,
                dropped = ?entry.layers,
                "replacing a decorated service drops its decorators"
            );
        }
        entry.service = Box::new(service);
        entry.layers.clear();
        Ok(())
    }

    /// Wrap the current implementation.
    ///
    /// `wrap` receives the current service and returns the new one. The last
    /// decorator registered is the outermost layer.
    pub fn decorate<S, F>(&mut self, name: impl Into<String>, wrap: F) -> Result<()>
    where
        S: ServiceSlot,
        F: FnOnce(Arc<S::Service>) -> Arc<S::Service>,
    {
        let entry = self
            .entries
            .get_mut(&TypeId::of::<S>())
            .ok_or(Error::SlotEmpty(S::NAME))?;

        let name = name.into();
        let inner = entry.service::<S>()?;
        entry.service = Box::new(wrap(inner));
        debug!(slot = S::NAME, decorator = %name, "service decorated");
        entry.layers.push(name);
        Ok(())
    }

    /// Current implementation, for wiring during bootstrap.
    pub fn get<S: ServiceSlot>(&self) -> Result<Arc<S::Service>> {
        self.entries
            .get(&TypeId::of::<S>())
            .ok_or(Error::SlotEmpty(S::NAME))?
            .service::<S>()
    }

    pub fn contains<S: ServiceSlot>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<S>())
    }

    pub fn seal(self) -> ServiceRegistry {
        ServiceRegistry {
            entries: Arc::new(self.entries),
        }
    }
}

/// Frozen registry. Cheap to clone; read-only.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    entries: Arc<HashMap<TypeId, Entry>>,
}

impl ServiceRegistry {
    pub fn get<S: ServiceSlot>(&self) -> Result<Arc<S::Service>> {
        self.entries
            .get(&TypeId::of::<S>())
            .ok_or(Error::SlotEmpty(S::NAME))?
            .service::<S>()
    }

    /// Decorator names for a slot, innermost first.
    pub fn decorators<S: ServiceSlot>(&self) -> &[String] {
        self.entries
            .get(&TypeId::of::<S>())
            .map(|e| e.layers.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_decorated_by<S: ServiceSlot>(&self, name: &str) -> bool {
        self.decorators::<S>().iter().any(|l| l == name)
    }

    /// Names of every filled slot, sorted.
    pub fn slots(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.entries.values().map(|e| e.name).collect();
        names.sort_unstable();
        names
    }
}

impl core::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("slots", &self.slots())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use warden_core::ErrorKind;

    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self, log: &Mutex<Vec<String>>) -> String;
    }

    struct Base;

    impl Greeter for Base {
        fn greet(&self, log: &Mutex<Vec<String>>) -> String {
            log.lock().unwrap().push("base".to_string());
            "hello".to_string()
        }
    }

    struct Layer {
        tag: &'static str,
        next: Arc<dyn Greeter>,
    }

    impl Greeter for Layer {
        fn greet(&self, log: &Mutex<Vec<String>>) -> String {
            log.lock().unwrap().push(format!("{}:pre", self.tag));
            let out = format!("{}({})", self.tag, self.next.greet(log));
            log.lock().unwrap().push(format!("{}:post", self.tag));
            out
        }
    }

    struct GreeterSlot;

    impl ServiceSlot for GreeterSlot {
        type Service = dyn Greeter;
        const NAME: &'static str = "greeter";
    }

    fn layer(tag: &'static str) -> impl FnOnce(Arc<dyn Greeter>) -> Arc<dyn Greeter> {
        move |next: Arc<dyn Greeter>| -> Arc<dyn Greeter> { Arc::new(Layer { tag, next }) }
    }

    #[test]
    fn decorators_form_an_onion_last_registered_outermost() {
        let mut builder = RegistryBuilder::new();
        builder.provide::<GreeterSlot>(Arc::new(Base)).unwrap();
        builder.decorate::<GreeterSlot, _>("d1", layer("d1")).unwrap();
        builder.decorate::<GreeterSlot, _>("d2", layer("d2")).unwrap();
        let registry = builder.seal();

        let log = Mutex::new(Vec::new());
        let out = registry.get::<GreeterSlot>().unwrap().greet(&log);

        assert_eq!(out, "d2(d1(hello))");
        assert_eq!(
            *log.lock().unwrap(),
            vec!["d2:pre", "d1:pre", "base", "d1:post", "d2:post"]
        );
        assert_eq!(registry.decorators::<GreeterSlot>(), ["d1", "d2"]);
        assert!(registry.is_decorated_by::<GreeterSlot>("d1"));
        assert!(!registry.is_decorated_by::<GreeterSlot>("tenancy"));
    }

    #[test]
    fn empty_slot_errors() {
        let mut builder = RegistryBuilder::new();
        let err = builder
            .decorate::<GreeterSlot, _>("d1", layer("d1"))
            .unwrap_err();
        assert_eq!(err, Error::SlotEmpty("greeter"));
        assert!(matches!(
            builder.seal().get::<GreeterSlot>().map_err(|e| e.kind()),
            Err(ErrorKind::SlotEmpty)
        ));
    }

    #[test]
    fn provide_twice_conflicts_and_replace_resets_layers() {
        let mut builder = RegistryBuilder::new();
        builder.provide::<GreeterSlot>(Arc::new(Base)).unwrap();
        assert_eq!(
            builder
                .provide::<GreeterSlot>(Arc::new(Base))
                .unwrap_err()
                .kind(),
            ErrorKind::Conflict
        );

        builder.decorate::<GreeterSlot, _>("d1", layer("d1")).unwrap();
        builder.replace::<GreeterSlot>(Arc::new(Base)).unwrap();
        let registry = builder.seal();

        assert!(registry.decorators::<GreeterSlot>().is_empty());
        let log = Mutex::new(Vec::new());
        assert_eq!(registry.get::<GreeterSlot>().unwrap().greet(&log), "hello");
    }

    #[test]
    fn sealed_registry_is_shared_across_threads() {
        let mut builder = RegistryBuilder::new();
        builder.provide::<GreeterSlot>(Arc::new(Base)).unwrap();
        let registry = builder.seal();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let log = Mutex::new(Vec::new());
                    registry.get::<GreeterSlot>().unwrap().greet(&log)
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), "hello");
        }
        assert_eq!(registry.slots(), vec!["greeter"]);
    }
}
