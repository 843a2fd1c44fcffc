use std::sync::Arc;

use arc_swap::ArcSwap;

use warden_core::Result;

use crate::{ServiceRegistry, ServiceSlot};

/// Hot-swappable registry handle.
///
/// Readers take a snapshot per request; a reload builds a new registry and
/// swaps it in atomically. In-flight requests keep their snapshot.
pub struct SharedRegistry {
    current: ArcSwap<ServiceRegistry>,
}

impl SharedRegistry {
    pub fn new(registry: ServiceRegistry) -> Self {
        Self {
            current: ArcSwap::from_pointee(registry),
        }
    }

    pub fn snapshot(&self) -> Arc<ServiceRegistry> {
        self.current.load_full()
    }

    /// Install `next`, returning the previous registry.
    pub fn swap(&self, next: ServiceRegistry) -> Arc<ServiceRegistry> {
        self.current.swap(Arc::new(next))
    }

    pub fn get<S: ServiceSlot>(&self) -> Result<Arc<S::Service>> {
        self.current.load().get::<S>()
    }
}

impl core::fmt::Debug for SharedRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("SharedRegistry")
            .field(&*self.current.load())
            .finish()
    }
}
