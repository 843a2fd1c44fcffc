//! `warden-registry` — service slots, decorators and plugin bootstrap.
//!
//! Bootstrap is single-threaded: plugins get `&mut RegistryBuilder` and
//! `&mut StrategyDispatcher`. [`RegistryBuilder::seal`] freezes the result into
//! a read-only [`ServiceRegistry`] shared by every request.

pub mod builder;
pub mod plugin;
pub mod shared;
pub mod slot;

pub use builder::{RegistryBuilder, ServiceRegistry};
pub use plugin::{Plugin, PluginHost, Runtime};
pub use shared::SharedRegistry;
pub use slot::ServiceSlot;
