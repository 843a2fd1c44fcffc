//! `warden-hooks` — lifecycle hooks around core state transitions.
//!
//! Extensions observe or veto core operations without the core depending on
//! them. Each lifecycle point is its own Rust type implementing
//! [`LifecycleEvent`]; listeners are registered per type and phase.

pub mod committed;
pub mod event;
pub mod registry;

pub use committed::{Committed, HookWarning};
pub use event::{LifecycleEvent, Phase};
pub use registry::{HookListener, HookRegistry};
