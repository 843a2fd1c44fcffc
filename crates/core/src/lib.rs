//! `warden-core` — foundation building blocks shared by every warden crate.
//!
//! Identifiers, the error taxonomy, the per-call context, time and the
//! persistence interface. No infrastructure concerns.

pub mod clock;
pub mod context;
pub mod entity;
pub mod error;
pub mod id;
pub mod repository;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::CallContext;
pub use entity::Entity;
pub use error::{Error, ErrorKind, Result};
pub use id::{AppId, EnvironmentId, MembershipId, OrganizationId, SessionId, UserId};
pub use repository::{ListQuery, Page, Pagination, Repository};
