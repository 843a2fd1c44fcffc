//! `warden-tenancy` — organization scoping for the user service.
//!
//! [`OrganizationPlugin`] decorates the user slot with [`TenantUserService`]:
//! users are created together with a membership in the caller's
//! organization, and reads and writes are limited to that organization's
//! members.

pub mod config;
pub mod decorator;
pub mod plugin;

pub use config::TenancyConfig;
pub use decorator::TenantUserService;
pub use plugin::OrganizationPlugin;
