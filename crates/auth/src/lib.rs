//! `warden-auth` — credential resolution and authorization checks.
//!
//! This crate is decoupled from HTTP and storage: requests are read through
//! [`RequestAccessor`], sessions and API keys through lookup traits that the
//! identity services implement.

pub mod api_key;
pub mod authorize;
pub mod context;
pub mod credential;
pub mod dispatcher;
pub mod permissions;
pub mod request;
pub mod roles;
pub mod session;
pub mod strategies;
pub mod strategy;

pub use api_key::{ApiKey, ApiKeyLookup, parse_api_key};
pub use authorize::{authorize_in_organization, require_permission, require_role};
pub use context::{AuthContext, AuthContextBuilder, AuthMethod};
pub use credential::Credential;
pub use dispatcher::{AuthRequirement, Resolution, StrategyDispatcher, StrategyFailure};
pub use permissions::Permission;
pub use request::{RequestAccessor, SimpleRequest};
pub use roles::Role;
pub use session::{Session, SessionAuthenticator, SessionLookup, Subject, SubjectLookup};
pub use strategies::{
    ApiKeyConfig, ApiKeyStrategy, BearerConfig, BearerStrategy, CookieConfig, CookieStrategy,
};
pub use strategy::AuthStrategy;
