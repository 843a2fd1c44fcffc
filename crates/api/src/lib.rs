//! HTTP adapter: axum middleware resolving identity through the strategy
//! dispatcher, error mapping, and a small demo application.

pub mod app;
pub mod config;
pub mod middleware;
pub mod request;

pub use app::build_app;
pub use config::ApiConfig;
pub use middleware::{AuthState, optional_auth, require_auth};
pub use request::HeaderAccessor;
