//! HTTP application wiring (axum router + plugin runtime).
//!
//! - `services.rs`: plugin bootstrap over in-memory stores, background sweeps
//! - `routes/`: handlers, one file per area
//! - `dto.rs`: request/response bodies
//! - `errors.rs`: error to status mapping

use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{delete, get, post},
};
use tower::ServiceBuilder;

use warden_registry::Runtime;

use crate::{ApiConfig, middleware};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{build_runtime, build_runtime_with_clock, spawn_expiry_sweeper};

/// Build the full HTTP router over a bootstrapped runtime.
pub fn build_app(runtime: &Runtime, config: &ApiConfig) -> Router {
    let auth_state = middleware::AuthState {
        dispatcher: runtime.dispatcher.clone(),
    };

    let protected = Router::new()
        .route("/me", get(routes::users::me))
        .route("/users", get(routes::users::list))
        .route(
            "/users/:id",
            get(routes::users::get).delete(routes::users::delete),
        )
        .route("/organizations", post(routes::organizations::create))
        .route("/organizations/:id", get(routes::organizations::get))
        .route(
            "/organizations/:id/members",
            get(routes::organizations::members),
        )
        .route(
            "/organizations/:id/users",
            post(routes::organizations::create_member),
        )
        .route("/sessions/current", delete(routes::sessions::logout))
        .route("/sessions/revoke", post(routes::sessions::revoke))
        .route(
            "/api-keys",
            get(routes::api_keys::list).post(routes::api_keys::issue),
        )
        .route("/api-keys/:key_id", delete(routes::api_keys::revoke))
        .route(
            "/trusted-devices",
            get(routes::devices::list).post(routes::devices::trust),
        )
        .route(
            "/trusted-devices/:device_id",
            delete(routes::devices::forget),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            auth_state.clone(),
            middleware::require_auth,
        ));

    let mut public = Router::new()
        .route("/whoami", get(routes::system::whoami))
        .route("/signup", post(routes::sessions::signup));
    if config.dev_login {
        public = public.route("/dev/sessions", post(routes::sessions::dev_login));
    }
    let public = public.route_layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::optional_auth,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(public)
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(Extension(runtime.registry.clone()))
                .layer(Extension(Arc::new(config.clone()))),
        )
}
