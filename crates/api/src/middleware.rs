use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::debug;
use uuid::Uuid;

use warden_auth::{AuthContext, AuthRequirement, StrategyDispatcher};
use warden_core::CallContext;

use crate::app::errors::ApiError;
use crate::request::HeaderAccessor;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct AuthState {
    pub dispatcher: Arc<StrategyDispatcher>,
}

/// Rejects the request with 401 unless a strategy authenticates it.
///
/// On success the handler sees an [`AuthContext`] and a [`CallContext`]
/// scoped to it as request extensions. The context's cancellation token
/// fires if the request is dropped mid-flight.
pub async fn require_auth(
    State(state): State<AuthState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    authenticate(&state, req, next, AuthRequirement::Required).await
}

/// Like [`require_auth`], but falls back to the anonymous context.
pub async fn optional_auth(
    State(state): State<AuthState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    authenticate(&state, req, next, AuthRequirement::Optional).await
}

async fn authenticate(
    state: &AuthState,
    mut req: Request<Body>,
    next: Next,
    requirement: AuthRequirement,
) -> Result<Response, ApiError> {
    let base = base_context(req.headers());
    let resolution = state
        .dispatcher
        .resolve(&base, &HeaderAccessor::new(req.headers()))
        .await;
    if !resolution.failures().is_empty() {
        debug!(
            request_id = %base.request_id(),
            failures = resolution.failures().len(),
            authenticated = resolution.is_authenticated(),
            "credentials rejected"
        );
    }

    let auth = resolution.into_requirement(requirement)?;
    let ctx = scoped_context(&auth, base.request_id());
    // Cancelled if the request future is dropped before a response exists.
    let cancel_on_drop = ctx.cancellation().clone().drop_guard();
    req.extensions_mut().insert(auth);
    req.extensions_mut().insert(ctx);

    let response = next.run(req).await;
    cancel_on_drop.disarm();
    Ok(response)
}

/// Honors a caller-supplied `x-request-id` when it is a UUID.
fn base_context(headers: &HeaderMap) -> CallContext {
    let ctx = CallContext::new();
    match headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
    {
        Some(request_id) => ctx.with_request_id(request_id),
        None => ctx,
    }
}

fn scoped_context(auth: &AuthContext, request_id: Uuid) -> CallContext {
    auth.call_context().with_request_id(request_id)
}
