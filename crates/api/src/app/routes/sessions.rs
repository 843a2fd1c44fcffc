use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::{HeaderValue, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::info;

use warden_auth::AuthContext;
use warden_core::{CallContext, Error, OrganizationId};
use warden_identity::{
    IssuedSession, NewUser, SessionScope, SessionSlot, UserSlot, ensure_owned_by,
};
use warden_registry::ServiceRegistry;

use crate::ApiConfig;
use crate::app::dto::{self, DevLoginRequest, RevokeSessionRequest, SessionResponse, SignupRequest};
use crate::app::errors::ApiError;

/// Create a user outside any organization and sign them in.
pub async fn signup(
    Extension(registry): Extension<ServiceRegistry>,
    Extension(config): Extension<Arc<ApiConfig>>,
    Extension(ctx): Extension<CallContext>,
    Json(body): Json<SignupRequest>,
) -> Result<Response, ApiError> {
    let ctx = scoped(&ctx, None);
    let users = registry.get::<UserSlot>()?;
    let sessions = registry.get::<SessionSlot>()?;

    let created = users
        .create(&ctx, NewUser::new(body.email, body.display_name))
        .await?;
    let user = &created.value;
    let issued = sessions
        .issue(&ctx, user.id, SessionScope::default())
        .await?;
    info!(user_id = %user.id, "user signed up");

    let body = json!({
        "user": user,
        "session": session_body(&issued),
        "warnings": dto::warnings(&created.warnings),
    });
    Ok(with_session_cookie(
        (StatusCode::CREATED, Json(body)).into_response(),
        &config,
        Some(&issued.token),
    ))
}

/// Sign in by email alone. Only mounted when dev login is enabled.
pub async fn dev_login(
    Extension(registry): Extension<ServiceRegistry>,
    Extension(config): Extension<Arc<ApiConfig>>,
    Extension(ctx): Extension<CallContext>,
    Json(body): Json<DevLoginRequest>,
) -> Result<Response, ApiError> {
    let ctx = scoped(&ctx, body.organization_id);
    let users = registry.get::<UserSlot>()?;
    let sessions = registry.get::<SessionSlot>()?;

    let user = users
        .find_by_email(&ctx, &body.email)
        .await?
        .ok_or(Error::UserNotFound)?;
    if !user.is_active() {
        return Err(Error::forbidden("user is suspended").into());
    }
    let issued = sessions
        .issue(&ctx, user.id, scope(body.organization_id))
        .await?;

    Ok(with_session_cookie(
        (StatusCode::CREATED, Json(session_body(&issued))).into_response(),
        &config,
        Some(&issued.token),
    ))
}

/// Revoke the session that authenticated this request.
pub async fn logout(
    Extension(registry): Extension<ServiceRegistry>,
    Extension(config): Extension<Arc<ApiConfig>>,
    Extension(auth): Extension<AuthContext>,
    Extension(ctx): Extension<CallContext>,
) -> Result<Response, ApiError> {
    let session_id = auth
        .session_id()
        .ok_or_else(|| Error::validation("request was not authenticated with a session"))?;
    registry
        .get::<SessionSlot>()?
        .revoke(&ctx, session_id)
        .await?;

    Ok(with_session_cookie(
        StatusCode::NO_CONTENT.into_response(),
        &config,
        None,
    ))
}

/// Revoke another of the caller's own sessions by token.
pub async fn revoke(
    Extension(registry): Extension<ServiceRegistry>,
    Extension(auth): Extension<AuthContext>,
    Extension(ctx): Extension<CallContext>,
    Json(body): Json<RevokeSessionRequest>,
) -> Result<StatusCode, ApiError> {
    let subject = auth.subject_id().ok_or(Error::Unauthenticated)?;
    let sessions = registry.get::<SessionSlot>()?;

    let token = SecretString::from(body.token);
    let session = ensure_owned_by(sessions.as_ref(), &ctx, &token, subject)
        .await
        .map_err(|err| match err {
            Error::SessionNotFound => Error::NotFound,
            other => other,
        })?;
    sessions.revoke(&ctx, session.id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// A fresh context for anonymous flows: same request id, chosen organization.
fn scoped(ctx: &CallContext, organization_id: Option<OrganizationId>) -> CallContext {
    let fresh = CallContext::new().with_request_id(ctx.request_id());
    match organization_id {
        Some(organization_id) => fresh.with_organization(organization_id),
        None => fresh,
    }
}

fn scope(organization_id: Option<OrganizationId>) -> SessionScope {
    SessionScope {
        organization_id,
        ..SessionScope::default()
    }
}

pub(crate) fn session_body(issued: &IssuedSession) -> SessionResponse {
    SessionResponse::new(&issued.session, issued.token.expose_secret().to_string())
}

/// Set (or, with `None`, clear) the session cookie when cookies are enabled.
pub(crate) fn with_session_cookie(
    mut response: Response,
    config: &ApiConfig,
    token: Option<&SecretString>,
) -> Response {
    let Some(cookie) = &config.cookie else {
        return response;
    };

    let value = match token {
        Some(token) => format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            cookie.name,
            token.expose_secret(),
            config.sessions.ttl().num_seconds()
        ),
        None => format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", cookie.name),
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        response.headers_mut().insert(SET_COOKIE, value);
    }
    response
}
