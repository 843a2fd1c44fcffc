use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};
use secrecy::ExposeSecret;

use warden_auth::{AuthContext, require_permission};
use warden_core::{CallContext, Error};
use warden_identity::{ApiKeySlot, NewApiKey};
use warden_registry::ServiceRegistry;

use crate::app::dto::{ApiKeyResponse, IssueApiKeyRequest};
use crate::app::errors::ApiError;

/// Issue a key for the caller, scoped like the calling credential.
///
/// A key can only carry permissions the caller already holds.
pub async fn issue(
    Extension(registry): Extension<ServiceRegistry>,
    Extension(auth): Extension<AuthContext>,
    Extension(ctx): Extension<CallContext>,
    Json(body): Json<IssueApiKeyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let subject = auth.subject_id().ok_or(Error::Unauthenticated)?;
    for permission in &body.permissions {
        require_permission(&auth, permission)?;
    }

    let issued = registry
        .get::<ApiKeySlot>()?
        .issue(
            &ctx,
            NewApiKey {
                app_id: auth.app_id(),
                organization_id: auth.organization_id(),
                environment_id: auth.environment_id(),
                permissions: body.permissions,
                ttl_seconds: body.ttl_seconds,
                ..NewApiKey::new(body.name, subject)
            },
        )
        .await?;

    let secret = issued.secret.expose_secret().to_string();
    let response = ApiKeyResponse {
        secret: Some(secret),
        ..ApiKeyResponse::from(issued.key)
    };
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn list(
    Extension(registry): Extension<ServiceRegistry>,
    Extension(auth): Extension<AuthContext>,
    Extension(ctx): Extension<CallContext>,
) -> Result<impl IntoResponse, ApiError> {
    let subject = auth.subject_id().ok_or(Error::Unauthenticated)?;
    let keys = registry
        .get::<ApiKeySlot>()?
        .list_for_user(&ctx, subject)
        .await?;
    Ok(Json(
        keys.into_iter()
            .map(ApiKeyResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// Revoke one of the caller's keys. Other users' keys read as missing.
pub async fn revoke(
    Extension(registry): Extension<ServiceRegistry>,
    Extension(auth): Extension<AuthContext>,
    Extension(ctx): Extension<CallContext>,
    Path(key_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let subject = auth.subject_id().ok_or(Error::Unauthenticated)?;
    let keys = registry.get::<ApiKeySlot>()?;

    keys.find(&ctx, &key_id)
        .await?
        .filter(|key| key.user_id == subject)
        .ok_or(Error::NotFound)?;
    keys.revoke(&ctx, &key_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
