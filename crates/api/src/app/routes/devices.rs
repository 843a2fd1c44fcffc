use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Duration;
use tracing::info;

use warden_auth::AuthContext;
use warden_core::Error;
use warden_identity::TrustedDeviceSlot;
use warden_registry::ServiceRegistry;
use warden_trust::DeviceInfo;

use crate::app::dto::TrustDeviceRequest;
use crate::app::errors::ApiError;

/// Remember a device for the caller. Marking a known device renews it.
///
/// A missing or out-of-policy `ttl_seconds` gets the default window.
pub async fn trust(
    Extension(registry): Extension<ServiceRegistry>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<TrustDeviceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let subject = auth.subject_id().ok_or(Error::Unauthenticated)?;
    let device_id = body.device_id.trim();
    if device_id.is_empty() {
        return Err(Error::validation("device_id cannot be empty").into());
    }

    let record = registry
        .get::<TrustedDeviceSlot>()?
        .trust(
            subject,
            device_id,
            body.ttl_seconds.and_then(Duration::try_seconds),
            DeviceInfo {
                label: body.label,
                user_agent: body.user_agent,
                ip_address: None,
            },
        )
        .await?;
    info!(user_id = %subject, device_id, expires_at = %record.expires_at, "device trusted");

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list(
    Extension(registry): Extension<ServiceRegistry>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, ApiError> {
    let subject = auth.subject_id().ok_or(Error::Unauthenticated)?;
    let devices = registry.get::<TrustedDeviceSlot>()?.list(subject).await?;
    Ok(Json(devices))
}

/// Idempotent; forgetting an unknown device is still 204.
pub async fn forget(
    Extension(registry): Extension<ServiceRegistry>,
    Extension(auth): Extension<AuthContext>,
    Path(device_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let subject = auth.subject_id().ok_or(Error::Unauthenticated)?;
    registry
        .get::<TrustedDeviceSlot>()?
        .revoke(subject, &device_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
