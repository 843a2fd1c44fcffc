use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_auth::{ApiKey, Permission, Session};
use warden_core::{OrganizationId, SessionId, UserId};
use warden_hooks::HookWarning;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub display_name: String,
}

/// Body of `POST /organizations/:id/users`; the user joins with the default
/// role.
#[derive(Debug, Deserialize)]
pub struct CreateMemberRequest {
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DevLoginRequest {
    pub email: String,
    #[serde(default)]
    pub organization_id: Option<OrganizationId>,
}

#[derive(Debug, Deserialize)]
pub struct RevokeSessionRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrganizationRequest {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Deserialize)]
pub struct IssueApiKeyRequest {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub ttl_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TrustDeviceRequest {
    pub device_id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub ttl_seconds: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub email: Option<String>,
    pub status: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub organization_id: Option<OrganizationId>,
    pub expires_at: DateTime<Utc>,
    /// Returned once, at issuance.
    pub token: String,
}

impl SessionResponse {
    pub fn new(session: &Session, token: String) -> Self {
        Self {
            session_id: session.id,
            user_id: session.user_id,
            organization_id: session.organization_id,
            expires_at: session.expires_at,
            token,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub key_id: String,
    pub name: String,
    pub organization_id: Option<OrganizationId>,
    pub permissions: Vec<Permission>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(key: ApiKey) -> Self {
        Self {
            key_id: key.key_id,
            name: key.name,
            organization_id: key.organization_id,
            permissions: key.permissions,
            created_at: key.created_at,
            expires_at: key.expires_at,
            secret: None,
        }
    }
}

pub fn warnings(warnings: &[HookWarning]) -> Vec<String> {
    warnings.iter().map(ToString::to_string).collect()
}
