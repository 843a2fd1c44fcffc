use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use serde_json::json;

use warden_auth::AuthContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(auth): Extension<AuthContext>) -> impl IntoResponse {
    Json(json!({
        "authenticated": auth.is_authenticated(),
        "subject_id": auth.subject_id(),
        "method": auth.method().map(|m| m.as_str()),
        "session_id": auth.session_id(),
        "organization_id": auth.organization_id(),
        "roles": auth.roles(),
        "permissions": auth.permissions(),
    }))
}
