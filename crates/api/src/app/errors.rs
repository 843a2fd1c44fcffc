use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use warden_core::{Error, ErrorKind};

/// Handler error; renders a [`warden_core::Error`] as a JSON body.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(kind);

        if kind.is_client_error() {
            json_error(status, kind.as_str(), self.0.to_string())
        } else {
            error!(error = %self.0, kind = kind.as_str(), "request failed");
            json_error(status, kind.as_str(), "internal error")
        }
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthenticated
        | ErrorKind::InvalidCredential
        | ErrorKind::SessionNotFound
        | ErrorKind::SessionExpired => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::UserNotFound | ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Validation
        | ErrorKind::OrganizationRequired
        | ErrorKind::OrganizationInvalid => StatusCode::BAD_REQUEST,
        ErrorKind::HookRejected => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Cancelled => StatusCode::REQUEST_TIMEOUT,
        ErrorKind::OrphanedResource
        | ErrorKind::Storage
        | ErrorKind::SlotEmpty
        | ErrorKind::RegistrySealed
        | ErrorKind::DuplicateStrategyId
        | ErrorKind::DuplicatePluginId => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_errors_are_unauthorized() {
        for err in [
            Error::Unauthenticated,
            Error::SessionExpired,
            Error::SessionNotFound,
            Error::invalid_credential("bad"),
        ] {
            assert_eq!(status_for(err.kind()), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn server_errors_hide_their_message() {
        let response = ApiError(Error::storage("connection refused")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = ApiError(Error::OrganizationRequired).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
