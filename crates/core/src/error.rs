//! Error model shared by every warden crate.
//!
//! Errors are values: each variant maps to a stable [`ErrorKind`] that
//! transports and metrics can match on without parsing messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across warden.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Machine-checkable error class.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthenticated,
    InvalidCredential,
    SessionNotFound,
    SessionExpired,
    UserNotFound,
    Forbidden,
    DuplicateStrategyId,
    DuplicatePluginId,
    SlotEmpty,
    RegistrySealed,
    OrganizationRequired,
    OrganizationInvalid,
    NotFound,
    Conflict,
    Validation,
    HookRejected,
    OrphanedResource,
    Cancelled,
    Storage,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::InvalidCredential => "invalid_credential",
            ErrorKind::SessionNotFound => "session_not_found",
            ErrorKind::SessionExpired => "session_expired",
            ErrorKind::UserNotFound => "user_not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::DuplicateStrategyId => "duplicate_strategy_id",
            ErrorKind::DuplicatePluginId => "duplicate_plugin_id",
            ErrorKind::SlotEmpty => "slot_empty",
            ErrorKind::RegistrySealed => "registry_sealed",
            ErrorKind::OrganizationRequired => "organization_required",
            ErrorKind::OrganizationInvalid => "organization_invalid",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation",
            ErrorKind::HookRejected => "hook_rejected",
            ErrorKind::OrphanedResource => "orphaned_resource",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Storage => "storage",
        }
    }

    /// Caller-facing failures (4xx class in HTTP terms).
    pub fn is_client_error(self) -> bool {
        !matches!(
            self,
            ErrorKind::OrphanedResource
                | ErrorKind::Storage
                | ErrorKind::SlotEmpty
                | ErrorKind::RegistrySealed
                | ErrorKind::DuplicateStrategyId
                | ErrorKind::DuplicatePluginId
        )
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Warden error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Dispatch exhausted every strategy. Intentionally carries no detail.
    #[error("unauthenticated")]
    Unauthenticated,

    /// A credential was recognized but malformed or wrong.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("session not found")]
    SessionNotFound,

    #[error("session expired")]
    SessionExpired,

    #[error("user not found")]
    UserNotFound,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("strategy id '{0}' is already registered")]
    DuplicateStrategyId(String),

    #[error("plugin id '{0}' is already registered")]
    DuplicatePluginId(String),

    /// A service slot was read before anything was provided for it.
    #[error("service slot '{0}' has no implementation")]
    SlotEmpty(&'static str),

    /// A bootstrap-only registry was mutated after serving started.
    #[error("{0} is sealed")]
    RegistrySealed(&'static str),

    #[error("organization required")]
    OrganizationRequired,

    #[error("organization '{0}' is invalid")]
    OrganizationInvalid(String),

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    /// A before-hook vetoed the operation.
    #[error("hook '{listener}' rejected {event}: {reason}")]
    HookRejected {
        event: &'static str,
        listener: String,
        reason: String,
    },

    /// Compensation failed after a partial commit; data is inconsistent.
    #[error("orphaned {resource} '{id}': compensation failed ({compensation}) after: {cause}")]
    OrphanedResource {
        resource: &'static str,
        id: String,
        compensation: String,
        cause: Box<Error>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Unauthenticated => ErrorKind::Unauthenticated,
            Error::InvalidCredential(_) => ErrorKind::InvalidCredential,
            Error::SessionNotFound => ErrorKind::SessionNotFound,
            Error::SessionExpired => ErrorKind::SessionExpired,
            Error::UserNotFound => ErrorKind::UserNotFound,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::DuplicateStrategyId(_) => ErrorKind::DuplicateStrategyId,
            Error::DuplicatePluginId(_) => ErrorKind::DuplicatePluginId,
            Error::SlotEmpty(_) => ErrorKind::SlotEmpty,
            Error::RegistrySealed(_) => ErrorKind::RegistrySealed,
            Error::OrganizationRequired => ErrorKind::OrganizationRequired,
            Error::OrganizationInvalid(_) => ErrorKind::OrganizationInvalid,
            Error::NotFound => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Validation(_) => ErrorKind::Validation,
            Error::HookRejected { .. } => ErrorKind::HookRejected,
            Error::OrphanedResource { .. } => ErrorKind::OrphanedResource,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn invalid_credential(msg: impl Into<String>) -> Self {
        Self::InvalidCredential(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
