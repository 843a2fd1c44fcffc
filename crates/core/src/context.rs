//! Per-call context passed through services and decorators.
//!
//! Carries the tenant scope, the acting subject, a request id for log
//! correlation and a cancellation token. It is cheap to clone; clones share
//! the same cancellation state.

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::id::{OrganizationId, UserId};

#[derive(Debug, Clone)]
pub struct CallContext {
    request_id: Uuid,
    organization_id: Option<OrganizationId>,
    actor_id: Option<UserId>,
    cancellation: CancellationToken,
}

impl CallContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::now_v7(),
            organization_id: None,
            actor_id: None,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_organization(mut self, organization_id: OrganizationId) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    pub fn with_actor(mut self, actor_id: UserId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }

    /// Tie this context to an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn organization_id(&self) -> Option<OrganizationId> {
        self.organization_id
    }

    pub fn actor_id(&self) -> Option<UserId> {
        self.actor_id
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Fail with [`Error::Cancelled`] if the caller gave up.
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Same scope, fresh cancellation token.
    ///
    /// Compensating actions run under a detached context: the caller cancelling
    /// must not leave an orphaned resource behind.
    pub fn detached(&self) -> Self {
        Self {
            cancellation: CancellationToken::new(),
            ..self.clone()
        }
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}
