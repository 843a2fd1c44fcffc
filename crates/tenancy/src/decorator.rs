//! Organization scoping for the user service.
//!
//! Creating a user inside an organization is two writes: the user, then the
//! membership. When the second fails, or the call is dropped between the
//! two, the first is undone.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use warden_core::{CallContext, Entity, Error, ListQuery, OrganizationId, Page, Result, UserId};
use warden_hooks::Committed;
use warden_identity::{
    MembershipService, NewUser, OrganizationService, User, UserPatch, UserService,
};
use warden_observability::{AuthMetrics, CompensationOutcome, NoopMetrics};

use crate::TenancyConfig;

pub struct TenantUserService {
    inner: Arc<dyn UserService>,
    organizations: Arc<dyn OrganizationService>,
    memberships: Arc<dyn MembershipService>,
    config: TenancyConfig,
    metrics: Arc<dyn AuthMetrics>,
}

impl TenantUserService {
    pub fn new(
        inner: Arc<dyn UserService>,
        organizations: Arc<dyn OrganizationService>,
        memberships: Arc<dyn MembershipService>,
        config: TenancyConfig,
    ) -> Self {
        Self {
            inner,
            organizations,
            memberships,
            config,
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn AuthMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// The organization to scope to, `None` to pass through.
    fn scope(&self, ctx: &CallContext) -> Result<Option<OrganizationId>> {
        match ctx.organization_id() {
            Some(org) => Ok(Some(org)),
            None if self.config.require_organization => Err(Error::OrganizationRequired),
            None => Ok(None),
        }
    }

    async fn ensure_member(
        &self,
        ctx: &CallContext,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<()> {
        match self.memberships.find(ctx, organization_id, user_id).await? {
            Some(_) => Ok(()),
            None => Err(Error::NotFound),
        }
    }
}

/// Rolls back a committed user whose membership step never settled.
///
/// Armed once the user row exists. If the create future is dropped while
/// armed (client disconnect, timeout, `select!`), the rollback is spawned on
/// the current runtime instead of being lost with the future.
struct PendingRollback {
    inner: Arc<dyn UserService>,
    memberships: Arc<dyn MembershipService>,
    metrics: Arc<dyn AuthMetrics>,
    ctx: CallContext,
    organization_id: OrganizationId,
    user_id: UserId,
    armed: bool,
}

impl PendingRollback {
    fn arm(
        service: &TenantUserService,
        ctx: &CallContext,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Self {
        Self {
            inner: service.inner.clone(),
            memberships: service.memberships.clone(),
            metrics: service.metrics.clone(),
            ctx: ctx.detached(),
            organization_id,
            user_id,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }

    /// Undo the create now and return the error to surface.
    async fn run(self, cause: Error) -> Error {
        let err = roll_back(
            self.inner.as_ref(),
            self.memberships.as_ref(),
            self.metrics.as_ref(),
            &self.ctx,
            self.organization_id,
            self.user_id,
            cause,
        )
        .await;
        self.disarm();
        err
    }
}

impl Drop for PendingRollback {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let user_id = self.user_id;
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            error!(%user_id, "user creation abandoned outside a runtime; user is orphaned");
            self.metrics
                .compensation(User::RESOURCE, CompensationOutcome::Orphaned);
            return;
        };

        warn!(
            %user_id,
            request_id = %self.ctx.request_id(),
            "user creation abandoned; rolling back"
        );
        let inner = self.inner.clone();
        let memberships = self.memberships.clone();
        let metrics = self.metrics.clone();
        let ctx = self.ctx.clone();
        let organization_id = self.organization_id;
        handle.spawn(async move {
            roll_back(
                inner.as_ref(),
                memberships.as_ref(),
                metrics.as_ref(),
                &ctx,
                organization_id,
                user_id,
                Error::Cancelled,
            )
            .await;
        });
    }
}

/// Undo a user create after a later step failed.
///
/// `ctx` must already be detached. A user that is already gone counts as
/// rolled back.
async fn roll_back(
    users: &dyn UserService,
    memberships: &dyn MembershipService,
    metrics: &dyn AuthMetrics,
    ctx: &CallContext,
    organization_id: OrganizationId,
    user_id: UserId,
    cause: Error,
) -> Error {
    if let Err(err) = memberships.remove(ctx, organization_id, user_id).await {
        warn!(
            %user_id,
            %organization_id,
            error = %err,
            "membership cleanup failed during rollback"
        );
    }

    match users.delete(ctx, user_id).await {
        Ok(_) | Err(Error::NotFound) => {
            info!(
                %user_id,
                request_id = %ctx.request_id(),
                cause = %cause,
                "user creation rolled back"
            );
            metrics.compensation(User::RESOURCE, CompensationOutcome::RolledBack);
            cause
        }
        Err(compensation) => {
            error!(
                %user_id,
                request_id = %ctx.request_id(),
                cause = %cause,
                compensation = %compensation,
                "user creation could not be rolled back; user is orphaned"
            );
            metrics.compensation(User::RESOURCE, CompensationOutcome::Orphaned);
            Error::OrphanedResource {
                resource: User::RESOURCE,
                id: user_id.to_string(),
                compensation: compensation.to_string(),
                cause: Box::new(cause),
            }
        }
    }
}

#[async_trait]
impl UserService for TenantUserService {
    async fn create(&self, ctx: &CallContext, input: NewUser) -> Result<Committed<User>> {
        let Some(organization_id) = self.scope(ctx)? else {
            return self.inner.create(ctx, input).await;
        };

        if !self.organizations.exists(ctx, organization_id).await? {
            return Err(Error::OrganizationInvalid(organization_id.to_string()));
        }

        let created = self.inner.create(ctx, input).await?;
        let user_id = created.value.id;
        let pending = PendingRollback::arm(self, ctx, organization_id, user_id);

        if ctx.is_cancelled() {
            return Err(pending.run(Error::Cancelled).await);
        }

        match self
            .memberships
            .add(ctx, organization_id, user_id, self.config.default_role.clone())
            .await
        {
            Ok(_) => {
                pending.disarm();
                Ok(created)
            }
            Err(err) => Err(pending.run(err).await),
        }
    }

    async fn get(&self, ctx: &CallContext, id: UserId) -> Result<User> {
        if let Some(organization_id) = self.scope(ctx)? {
            self.ensure_member(ctx, organization_id, id).await?;
        }
        self.inner.get(ctx, id).await
    }

    async fn find_by_email(&self, ctx: &CallContext, email: &str) -> Result<Option<User>> {
        let scope = self.scope(ctx)?;
        let Some(user) = self.inner.find_by_email(ctx, email).await? else {
            return Ok(None);
        };
        match scope {
            Some(organization_id) => Ok(self
                .memberships
                .find(ctx, organization_id, user.id)
                .await?
                .map(|_| user)),
            None => Ok(Some(user)),
        }
    }

    async fn update(&self, ctx: &CallContext, id: UserId, patch: UserPatch) -> Result<Committed<User>> {
        if let Some(organization_id) = self.scope(ctx)? {
            self.ensure_member(ctx, organization_id, id).await?;
        }
        self.inner.update(ctx, id, patch).await
    }

    async fn delete(&self, ctx: &CallContext, id: UserId) -> Result<Committed<()>> {
        if let Some(organization_id) = self.scope(ctx)? {
            self.ensure_member(ctx, organization_id, id).await?;
        }
        self.inner.delete(ctx, id).await
    }

    async fn list(&self, ctx: &CallContext, query: &ListQuery) -> Result<Page<User>> {
        let Some(organization_id) = self.scope(ctx)? else {
            return self.inner.list(ctx, query).await;
        };

        let mut members = Vec::new();
        for membership in self
            .memberships
            .list_for_organization(ctx, organization_id)
            .await?
        {
            match self.inner.get(ctx, membership.user_id).await {
                Ok(user) if query.matches(&user) => members.push(user),
                Ok(_) | Err(Error::NotFound) => {}
                Err(err) => return Err(err),
            }
        }

        let total = members.len() as u64;
        let offset = query.pagination.offset as usize;
        let items: Vec<User> = members
            .into_iter()
            .skip(offset)
            .take(query.pagination.limit as usize)
            .collect();
        let has_more = (offset as u64).saturating_add(items.len() as u64) < total;

        Ok(Page {
            items,
            total,
            pagination: query.pagination,
            has_more,
        })
    }
}
