use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use warden_auth::Role;
use warden_core::{
    CallContext, Clock, Entity, ListQuery, MembershipId, OrganizationId, Pagination, Repository,
    Result, UserId,
};

/// A user's role within one organization. At most one per pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub id: MembershipId,
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Entity for Membership {
    type Id = MembershipId;
    const RESOURCE: &'static str = "membership";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "organization_id" => Some(Cow::Owned(self.organization_id.to_string())),
            "user_id" => Some(Cow::Owned(self.user_id.to_string())),
            "role" => Some(Cow::Borrowed(self.role.as_str())),
            _ => None,
        }
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![(
            "organization_user",
            format!("{}:{}", self.organization_id, self.user_id),
        )]
    }
}

#[async_trait]
pub trait MembershipService: Send + Sync {
    /// `Error::Conflict` if the user is already a member.
    async fn add(
        &self,
        ctx: &CallContext,
        organization_id: OrganizationId,
        user_id: UserId,
        role: Role,
    ) -> Result<Membership>;

    async fn find(
        &self,
        ctx: &CallContext,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Option<Membership>>;

    async fn remove(
        &self,
        ctx: &CallContext,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<bool>;

    /// Members in the order they joined.
    async fn list_for_organization(
        &self,
        ctx: &CallContext,
        organization_id: OrganizationId,
    ) -> Result<Vec<Membership>>;

    async fn list_for_user(&self, ctx: &CallContext, user_id: UserId) -> Result<Vec<Membership>>;

    /// Drop every membership of a user; returns how many were removed.
    async fn remove_all_for_user(&self, ctx: &CallContext, user_id: UserId) -> Result<usize>;
}

pub struct CoreMembershipService<R> {
    repo: R,
    clock: Arc<dyn Clock>,
}

impl<R> CoreMembershipService<R>
where
    R: Repository<Membership>,
{
    pub fn new(repo: R, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    async fn matching(&self, query: ListQuery) -> Result<Vec<Membership>> {
        let page = self
            .repo
            .list(&query.paginate(Pagination::unbounded()))
            .await?;
        Ok(page.items)
    }
}

#[async_trait]
impl<R> MembershipService for CoreMembershipService<R>
where
    R: Repository<Membership>,
{
    async fn add(
        &self,
        ctx: &CallContext,
        organization_id: OrganizationId,
        user_id: UserId,
        role: Role,
    ) -> Result<Membership> {
        ctx.ensure_active()?;

        let membership = self
            .repo
            .create(Membership {
                id: MembershipId::new(),
                organization_id,
                user_id,
                role,
                created_at: self.clock.now(),
            })
            .await?;
        debug!(%organization_id, %user_id, role = %membership.role, "membership added");
        Ok(membership)
    }

    async fn find(
        &self,
        ctx: &CallContext,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Option<Membership>> {
        ctx.ensure_active()?;
        let found = self
            .matching(
                ListQuery::new()
                    .filter("organization_id", organization_id.to_string())
                    .filter("user_id", user_id.to_string()),
            )
            .await?;
        Ok(found.into_iter().next())
    }

    async fn remove(
        &self,
        ctx: &CallContext,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<bool> {
        match self.find(ctx, organization_id, user_id).await? {
            Some(membership) => self.repo.delete(&membership.id).await,
            None => Ok(false),
        }
    }

    async fn list_for_organization(
        &self,
        ctx: &CallContext,
        organization_id: OrganizationId,
    ) -> Result<Vec<Membership>> {
        ctx.ensure_active()?;
        self.matching(ListQuery::new().filter("organization_id", organization_id.to_string()))
            .await
    }

    async fn list_for_user(&self, ctx: &CallContext, user_id: UserId) -> Result<Vec<Membership>> {
        ctx.ensure_active()?;
        self.matching(ListQuery::new().filter("user_id", user_id.to_string()))
            .await
    }

    async fn remove_all_for_user(&self, ctx: &CallContext, user_id: UserId) -> Result<usize> {
        let mut removed = 0;
        for membership in self.list_for_user(ctx, user_id).await? {
            if self.repo.delete(&membership.id).await? {
                removed += 1;
            }
        }
        if removed > 0 {
            info!(%user_id, removed, "memberships removed");
        }
        Ok(removed)
    }
}
