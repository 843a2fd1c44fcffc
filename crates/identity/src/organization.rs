use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use warden_auth::Role;
use warden_core::{
    CallContext, Clock, Entity, Error, ListQuery, OrganizationId, Page, Repository, Result,
    UserId,
};

use crate::{Membership, MembershipService};

/// Tenant boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    /// URL-safe handle, unique.
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for Organization {
    type Id = OrganizationId;
    const RESOURCE: &'static str = "organization";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "slug" => Some(Cow::Borrowed(&self.slug)),
            "name" => Some(Cow::Borrowed(&self.name)),
            _ => None,
        }
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("slug", self.slug.clone())]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrganization {
    pub name: String,
    pub slug: String,
}

#[async_trait]
pub trait OrganizationService: Send + Sync {
    async fn create(&self, ctx: &CallContext, input: NewOrganization) -> Result<Organization>;

    /// `Error::NotFound` if absent.
    async fn get(&self, ctx: &CallContext, id: OrganizationId) -> Result<Organization>;

    async fn exists(&self, ctx: &CallContext, id: OrganizationId) -> Result<bool>;

    async fn list(&self, ctx: &CallContext, query: &ListQuery) -> Result<Page<Organization>>;

    /// `false` if there was nothing to delete.
    async fn delete(&self, ctx: &CallContext, id: OrganizationId) -> Result<bool>;
}

/// Create an organization with `owner` as its first member.
///
/// When the membership cannot be added the organization is deleted again, so
/// no organization is left without an owner.
pub async fn create_with_owner(
    organizations: &dyn OrganizationService,
    memberships: &dyn MembershipService,
    ctx: &CallContext,
    input: NewOrganization,
    owner: UserId,
    role: Role,
) -> Result<(Organization, Membership)> {
    let organization = organizations.create(ctx, input).await?;
    let cause = match memberships.add(ctx, organization.id, owner, role).await {
        Ok(membership) => return Ok((organization, membership)),
        Err(cause) => cause,
    };

    match organizations.delete(&ctx.detached(), organization.id).await {
        Ok(_) => {
            info!(
                organization_id = %organization.id,
                cause = %cause,
                "organization creation rolled back"
            );
            Err(cause)
        }
        Err(compensation) => {
            error!(
                organization_id = %organization.id,
                cause = %cause,
                compensation = %compensation,
                "organization creation could not be rolled back; organization has no owner"
            );
            Err(Error::OrphanedResource {
                resource: Organization::RESOURCE,
                id: organization.id.to_string(),
                compensation: compensation.to_string(),
                cause: Box::new(cause),
            })
        }
    }
}

fn validate_slug(raw: &str) -> Result<String> {
    let slug = raw.trim().to_lowercase();
    let well_formed = !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-');
    if !well_formed {
        return Err(Error::validation(
            "slug must be lowercase letters, digits and inner dashes",
        ));
    }
    Ok(slug)
}

pub struct CoreOrganizationService<R> {
    repo: R,
    clock: Arc<dyn Clock>,
}

impl<R> CoreOrganizationService<R>
where
    R: Repository<Organization>,
{
    pub fn new(repo: R, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }
}

#[async_trait]
impl<R> OrganizationService for CoreOrganizationService<R>
where
    R: Repository<Organization>,
{
    async fn create(&self, ctx: &CallContext, input: NewOrganization) -> Result<Organization> {
        ctx.ensure_active()?;

        let name = input.name.trim();
        if name.is_empty() {
            return Err(Error::validation("organization name cannot be empty"));
        }
        let organization = self
            .repo
            .create(Organization {
                id: OrganizationId::new(),
                name: name.to_string(),
                slug: validate_slug(&input.slug)?,
                created_at: self.clock.now(),
            })
            .await?;

        info!(organization_id = %organization.id, slug = %organization.slug, "organization created");
        Ok(organization)
    }

    async fn get(&self, ctx: &CallContext, id: OrganizationId) -> Result<Organization> {
        ctx.ensure_active()?;
        self.repo.find_by_id(&id).await?.ok_or(Error::NotFound)
    }

    async fn exists(&self, ctx: &CallContext, id: OrganizationId) -> Result<bool> {
        ctx.ensure_active()?;
        Ok(self.repo.find_by_id(&id).await?.is_some())
    }

    async fn list(&self, ctx: &CallContext, query: &ListQuery) -> Result<Page<Organization>> {
        ctx.ensure_active()?;
        self.repo.list(query).await
    }

    async fn delete(&self, ctx: &CallContext, id: OrganizationId) -> Result<bool> {
        ctx.ensure_active()?;
        let removed = self.repo.delete(&id).await?;
        if removed {
            info!(organization_id = %id, "organization deleted");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use warden_core::{ErrorKind, ManualClock};
    use warden_infra::InMemoryRepository;

    use super::*;
    use crate::CoreMembershipService;

    fn service() -> CoreOrganizationService<InMemoryRepository<Organization>> {
        CoreOrganizationService::new(
            InMemoryRepository::new(),
            Arc::new(ManualClock::new(Utc::now())),
        )
    }

    fn input(slug: &str) -> NewOrganization {
        NewOrganization {
            name: "Acme".to_string(),
            slug: slug.to_string(),
        }
    }

    #[tokio::test]
    async fn create_and_lookup() {
        let orgs = service();
        let ctx = CallContext::new();

        let acme = orgs.create(&ctx, input("Acme-Corp")).await.unwrap();
        assert_eq!(acme.slug, "acme-corp");
        assert!(orgs.exists(&ctx, acme.id).await.unwrap());
        assert!(!orgs.exists(&ctx, OrganizationId::new()).await.unwrap());
        assert_eq!(orgs.get(&ctx, acme.id).await.unwrap(), acme);
        assert_eq!(
            orgs.get(&ctx, OrganizationId::new()).await.unwrap_err(),
            Error::NotFound
        );
    }

    #[tokio::test]
    async fn slugs_are_validated_and_unique() {
        let orgs = service();
        let ctx = CallContext::new();

        for slug in ["", "-acme", "acme-", "ac me", "acme_corp"] {
            let err = orgs.create(&ctx, input(slug)).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{slug:?}");
        }

        orgs.create(&ctx, input("acme")).await.unwrap();
        let err = orgs.create(&ctx, input("ACME")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    /// Membership service whose writes always fail.
    struct ReadOnlyMemberships;

    #[async_trait]
    impl MembershipService for ReadOnlyMemberships {
        async fn add(
            &self,
            _ctx: &CallContext,
            _organization_id: OrganizationId,
            _user_id: UserId,
            _role: Role,
        ) -> Result<Membership> {
            Err(Error::storage("membership store is read-only"))
        }

        async fn find(
            &self,
            _ctx: &CallContext,
            _organization_id: OrganizationId,
            _user_id: UserId,
        ) -> Result<Option<Membership>> {
            Ok(None)
        }

        async fn remove(
            &self,
            _ctx: &CallContext,
            _organization_id: OrganizationId,
            _user_id: UserId,
        ) -> Result<bool> {
            Ok(false)
        }

        async fn list_for_organization(
            &self,
            _ctx: &CallContext,
            _organization_id: OrganizationId,
        ) -> Result<Vec<Membership>> {
            Ok(Vec::new())
        }

        async fn list_for_user(&self, _ctx: &CallContext, _user_id: UserId) -> Result<Vec<Membership>> {
            Ok(Vec::new())
        }

        async fn remove_all_for_user(&self, _ctx: &CallContext, _user_id: UserId) -> Result<usize> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn create_with_owner_adds_the_owner() {
        let orgs = service();
        let members = CoreMembershipService::new(
            InMemoryRepository::new(),
            Arc::new(ManualClock::new(Utc::now())),
        );
        let ctx = CallContext::new();
        let owner = UserId::new();

        let (acme, membership) =
            create_with_owner(&orgs, &members, &ctx, input("acme"), owner, Role::OWNER)
                .await
                .unwrap();
        assert_eq!(membership.organization_id, acme.id);
        assert_eq!(membership.role, Role::OWNER);
        assert!(orgs.exists(&ctx, acme.id).await.unwrap());
    }

    #[tokio::test]
    async fn failed_owner_membership_removes_the_organization() {
        let orgs = service();
        let ctx = CallContext::new();

        let err = create_with_owner(
            &orgs,
            &ReadOnlyMemberships,
            &ctx,
            input("acme"),
            UserId::new(),
            Role::OWNER,
        )
        .await
        .unwrap_err();
        assert_eq!(err, Error::storage("membership store is read-only"));

        let page = orgs.list(&ctx, &ListQuery::new()).await.unwrap();
        assert_eq!(page.total, 0);
        // The slug is free again.
        orgs.create(&ctx, input("acme")).await.unwrap();
    }
}
