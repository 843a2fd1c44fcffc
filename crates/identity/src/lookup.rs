//! Adapters exposing the identity services through the lookup interfaces
//! the authentication strategies consume.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;

use warden_auth::{
    ApiKey, ApiKeyLookup, Permission, Role, Session, SessionLookup, Subject, SubjectLookup,
};
use warden_core::{CallContext, Error, OrganizationId, Result, UserId};

use crate::{ApiKeyService, MembershipService, SessionService, UserService};

pub struct SessionLookupAdapter(pub Arc<dyn SessionService>);

#[async_trait]
impl SessionLookup for SessionLookupAdapter {
    async fn find_by_token(
        &self,
        ctx: &CallContext,
        token: &SecretString,
    ) -> Result<Option<Session>> {
        self.0.resolve(ctx, token).await
    }
}

pub struct ApiKeyLookupAdapter(pub Arc<dyn ApiKeyService>);

#[async_trait]
impl ApiKeyLookup for ApiKeyLookupAdapter {
    async fn find_key(&self, ctx: &CallContext, key_id: &str) -> Result<Option<ApiKey>> {
        self.0.find(ctx, key_id).await
    }
}

/// Builds authorization subjects from users and memberships.
///
/// Without an organization the subject carries the user's global roles. With
/// one, the user must be a member; the membership role is added and owners
/// get the wildcard permission.
pub struct DirectorySubjects {
    users: Arc<dyn UserService>,
    memberships: Arc<dyn MembershipService>,
}

impl DirectorySubjects {
    pub fn new(users: Arc<dyn UserService>, memberships: Arc<dyn MembershipService>) -> Self {
        Self { users, memberships }
    }
}

#[async_trait]
impl SubjectLookup for DirectorySubjects {
    async fn find_subject(
        &self,
        ctx: &CallContext,
        user_id: UserId,
        organization_id: Option<OrganizationId>,
    ) -> Result<Option<Subject>> {
        let user = match self.users.get(ctx, user_id).await {
            Ok(user) => user,
            Err(Error::NotFound) => return Ok(None),
            Err(err) => return Err(err),
        };

        let mut roles = user.roles.clone();
        if let Some(organization_id) = organization_id {
            let Some(membership) = self.memberships.find(ctx, organization_id, user_id).await?
            else {
                return Ok(None);
            };
            if !roles.contains(&membership.role) {
                roles.push(membership.role);
            }
        }

        let mut permissions = user.permissions.clone();
        if roles.contains(&Role::OWNER) && !permissions.contains(&Permission::WILDCARD) {
            permissions.push(Permission::WILDCARD);
        }

        Ok(Some(Subject {
            id: user.id,
            roles,
            permissions,
            active: user.is_active(),
        }))
    }
}
