//! Normalized per-request identity.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use warden_core::{AppId, CallContext, EnvironmentId, OrganizationId, SessionId, UserId};

use crate::{Permission, Role};

/// Tag naming the strategy family that authenticated a request.
///
/// Open-ended: plugins introduce their own tags with [`AuthMethod::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthMethod(Cow<'static, str>);

impl AuthMethod {
    pub const BEARER: AuthMethod = AuthMethod(Cow::Borrowed("bearer"));
    pub const COOKIE: AuthMethod = AuthMethod(Cow::Borrowed("cookie"));
    pub const API_KEY: AuthMethod = AuthMethod(Cow::Borrowed("api_key"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for AuthMethod {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// Resolved identity for one request.
///
/// Built once (by a strategy, through [`AuthContextBuilder`]) and never
/// mutated. An authenticated context always carries a subject and a method;
/// the anonymous context carries neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthContext {
    subject_id: Option<UserId>,
    session_id: Option<SessionId>,
    app_id: Option<AppId>,
    organization_id: Option<OrganizationId>,
    environment_id: Option<EnvironmentId>,
    method: Option<AuthMethod>,
    authenticated: bool,
    roles: Vec<Role>,
    permissions: Vec<Permission>,
}

impl AuthContext {
    /// The unauthenticated identity.
    pub fn anonymous() -> Self {
        Self {
            subject_id: None,
            session_id: None,
            app_id: None,
            organization_id: None,
            environment_id: None,
            method: None,
            authenticated: false,
            roles: Vec::new(),
            permissions: Vec::new(),
        }
    }

    /// Start building an authenticated identity.
    pub fn builder(subject_id: UserId, method: AuthMethod) -> AuthContextBuilder {
        AuthContextBuilder {
            inner: Self {
                subject_id: Some(subject_id),
                method: Some(method),
                authenticated: true,
                ..Self::anonymous()
            },
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn subject_id(&self) -> Option<UserId> {
        self.subject_id
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    pub fn app_id(&self) -> Option<AppId> {
        self.app_id
    }

    pub fn organization_id(&self) -> Option<OrganizationId> {
        self.organization_id
    }

    pub fn environment_id(&self) -> Option<EnvironmentId> {
        self.environment_id
    }

    pub fn method(&self) -> Option<&AuthMethod> {
        self.method.as_ref()
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_permission(&self, required: &Permission) -> bool {
        self.permissions.iter().any(|p| p.grants(required))
    }

    /// Service call context scoped to this identity.
    pub fn call_context(&self) -> CallContext {
        let mut ctx = CallContext::new();
        if let Some(organization_id) = self.organization_id {
            ctx = ctx.with_organization(organization_id);
        }
        if let Some(subject_id) = self.subject_id {
            ctx = ctx.with_actor(subject_id);
        }
        ctx
    }
}

impl Default for AuthContext {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// Builder for authenticated contexts; see [`AuthContext::builder`].
#[derive(Debug, Clone)]
pub struct AuthContextBuilder {
    inner: AuthContext,
}

impl AuthContextBuilder {
    pub fn session_id(mut self, session_id: SessionId) -> Self {
        self.inner.session_id = Some(session_id);
        self
    }

    pub fn app_id(mut self, app_id: Option<AppId>) -> Self {
        self.inner.app_id = app_id;
        self
    }

    pub fn organization_id(mut self, organization_id: Option<OrganizationId>) -> Self {
        self.inner.organization_id = organization_id;
        self
    }

    pub fn environment_id(mut self, environment_id: Option<EnvironmentId>) -> Self {
        self.inner.environment_id = environment_id;
        self
    }

    pub fn roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.inner.roles = roles.into_iter().collect();
        self
    }

    pub fn permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.inner.permissions = permissions.into_iter().collect();
        self
    }

    pub fn build(self) -> AuthContext {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_context_has_no_subject_or_method() {
        let ctx = AuthContext::anonymous();
        assert!(!ctx.is_authenticated());
        assert!(ctx.subject_id().is_none());
        assert!(ctx.method().is_none());
    }

    #[test]
    fn built_context_is_authenticated_with_subject_and_method() {
        let user = UserId::new();
        let org = OrganizationId::new();
        let ctx = AuthContext::builder(user, AuthMethod::BEARER)
            .organization_id(Some(org))
            .roles([Role::MEMBER])
            .permissions([Permission::new("users.read")])
            .build();

        assert!(ctx.is_authenticated());
        assert_eq!(ctx.subject_id(), Some(user));
        assert_eq!(ctx.method(), Some(&AuthMethod::BEARER));
        assert!(ctx.has_role(&Role::MEMBER));
        assert!(ctx.has_permission(&Permission::new("users.read")));
        assert!(!ctx.has_permission(&Permission::new("users.write")));

        let call = ctx.call_context();
        assert_eq!(call.organization_id(), Some(org));
        assert_eq!(call.actor_id(), Some(user));
    }

    #[test]
    fn wildcard_permission_grants_everything() {
        let ctx = AuthContext::builder(UserId::new(), AuthMethod::API_KEY)
            .permissions([Permission::WILDCARD])
            .build();
        assert!(ctx.has_permission(&Permission::new("anything.at.all")));
    }
}
