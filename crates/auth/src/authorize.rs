//! Authorization checks over a resolved [`AuthContext`].
//!
//! - No IO
//! - No panics
//! - Pure policy checks; the caller decides what a permission means

use warden_core::{Error, OrganizationId, Result};

use crate::{AuthContext, Permission, Role};

fn ensure_authenticated(auth: &AuthContext) -> Result<()> {
    if auth.is_authenticated() {
        Ok(())
    } else {
        Err(Error::Unauthenticated)
    }
}

/// Require `required` (or the wildcard) among the context's permissions.
pub fn require_permission(auth: &AuthContext, required: &Permission) -> Result<()> {
    ensure_authenticated(auth)?;

    if auth.has_permission(required) {
        Ok(())
    } else {
        Err(Error::forbidden(format!(
            "missing permission '{}'",
            required.as_str()
        )))
    }
}

/// Require `role` among the context's roles.
pub fn require_role(auth: &AuthContext, role: &Role) -> Result<()> {
    ensure_authenticated(auth)?;

    if auth.has_role(role) {
        Ok(())
    } else {
        Err(Error::forbidden(format!("missing role '{}'", role.as_str())))
    }
}

/// Authorize an action inside a specific organization.
///
/// A context scoped to another organization is rejected before permissions are
/// considered. An unscoped context is accepted on permissions alone.
pub fn authorize_in_organization(
    auth: &AuthContext,
    organization_id: OrganizationId,
    required: &Permission,
) -> Result<()> {
    ensure_authenticated(auth)?;

    if let Some(active) = auth.organization_id() {
        if active != organization_id {
            return Err(Error::forbidden("organization mismatch"));
        }
    }

    require_permission(auth, required)
}

#[cfg(test)]
mod tests {
    use warden_core::{ErrorKind, UserId};

    use super::*;
    use crate::AuthMethod;

    fn member_of(org: OrganizationId, perms: &[&'static str]) -> AuthContext {
        AuthContext::builder(UserId::new(), AuthMethod::BEARER)
            .organization_id(Some(org))
            .roles([Role::MEMBER])
            .permissions(perms.iter().map(|p| Permission::new(*p)))
            .build()
    }

    #[test]
    fn anonymous_is_unauthenticated_not_forbidden() {
        let err = require_permission(&AuthContext::anonymous(), &Permission::new("users.read"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    }

    #[test]
    fn missing_permission_is_forbidden() {
        let auth = member_of(OrganizationId::new(), &["users.read"]);
        assert!(require_permission(&auth, &Permission::new("users.read")).is_ok());

        let err = require_permission(&auth, &Permission::new("users.write")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert!(err.to_string().contains("users.write"));
    }

    #[test]
    fn role_check() {
        let auth = member_of(OrganizationId::new(), &[]);
        assert!(require_role(&auth, &Role::MEMBER).is_ok());
        assert_eq!(
            require_role(&auth, &Role::OWNER).unwrap_err().kind(),
            ErrorKind::Forbidden
        );
    }

    #[test]
    fn organization_mismatch_is_rejected_even_with_wildcard() {
        let org = OrganizationId::new();
        let auth = member_of(org, &["*"]);

        assert!(authorize_in_organization(&auth, org, &Permission::new("x")).is_ok());
        let err =
            authorize_in_organization(&auth, OrganizationId::new(), &Permission::new("x"))
                .unwrap_err();
        assert_eq!(err, Error::forbidden("organization mismatch"));
    }
}
