//! Session-backed authentication shared by the bearer and cookie strategies.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use warden_core::{
    AppId, CallContext, Clock, Entity, EnvironmentId, Error, OrganizationId, Result, SessionId,
    UserId,
};

use crate::{AuthContext, AuthMethod, Permission, Role};

/// Login session. The token itself is never stored, only its digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub token_digest: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub app_id: Option<AppId>,
    pub organization_id: Option<OrganizationId>,
    pub environment_id: Option<EnvironmentId>,
}

impl Session {
    /// A session expiring exactly at `now` is already expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl Entity for Session {
    type Id = SessionId;
    const RESOURCE: &'static str = "session";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "user_id" => Some(Cow::Owned(self.user_id.to_string())),
            "token_digest" => Some(Cow::Borrowed(&self.token_digest)),
            _ => None,
        }
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("token_digest", self.token_digest.clone())]
    }
}

/// Resolves a raw session token to its session record.
#[async_trait]
pub trait SessionLookup: Send + Sync {
    async fn find_by_token(&self, ctx: &CallContext, token: &SecretString)
    -> Result<Option<Session>>;
}

/// Authorization-relevant view of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: UserId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
    pub active: bool,
}

/// Loads the subject behind a session or key, scoped to an organization when
/// one is given.
#[async_trait]
pub trait SubjectLookup: Send + Sync {
    async fn find_subject(
        &self,
        ctx: &CallContext,
        user_id: UserId,
        organization_id: Option<OrganizationId>,
    ) -> Result<Option<Subject>>;
}

/// Turns a session token into an [`AuthContext`].
#[derive(Clone)]
pub struct SessionAuthenticator {
    sessions: Arc<dyn SessionLookup>,
    subjects: Arc<dyn SubjectLookup>,
    clock: Arc<dyn Clock>,
}

impl SessionAuthenticator {
    pub fn new(
        sessions: Arc<dyn SessionLookup>,
        subjects: Arc<dyn SubjectLookup>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions,
            subjects,
            clock,
        }
    }

    pub async fn authenticate(
        &self,
        ctx: &CallContext,
        token: &SecretString,
        method: AuthMethod,
    ) -> Result<AuthContext> {
        ctx.ensure_active()?;

        let session = self
            .sessions
            .find_by_token(ctx, token)
            .await?
            .ok_or(Error::SessionNotFound)?;

        if session.is_expired(self.clock.now()) {
            return Err(Error::SessionExpired);
        }

        let subject = self
            .subjects
            .find_subject(ctx, session.user_id, session.organization_id)
            .await?
            .filter(|s| s.active)
            .ok_or(Error::UserNotFound)?;

        Ok(AuthContext::builder(subject.id, method)
            .session_id(session.id)
            .app_id(session.app_id)
            .organization_id(session.organization_id)
            .environment_id(session.environment_id)
            .roles(subject.roles)
            .permissions(subject.permissions)
            .build())
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use warden_core::{ErrorKind, ManualClock};

    use super::testing::{Fixture, authenticator};
    use super::*;

    fn token(raw: &str) -> SecretString {
        SecretString::from(raw.to_string())
    }

    #[tokio::test]
    async fn valid_session_builds_context_with_scope() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let fixture = Arc::new(Fixture::default());
        let (user_id, session_id) = fixture.seed("tok-1", clock.now());

        let auth = authenticator(fixture, clock)
            .authenticate(&CallContext::new(), &token("tok-1"), AuthMethod::BEARER)
            .await
            .unwrap();

        assert!(auth.is_authenticated());
        assert_eq!(auth.subject_id(), Some(user_id));
        assert_eq!(auth.session_id(), Some(session_id));
        assert!(auth.organization_id().is_some());
        assert!(auth.has_role(&Role::MEMBER));
    }

    #[tokio::test]
    async fn unknown_token_is_session_not_found() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let err = authenticator(Arc::new(Fixture::default()), clock)
            .authenticate(&CallContext::new(), &token("nope"), AuthMethod::BEARER)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionNotFound);
    }

    #[tokio::test]
    async fn session_expires_at_its_boundary() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let fixture = Arc::new(Fixture::default());
        fixture.seed("tok-1", clock.now());
        let auth = authenticator(fixture, clock.clone());

        clock.advance(Duration::hours(1));
        let err = auth
            .authenticate(&CallContext::new(), &token("tok-1"), AuthMethod::COOKIE)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionExpired);
    }

    #[tokio::test]
    async fn inactive_or_missing_subject_is_user_not_found() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let fixture = Arc::new(Fixture::default());
        let (user_id, _) = fixture.seed("tok-1", clock.now());
        fixture
            .subjects
            .lock()
            .unwrap()
            .get_mut(&user_id)
            .unwrap()
            .active = false;

        let err = authenticator(fixture, clock)
            .authenticate(&CallContext::new(), &token("tok-1"), AuthMethod::BEARER)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UserNotFound);
    }
}
