//! Session issuance. Tokens are random, handed out once, and stored by
//! digest only.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::info;

use warden_auth::Session;
use warden_auth::credential::digest;
use warden_core::{
    AppId, CallContext, Clock, EnvironmentId, Error, ListQuery, OrganizationId, Pagination,
    Repository, Result, SessionId, UserId,
};

/// Upper bound on a session lifetime (one year).
const MAX_SESSION_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session lifetime in seconds, clamped to `1..=` one year.
    pub ttl_seconds: i64,
    /// Random bytes per token, hex-encoded on the wire.
    pub token_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 24 * 60 * 60,
            token_bytes: 32,
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        let seconds = self.ttl_seconds.clamp(1, MAX_SESSION_TTL_SECONDS);
        Duration::try_seconds(seconds).unwrap_or(Duration::zero())
    }
}

/// Optional ids a session is scoped to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionScope {
    pub app_id: Option<AppId>,
    pub organization_id: Option<OrganizationId>,
    pub environment_id: Option<EnvironmentId>,
}

impl SessionScope {
    pub fn organization(organization_id: OrganizationId) -> Self {
        Self {
            organization_id: Some(organization_id),
            ..Self::default()
        }
    }
}

/// A freshly issued session and its token. The token is not recoverable later.
#[derive(Debug)]
pub struct IssuedSession {
    pub session: Session,
    pub token: SecretString,
}

#[async_trait]
pub trait SessionService: Send + Sync {
    async fn issue(&self, ctx: &CallContext, user_id: UserId, scope: SessionScope)
    -> Result<IssuedSession>;

    /// Session for a raw token, expired or not.
    async fn resolve(&self, ctx: &CallContext, token: &SecretString) -> Result<Option<Session>>;

    async fn revoke(&self, ctx: &CallContext, id: SessionId) -> Result<bool>;

    async fn revoke_all_for_user(&self, ctx: &CallContext, user_id: UserId) -> Result<usize>;

    /// Delete sessions past their expiry; returns how many were removed.
    async fn purge_expired(&self, ctx: &CallContext) -> Result<usize>;
}

pub struct CoreSessionService<R> {
    repo: R,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
}

impl<R> CoreSessionService<R>
where
    R: Repository<Session>,
{
    pub fn new(repo: R, clock: Arc<dyn Clock>, config: SessionConfig) -> Self {
        Self {
            repo,
            clock,
            config,
        }
    }

    fn new_token(&self) -> String {
        let mut bytes = vec![0u8; self.config.token_bytes.max(16)];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    async fn all(&self, query: ListQuery) -> Result<Vec<Session>> {
        Ok(self
            .repo
            .list(&query.paginate(Pagination::unbounded()))
            .await?
            .items)
    }
}

#[async_trait]
impl<R> SessionService for CoreSessionService<R>
where
    R: Repository<Session>,
{
    async fn issue(
        &self,
        ctx: &CallContext,
        user_id: UserId,
        scope: SessionScope,
    ) -> Result<IssuedSession> {
        ctx.ensure_active()?;

        let token = self.new_token();
        let now = self.clock.now();
        let session = self
            .repo
            .create(Session {
                id: SessionId::new(),
                user_id,
                token_digest: digest(&token),
                created_at: now,
                expires_at: now + self.config.ttl(),
                app_id: scope.app_id,
                organization_id: scope.organization_id,
                environment_id: scope.environment_id,
            })
            .await?;

        info!(session_id = %session.id, %user_id, "session issued");
        Ok(IssuedSession {
            session,
            token: SecretString::from(token),
        })
    }

    async fn resolve(&self, ctx: &CallContext, token: &SecretString) -> Result<Option<Session>> {
        ctx.ensure_active()?;
        let found = self
            .all(ListQuery::new().filter("token_digest", digest(token.expose_secret())))
            .await?;
        Ok(found.into_iter().next())
    }

    async fn revoke(&self, ctx: &CallContext, id: SessionId) -> Result<bool> {
        ctx.ensure_active()?;
        let removed = self.repo.delete(&id).await?;
        if removed {
            info!(session_id = %id, "session revoked");
        }
        Ok(removed)
    }

    async fn revoke_all_for_user(&self, ctx: &CallContext, user_id: UserId) -> Result<usize> {
        ctx.ensure_active()?;
        let mut removed = 0;
        for session in self
            .all(ListQuery::new().filter("user_id", user_id.to_string()))
            .await?
        {
            if self.repo.delete(&session.id).await? {
                removed += 1;
            }
        }
        info!(%user_id, removed, "sessions revoked");
        Ok(removed)
    }

    async fn purge_expired(&self, ctx: &CallContext) -> Result<usize> {
        ctx.ensure_active()?;
        let now = self.clock.now();
        let mut removed = 0;
        for session in self.all(ListQuery::new()).await? {
            if session.is_expired(now) && self.repo.delete(&session.id).await? {
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "expired sessions purged");
        }
        Ok(removed)
    }
}

/// Rejects a session token that does not belong to `user_id`.
pub async fn ensure_owned_by(
    sessions: &dyn SessionService,
    ctx: &CallContext,
    token: &SecretString,
    user_id: UserId,
) -> Result<Session> {
    sessions
        .resolve(ctx, token)
        .await?
        .filter(|s| s.user_id == user_id)
        .ok_or(Error::SessionNotFound)
}
