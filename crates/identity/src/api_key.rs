//! API key issuance and revocation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};
use secrecy::SecretString;
use serde::Deserialize;
use tracing::info;

use warden_auth::credential::digest;
use warden_auth::{ApiKey, Permission};
use warden_core::{
    AppId, CallContext, Clock, EnvironmentId, Error, ListQuery, OrganizationId, Pagination,
    Repository, Result, UserId,
};

const KEY_ID_LEN: usize = 16;
const SECRET_BYTES: usize = 32;
/// Longest lifetime an expiring key may be issued with (ten years).
pub const MAX_API_KEY_TTL_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewApiKey {
    pub name: String,
    pub user_id: UserId,
    #[serde(default)]
    pub app_id: Option<AppId>,
    #[serde(default)]
    pub organization_id: Option<OrganizationId>,
    #[serde(default)]
    pub environment_id: Option<EnvironmentId>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    /// Lifetime in seconds; `None` never expires.
    #[serde(default)]
    pub ttl_seconds: Option<i64>,
}

impl NewApiKey {
    pub fn new(name: impl Into<String>, user_id: UserId) -> Self {
        Self {
            name: name.into(),
            user_id,
            app_id: None,
            organization_id: None,
            environment_id: None,
            permissions: Vec::new(),
            ttl_seconds: None,
        }
    }
}

/// The stored key plus its full wire form, shown once.
#[derive(Debug)]
pub struct IssuedApiKey {
    pub key: ApiKey,
    pub secret: SecretString,
}

#[async_trait]
pub trait ApiKeyService: Send + Sync {
    async fn issue(&self, ctx: &CallContext, input: NewApiKey) -> Result<IssuedApiKey>;

    async fn find(&self, ctx: &CallContext, key_id: &str) -> Result<Option<ApiKey>>;

    async fn revoke(&self, ctx: &CallContext, key_id: &str) -> Result<bool>;

    async fn list_for_user(&self, ctx: &CallContext, user_id: UserId) -> Result<Vec<ApiKey>>;
}

pub struct CoreApiKeyService<R> {
    repo: R,
    clock: Arc<dyn Clock>,
    prefix: String,
}

impl<R> CoreApiKeyService<R>
where
    R: Repository<ApiKey>,
{
    /// `prefix` must match the API-key strategy's, e.g. `"wdn_"`.
    pub fn new(repo: R, clock: Arc<dyn Clock>, prefix: impl Into<String>) -> Self {
        Self {
            repo,
            clock,
            prefix: prefix.into(),
        }
    }
}

fn expiry_ttl(seconds: i64) -> Result<Duration> {
    if seconds <= 0 {
        return Err(Error::validation("api key ttl must be positive"));
    }
    if seconds > MAX_API_KEY_TTL_SECONDS {
        return Err(Error::validation(format!(
            "api key ttl cannot exceed {MAX_API_KEY_TTL_SECONDS} seconds"
        )));
    }
    Duration::try_seconds(seconds).ok_or_else(|| Error::validation("api key ttl is out of range"))
}

/// Random key id and hex secret. `ThreadRng` is not `Send`; keep it out of
/// async bodies.
fn new_key_material() -> (String, String) {
    let mut rng = rand::thread_rng();
    let key_id: String = (&mut rng)
        .sample_iter(Alphanumeric)
        .take(KEY_ID_LEN)
        .map(char::from)
        .collect();
    let mut secret = [0u8; SECRET_BYTES];
    rng.fill_bytes(&mut secret);
    (key_id, hex::encode(secret))
}

#[async_trait]
impl<R> ApiKeyService for CoreApiKeyService<R>
where
    R: Repository<ApiKey>,
{
    async fn issue(&self, ctx: &CallContext, input: NewApiKey) -> Result<IssuedApiKey> {
        ctx.ensure_active()?;

        let name = input.name.trim();
        if name.is_empty() {
            return Err(Error::validation("api key name cannot be empty"));
        }
        let ttl = input.ttl_seconds.map(expiry_ttl).transpose()?;

        let (key_id, secret) = new_key_material();
        let now = self.clock.now();
        let expires_at = match ttl {
            Some(ttl) => Some(
                now.checked_add_signed(ttl)
                    .ok_or_else(|| Error::validation("api key ttl is out of range"))?,
            ),
            None => None,
        };
        let key = self
            .repo
            .create(ApiKey {
                key_id,
                name: name.to_string(),
                secret_digest: digest(&secret),
                user_id: input.user_id,
                app_id: input.app_id,
                organization_id: input.organization_id,
                environment_id: input.environment_id,
                permissions: input.permissions,
                created_at: now,
                expires_at,
            })
            .await?;

        info!(key_id = %key.key_id, user_id = %key.user_id, "api key issued");
        let wire = format!("{}{}.{}", self.prefix, key.key_id, secret);
        Ok(IssuedApiKey {
            key,
            secret: SecretString::from(wire),
        })
    }

    async fn find(&self, ctx: &CallContext, key_id: &str) -> Result<Option<ApiKey>> {
        ctx.ensure_active()?;
        self.repo.find_by_id(&key_id.to_string()).await
    }

    async fn revoke(&self, ctx: &CallContext, key_id: &str) -> Result<bool> {
        ctx.ensure_active()?;
        let removed = self.repo.delete(&key_id.to_string()).await?;
        if removed {
            info!(%key_id, "api key revoked");
        }
        Ok(removed)
    }

    async fn list_for_user(&self, ctx: &CallContext, user_id: UserId) -> Result<Vec<ApiKey>> {
        ctx.ensure_active()?;
        let page = self
            .repo
            .list(
                &ListQuery::new()
                    .filter("user_id", user_id.to_string())
                    .paginate(Pagination::unbounded()),
            )
            .await?;
        Ok(page.items)
    }
}
