//! User directory: the core user service and its lifecycle events.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use warden_auth::{Permission, Role};
use warden_core::{CallContext, Clock, Entity, Error, ListQuery, Page, Repository, Result, UserId};
use warden_hooks::{Committed, HookRegistry, LifecycleEvent, Phase};

/// User account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// User is active and can authenticate.
    #[default]
    Active,
    /// User is suspended and cannot authenticate.
    Suspended,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Suspended => "suspended",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Trimmed and lowercased; unique across the directory.
    pub email: String,
    pub display_name: String,
    pub status: UserStatus,
    /// Roles held regardless of organization.
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

impl Entity for User {
    type Id = UserId;
    const RESOURCE: &'static str = "user";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "email" => Some(Cow::Borrowed(&self.email)),
            "status" => Some(Cow::Borrowed(self.status.as_str())),
            _ => None,
        }
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("email", self.email.clone())]
    }
}

/// Input for [`UserService::create`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl NewUser {
    pub fn new(email: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            display_name: display_name.into(),
            roles: Vec::new(),
            permissions: Vec::new(),
        }
    }
}

/// Partial update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPatch {
    pub display_name: Option<String>,
    pub status: Option<UserStatus>,
    pub roles: Option<Vec<Role>>,
    pub permissions: Option<Vec<Permission>>,
}

/// Fired before a validated user is stored. A rejection aborts the create.
#[derive(Debug, Clone)]
pub struct UserCreating {
    pub user: User,
}

impl LifecycleEvent for UserCreating {
    const NAME: &'static str = "user.creating";
}

#[derive(Debug, Clone)]
pub struct UserCreated {
    pub user: User,
}

impl LifecycleEvent for UserCreated {
    const NAME: &'static str = "user.created";
}

#[derive(Debug, Clone)]
pub struct UserUpdating {
    pub current: User,
    pub proposed: User,
}

impl LifecycleEvent for UserUpdating {
    const NAME: &'static str = "user.updating";
}

#[derive(Debug, Clone)]
pub struct UserUpdated {
    pub user: User,
}

impl LifecycleEvent for UserUpdated {
    const NAME: &'static str = "user.updated";
}

#[derive(Debug, Clone)]
pub struct UserDeleting {
    pub user: User,
}

impl LifecycleEvent for UserDeleting {
    const NAME: &'static str = "user.deleting";
}

#[derive(Debug, Clone)]
pub struct UserDeleted {
    pub user: User,
}

impl LifecycleEvent for UserDeleted {
    const NAME: &'static str = "user.deleted";
}

/// User directory operations.
///
/// Mutations return [`Committed`] so after-hook warnings reach the caller.
#[async_trait]
pub trait UserService: Send + Sync {
    async fn create(&self, ctx: &CallContext, input: NewUser) -> Result<Committed<User>>;

    /// `Error::NotFound` if absent.
    async fn get(&self, ctx: &CallContext, id: UserId) -> Result<User>;

    async fn find_by_email(&self, ctx: &CallContext, email: &str) -> Result<Option<User>>;

    async fn update(&self, ctx: &CallContext, id: UserId, patch: UserPatch) -> Result<Committed<User>>;

    /// `Error::NotFound` if absent.
    async fn delete(&self, ctx: &CallContext, id: UserId) -> Result<Committed<()>>;

    async fn list(&self, ctx: &CallContext, query: &ListQuery) -> Result<Page<User>>;
}

/// Trim and lowercase an email, rejecting obviously malformed input.
pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(Error::validation("invalid email format")),
    }
}

fn normalize_display_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(Error::validation("display name cannot be empty"));
    }
    Ok(name.to_string())
}

/// Repository-backed user service; the base of the user slot.
pub struct CoreUserService<R> {
    repo: R,
    hooks: Arc<HookRegistry>,
    clock: Arc<dyn Clock>,
}

impl<R> CoreUserService<R>
where
    R: Repository<User>,
{
    pub fn new(repo: R, hooks: Arc<HookRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, hooks, clock }
    }

    async fn load(&self, id: UserId) -> Result<User> {
        self.repo.find_by_id(&id).await?.ok_or(Error::NotFound)
    }
}

#[async_trait]
impl<R> UserService for CoreUserService<R>
where
    R: Repository<User>,
{
    async fn create(&self, ctx: &CallContext, input: NewUser) -> Result<Committed<User>> {
        ctx.ensure_active()?;

        let now = self.clock.now();
        let user = User {
            id: UserId::new(),
            email: normalize_email(&input.email)?,
            display_name: normalize_display_name(&input.display_name)?,
            status: UserStatus::Active,
            roles: input.roles,
            permissions: input.permissions,
            created_at: now,
            updated_at: now,
        };

        self.hooks
            .fire(Phase::Before, ctx, &UserCreating { user: user.clone() })
            .await?;
        let user = self.repo.create(user).await?;
        info!(user_id = %user.id, "user created");

        let warnings = self
            .hooks
            .fire(Phase::After, ctx, &UserCreated { user: user.clone() })
            .await?;
        Ok(Committed::new(user, warnings))
    }

    async fn get(&self, ctx: &CallContext, id: UserId) -> Result<User> {
        ctx.ensure_active()?;
        self.load(id).await
    }

    async fn find_by_email(&self, ctx: &CallContext, email: &str) -> Result<Option<User>> {
        ctx.ensure_active()?;
        let Ok(email) = normalize_email(email) else {
            return Ok(None);
        };
        let page = self.repo.list(&ListQuery::new().filter("email", email)).await?;
        Ok(page.items.into_iter().next())
    }

    async fn update(&self, ctx: &CallContext, id: UserId, patch: UserPatch) -> Result<Committed<User>> {
        ctx.ensure_active()?;

        let current = self.load(id).await?;
        let mut proposed = current.clone();
        if let Some(name) = patch.display_name {
            proposed.display_name = normalize_display_name(&name)?;
        }
        if let Some(status) = patch.status {
            proposed.status = status;
        }
        if let Some(roles) = patch.roles {
            proposed.roles = roles;
        }
        if let Some(permissions) = patch.permissions {
            proposed.permissions = permissions;
        }
        proposed.updated_at = self.clock.now();

        self.hooks
            .fire(
                Phase::Before,
                ctx,
                &UserUpdating {
                    current,
                    proposed: proposed.clone(),
                },
            )
            .await?;
        let user = self.repo.update(proposed).await?;

        let warnings = self
            .hooks
            .fire(Phase::After, ctx, &UserUpdated { user: user.clone() })
            .await?;
        Ok(Committed::new(user, warnings))
    }

    async fn delete(&self, ctx: &CallContext, id: UserId) -> Result<Committed<()>> {
        ctx.ensure_active()?;

        let user = self.load(id).await?;
        self.hooks
            .fire(Phase::Before, ctx, &UserDeleting { user: user.clone() })
            .await?;
        if !self.repo.delete(&id).await? {
            return Err(Error::NotFound);
        }
        info!(user_id = %id, "user deleted");

        let warnings = self
            .hooks
            .fire(Phase::After, ctx, &UserDeleted { user })
            .await?;
        Ok(Committed::new((), warnings))
    }

    async fn list(&self, ctx: &CallContext, query: &ListQuery) -> Result<Page<User>> {
        ctx.ensure_active()?;
        self.repo.list(query).await
    }
}
