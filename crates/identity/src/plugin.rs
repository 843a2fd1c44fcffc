//! Plugins wiring the identity services and their strategies.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use warden_auth::{
    ApiKey, ApiKeyConfig, ApiKeyStrategy, AuthStrategy, BearerConfig, BearerStrategy,
    CookieConfig, CookieStrategy, Session, SessionAuthenticator, StrategyDispatcher,
};
use warden_core::{CallContext, Clock, Error, Repository, Result};
use warden_hooks::{HookListener, HookRegistry, Phase};
use warden_registry::{Plugin, RegistryBuilder};

use crate::lookup::{ApiKeyLookupAdapter, DirectorySubjects, SessionLookupAdapter};
use crate::{
    ApiKeySlot, ApiKeyService, CoreApiKeyService, CoreMembershipService, CoreOrganizationService,
    CoreSessionService, CoreUserService, Membership, MembershipSlot, Organization,
    OrganizationSlot, SessionConfig, SessionService, SessionSlot, User, UserDeleted, UserSlot,
};

/// Backing repositories for the identity services.
#[derive(Clone)]
pub struct IdentityStores {
    pub users: Arc<dyn Repository<User>>,
    pub organizations: Arc<dyn Repository<Organization>>,
    pub memberships: Arc<dyn Repository<Membership>>,
    pub sessions: Arc<dyn Repository<Session>>,
    pub api_keys: Arc<dyn Repository<ApiKey>>,
}

/// Provides the core user, organization, membership, session and API-key
/// services.
pub struct IdentityPlugin {
    stores: IdentityStores,
    hooks: Arc<HookRegistry>,
    clock: Arc<dyn Clock>,
    sessions: SessionConfig,
    api_key_prefix: String,
}

impl IdentityPlugin {
    pub const ID: &'static str = "identity";

    /// `hooks` must be the registry later handed to bootstrap; the user
    /// service fires its lifecycle events through it.
    pub fn new(stores: IdentityStores, hooks: Arc<HookRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            stores,
            hooks,
            clock,
            sessions: SessionConfig::default(),
            api_key_prefix: ApiKeyConfig::default().prefix,
        }
    }

    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.sessions = config;
        self
    }

    pub fn with_api_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_key_prefix = prefix.into();
        self
    }
}

#[async_trait]
impl Plugin for IdentityPlugin {
    fn id(&self) -> &str {
        Self::ID
    }

    fn init(
        &self,
        services: &mut RegistryBuilder,
        hooks: &HookRegistry,
        _strategies: &mut StrategyDispatcher,
    ) -> Result<()> {
        if !std::ptr::eq(Arc::as_ptr(&self.hooks), hooks) {
            return Err(Error::conflict(
                "identity plugin is bound to a different hook registry",
            ));
        }

        let stores = self.stores.clone();
        services.provide::<UserSlot>(Arc::new(CoreUserService::new(
            stores.users,
            self.hooks.clone(),
            self.clock.clone(),
        )))?;
        services.provide::<OrganizationSlot>(Arc::new(CoreOrganizationService::new(
            stores.organizations,
            self.clock.clone(),
        )))?;
        services.provide::<MembershipSlot>(Arc::new(CoreMembershipService::new(
            stores.memberships,
            self.clock.clone(),
        )))?;
        services.provide::<SessionSlot>(Arc::new(CoreSessionService::new(
            stores.sessions,
            self.clock.clone(),
            self.sessions.clone(),
        )))?;
        services.provide::<ApiKeySlot>(Arc::new(CoreApiKeyService::new(
            stores.api_keys,
            self.clock.clone(),
            self.api_key_prefix.clone(),
        )))?;

        info!("identity services provided");
        Ok(())
    }
}

fn subjects(services: &RegistryBuilder) -> Result<Arc<DirectorySubjects>> {
    Ok(Arc::new(DirectorySubjects::new(
        services.get::<UserSlot>()?,
        services.get::<MembershipSlot>()?,
    )))
}

/// Revokes a deleted user's sessions.
struct RevokeSessions(Arc<dyn SessionService>);

#[async_trait]
impl HookListener<UserDeleted> for RevokeSessions {
    async fn call(&self, ctx: &CallContext, event: &UserDeleted) -> Result<()> {
        self.0.revoke_all_for_user(ctx, event.user.id).await.map(|_| ())
    }
}

/// Bearer and cookie strategies over the session slot.
pub struct SessionPlugin {
    bearer: BearerConfig,
    cookie: Option<CookieConfig>,
    clock: Arc<dyn Clock>,
}

impl SessionPlugin {
    pub const ID: &'static str = "sessions";

    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            bearer: BearerConfig::default(),
            cookie: Some(CookieConfig::default()),
            clock,
        }
    }

    pub fn with_bearer(mut self, config: BearerConfig) -> Self {
        self.bearer = config;
        self
    }

    /// `None` disables the cookie strategy.
    pub fn with_cookie(mut self, config: Option<CookieConfig>) -> Self {
        self.cookie = config;
        self
    }
}

#[async_trait]
impl Plugin for SessionPlugin {
    fn id(&self) -> &str {
        Self::ID
    }

    fn init(
        &self,
        services: &mut RegistryBuilder,
        hooks: &HookRegistry,
        strategies: &mut StrategyDispatcher,
    ) -> Result<()> {
        let sessions = services.get::<SessionSlot>()?;
        let authenticator = SessionAuthenticator::new(
            Arc::new(SessionLookupAdapter(sessions.clone())),
            subjects(services)?,
            self.clock.clone(),
        );

        strategies.register(Arc::new(BearerStrategy::new(
            self.bearer.clone(),
            authenticator.clone(),
        )))?;
        if let Some(cookie) = &self.cookie {
            strategies.register(Arc::new(CookieStrategy::new(cookie.clone(), authenticator)))?;
        }

        hooks.listen::<UserDeleted>(
            Phase::After,
            "sessions.revoke_all",
            Arc::new(RevokeSessions(sessions)),
        )
    }
}

/// API-key strategy over the API-key slot.
pub struct ApiKeyPlugin {
    config: ApiKeyConfig,
    clock: Arc<dyn Clock>,
}

impl ApiKeyPlugin {
    pub const ID: &'static str = "api_keys";

    pub fn new(config: ApiKeyConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }
}

#[async_trait]
impl Plugin for ApiKeyPlugin {
    fn id(&self) -> &str {
        Self::ID
    }

    fn init(
        &self,
        services: &mut RegistryBuilder,
        _hooks: &HookRegistry,
        strategies: &mut StrategyDispatcher,
    ) -> Result<()> {
        let keys: Arc<dyn ApiKeyService> = services.get::<ApiKeySlot>()?;
        let strategy: Arc<dyn AuthStrategy> = Arc::new(ApiKeyStrategy::new(
            self.config.clone(),
            Arc::new(ApiKeyLookupAdapter(keys)),
            subjects(services)?,
            self.clock.clone(),
        ));
        strategies.register(strategy)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use secrecy::ExposeSecret;

    use warden_auth::{AuthMethod, Permission, Role, SimpleRequest};
    use warden_core::{ErrorKind, ManualClock};
    use warden_infra::InMemoryRepository;
    use warden_registry::{PluginHost, Runtime};

    use super::*;
    use crate::{NewApiKey, NewOrganization, NewUser, SessionScope};

    fn stores() -> IdentityStores {
        IdentityStores {
            users: Arc::new(InMemoryRepository::new()),
            organizations: Arc::new(InMemoryRepository::new()),
            memberships: Arc::new(InMemoryRepository::new()),
            sessions: Arc::new(InMemoryRepository::new()),
            api_keys: Arc::new(InMemoryRepository::new()),
        }
    }

    fn runtime() -> Runtime {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
        let hooks = Arc::new(HookRegistry::new());
        PluginHost::new()
            .with(Arc::new(IdentityPlugin::new(stores(), hooks.clone(), clock.clone())))
            .unwrap()
            .with(Arc::new(SessionPlugin::new(clock.clone())))
            .unwrap()
            .with(Arc::new(ApiKeyPlugin::new(ApiKeyConfig::default(), clock)))
            .unwrap()
            .bootstrap(RegistryBuilder::new(), hooks, StrategyDispatcher::new())
            .unwrap()
    }

    #[tokio::test]
    async fn bootstrap_registers_strategies_in_priority_order() {
        let runtime = runtime();
        assert_eq!(runtime.dispatcher.strategy_ids(), vec!["api_key", "bearer", "cookie"]);
        assert_eq!(
            runtime.registry.slots(),
            vec!["api_keys", "memberships", "organizations", "sessions", "users"]
        );
    }

    #[tokio::test]
    async fn session_token_authenticates_via_bearer_and_cookie() {
        let runtime = runtime();
        let ctx = CallContext::new();
        let users = runtime.registry.get::<UserSlot>().unwrap();
        let orgs = runtime.registry.get::<OrganizationSlot>().unwrap();
        let members = runtime.registry.get::<MembershipSlot>().unwrap();
        let sessions = runtime.registry.get::<SessionSlot>().unwrap();

        let user = users
            .create(&ctx, NewUser::new("a@b.c", "A"))
            .await
            .unwrap()
            .into_inner();
        let org = orgs
            .create(
                &ctx,
                NewOrganization {
                    name: "Acme".to_string(),
                    slug: "acme".to_string(),
                },
            )
            .await
            .unwrap();
        members
            .add(&ctx, org.id, user.id, Role::MEMBER)
            .await
            .unwrap();
        let issued = sessions
            .issue(&ctx, user.id, SessionScope::organization(org.id))
            .await
            .unwrap();

        let request = SimpleRequest::new().with_header(
            "Authorization",
            format!("Bearer {}", issued.token.expose_secret()),
        );
        let auth = runtime.dispatcher.resolve(&ctx, &request).await.require().unwrap();
        assert_eq!(auth.subject_id(), Some(user.id));
        assert_eq!(auth.organization_id(), Some(org.id));
        assert_eq!(auth.method(), Some(&AuthMethod::BEARER));

        let request =
            SimpleRequest::new().with_cookie("warden_session", issued.token.expose_secret());
        let auth = runtime.dispatcher.resolve(&ctx, &request).await.require().unwrap();
        assert_eq!(auth.method(), Some(&AuthMethod::COOKIE));
    }

    #[tokio::test]
    async fn deleting_a_user_revokes_their_sessions() {
        let runtime = runtime();
        let ctx = CallContext::new();
        let users = runtime.registry.get::<UserSlot>().unwrap();
        let sessions = runtime.registry.get::<SessionSlot>().unwrap();

        let user = users
            .create(&ctx, NewUser::new("a@b.c", "A"))
            .await
            .unwrap()
            .into_inner();
        let issued = sessions
            .issue(&ctx, user.id, SessionScope::default())
            .await
            .unwrap();

        let deleted = users.delete(&ctx, user.id).await.unwrap();
        assert!(deleted.is_clean());

        let request = SimpleRequest::new().with_header(
            "Authorization",
            format!("Bearer {}", issued.token.expose_secret()),
        );
        let resolution = runtime.dispatcher.resolve(&ctx, &request).await;
        assert!(!resolution.is_authenticated());
        assert_eq!(resolution.failures()[0].error.kind(), ErrorKind::SessionNotFound);
    }

    #[tokio::test]
    async fn api_key_authenticates_with_key_permissions() {
        let runtime = runtime();
        let ctx = CallContext::new();
        let users = runtime.registry.get::<UserSlot>().unwrap();
        let keys = runtime.registry.get::<ApiKeySlot>().unwrap();

        let user = users
            .create(&ctx, NewUser::new("a@b.c", "A"))
            .await
            .unwrap()
            .into_inner();
        let issued = keys
            .issue(
                &ctx,
                NewApiKey {
                    permissions: vec![Permission::new("users.read")],
                    ..NewApiKey::new("ci", user.id)
                },
            )
            .await
            .unwrap();

        let request = SimpleRequest::new().with_header("X-API-Key", issued.secret.expose_secret());
        let auth = runtime.dispatcher.resolve(&ctx, &request).await.require().unwrap();
        assert_eq!(auth.method(), Some(&AuthMethod::API_KEY));
        assert!(auth.has_permission(&Permission::new("users.read")));
        assert!(!auth.has_permission(&Permission::new("users.write")));

        // Sent as a bearer token, the key is claimed by the api_key strategy only.
        let request = SimpleRequest::new().with_header(
            "Authorization",
            format!("Bearer {}", issued.secret.expose_secret()),
        );
        let resolution = runtime.dispatcher.resolve(&ctx, &request).await;
        assert!(resolution.is_authenticated());
        assert_eq!(resolution.attempted(), 1);
    }

    #[test]
    fn identity_plugin_rejects_a_foreign_hook_registry() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
        let plugin = IdentityPlugin::new(stores(), Arc::new(HookRegistry::new()), clock);

        let err = PluginHost::new()
            .with(Arc::new(plugin))
            .unwrap()
            .bootstrap(
                RegistryBuilder::new(),
                Arc::new(HookRegistry::new()),
                StrategyDispatcher::new(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
