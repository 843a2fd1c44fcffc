use std::sync::Arc;

use async_trait::async_trait;

use warden_auth::StrategyDispatcher;
use warden_core::{CallContext, Result};
use warden_hooks::{HookListener, HookRegistry, Phase};
use warden_identity::{
    MembershipService, MembershipSlot, OrganizationSlot, UserDeleted, UserService, UserSlot,
};
use warden_observability::{AuthMetrics, NoopMetrics};
use warden_registry::{Plugin, RegistryBuilder};

use crate::{TenancyConfig, TenantUserService};

/// Drops a deleted user's memberships.
struct RemoveMemberships(Arc<dyn MembershipService>);

#[async_trait]
impl HookListener<UserDeleted> for RemoveMemberships {
    async fn call(&self, ctx: &CallContext, event: &UserDeleted) -> Result<()> {
        self.0
            .remove_all_for_user(ctx, event.user.id)
            .await
            .map(|_| ())
    }
}

/// Scopes the user slot to the caller's organization.
pub struct OrganizationPlugin {
    config: TenancyConfig,
    metrics: Arc<dyn AuthMetrics>,
}

impl OrganizationPlugin {
    pub const ID: &'static str = "tenancy";

    pub fn new(config: TenancyConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn AuthMetrics>) -> Self {
        self.metrics = metrics;
        self
    }
}

#[async_trait]
impl Plugin for OrganizationPlugin {
    fn id(&self) -> &str {
        Self::ID
    }

    fn init(
        &self,
        services: &mut RegistryBuilder,
        hooks: &HookRegistry,
        _strategies: &mut StrategyDispatcher,
    ) -> Result<()> {
        let organizations = services.get::<OrganizationSlot>()?;
        let memberships = services.get::<MembershipSlot>()?;

        let config = self.config.clone();
        let metrics = self.metrics.clone();
        let scoped = memberships.clone();
        services.decorate::<UserSlot, _>(Self::ID, move |next| -> Arc<dyn UserService> {
            Arc::new(
                TenantUserService::new(next, organizations, scoped, config).with_metrics(metrics),
            )
        })?;

        hooks.listen::<UserDeleted>(
            Phase::After,
            "tenancy.remove_memberships",
            Arc::new(RemoveMemberships(memberships)),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;

    use warden_auth::Role;
    use warden_core::{
        Clock, Error, ErrorKind, ListQuery, ManualClock, OrganizationId, Page, UserId,
    };
    use warden_hooks::Committed;
    use warden_identity::{
        IdentityPlugin, IdentityStores, NewOrganization, NewUser, User, UserPatch,
    };
    use warden_infra::InMemoryRepository;
    use warden_registry::{PluginHost, Runtime};

    use super::*;

    /// Records the order in which decorator layers see a create.
    struct Trace {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        next: Arc<dyn UserService>,
    }

    #[async_trait]
    impl UserService for Trace {
        async fn create(&self, ctx: &CallContext, input: NewUser) -> Result<Committed<User>> {
            self.log.lock().unwrap().push(format!("{}:pre", self.tag));
            let out = self.next.create(ctx, input).await;
            self.log.lock().unwrap().push(format!("{}:post", self.tag));
            out
        }

        async fn get(&self, ctx: &CallContext, id: UserId) -> Result<User> {
            self.next.get(ctx, id).await
        }

        async fn find_by_email(&self, ctx: &CallContext, email: &str) -> Result<Option<User>> {
            self.next.find_by_email(ctx, email).await
        }

        async fn update(&self, ctx: &CallContext, id: UserId, patch: UserPatch) -> Result<Committed<User>> {
            self.next.update(ctx, id, patch).await
        }

        async fn delete(&self, ctx: &CallContext, id: UserId) -> Result<Committed<()>> {
            self.next.delete(ctx, id).await
        }

        async fn list(&self, ctx: &CallContext, query: &ListQuery) -> Result<Page<User>> {
            self.next.list(ctx, query).await
        }
    }

    struct TracePlugin {
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Plugin for TracePlugin {
        fn id(&self) -> &str {
            "trace"
        }

        fn init(
            &self,
            services: &mut RegistryBuilder,
            _hooks: &HookRegistry,
            _strategies: &mut StrategyDispatcher,
        ) -> Result<()> {
            let log = self.log.clone();
            services.decorate::<UserSlot, _>("trace", move |next| -> Arc<dyn UserService> {
                Arc::new(Trace {
                    tag: "trace",
                    log,
                    next,
                })
            })
        }
    }

    fn runtime(log: Arc<Mutex<Vec<String>>>) -> Runtime {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
        let hooks = Arc::new(HookRegistry::new());
        let stores = IdentityStores {
            users: Arc::new(InMemoryRepository::new()),
            organizations: Arc::new(InMemoryRepository::new()),
            memberships: Arc::new(InMemoryRepository::new()),
            sessions: Arc::new(InMemoryRepository::new()),
            api_keys: Arc::new(InMemoryRepository::new()),
        };

        PluginHost::new()
            .with(Arc::new(IdentityPlugin::new(stores, hooks.clone(), clock)))
            .unwrap()
            .with(Arc::new(OrganizationPlugin::new(TenancyConfig {
                require_organization: true,
                ..TenancyConfig::default()
            })))
            .unwrap()
            .with(Arc::new(TracePlugin { log }))
            .unwrap()
            .bootstrap(RegistryBuilder::new(), hooks, StrategyDispatcher::new())
            .unwrap()
    }

    #[tokio::test]
    async fn decorated_slot_is_marked_and_enforces_organizations() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let runtime = runtime(log.clone());

        assert!(runtime.registry.is_decorated_by::<UserSlot>("tenancy"));
        assert_eq!(runtime.registry.decorators::<UserSlot>(), ["tenancy", "trace"]);

        let users = runtime.registry.get::<UserSlot>().unwrap();
        let err = users
            .create(&CallContext::new(), NewUser::new("a@b.c", "A"))
            .await
            .unwrap_err();
        assert_eq!(err, Error::OrganizationRequired);
        // The outer layer ran; tenancy refused before reaching the core service.
        assert_eq!(*log.lock().unwrap(), vec!["trace:pre", "trace:post"]);

        let err = users
            .create(
                &CallContext::new().with_organization(OrganizationId::new()),
                NewUser::new("a@b.c", "A"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OrganizationInvalid);
    }

    #[tokio::test]
    async fn deleting_a_user_removes_their_memberships() {
        let runtime = runtime(Arc::default());
        let users = runtime.registry.get::<UserSlot>().unwrap();
        let orgs = runtime.registry.get::<OrganizationSlot>().unwrap();
        let memberships = runtime.registry.get::<MembershipSlot>().unwrap();

        let org = orgs
            .create(
                &CallContext::new(),
                NewOrganization {
                    name: "Acme".to_string(),
                    slug: "acme".to_string(),
                },
            )
            .await
            .unwrap();
        let globex = orgs
            .create(
                &CallContext::new(),
                NewOrganization {
                    name: "Globex".to_string(),
                    slug: "globex".to_string(),
                },
            )
            .await
            .unwrap();
        let ctx = CallContext::new().with_organization(org.id);

        let user = users
            .create(&ctx, NewUser::new("a@b.c", "A"))
            .await
            .unwrap()
            .into_inner();
        memberships
            .add(&ctx, globex.id, user.id, Role::OWNER)
            .await
            .unwrap();
        assert_eq!(memberships.list_for_user(&ctx, user.id).await.unwrap().len(), 2);

        let deleted = users.delete(&ctx, user.id).await.unwrap();
        assert!(deleted.is_clean());
        assert!(memberships.list_for_user(&ctx, user.id).await.unwrap().is_empty());
    }
}
