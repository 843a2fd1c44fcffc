use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use warden_auth::StrategyDispatcher;
use warden_core::{CallContext, Clock, Result, SystemClock};
use warden_hooks::HookRegistry;
use warden_identity::{
    ApiKeyPlugin, IdentityPlugin, IdentityStores, OneTimeCodeSlot, SessionPlugin, SessionSlot,
    TrustPlugin, TrustedDeviceSlot,
};
use warden_infra::InMemoryRepository;
use warden_observability::{AuthMetrics, TracingMetrics};
use warden_registry::{PluginHost, RegistryBuilder, Runtime, ServiceRegistry};
use warden_tenancy::OrganizationPlugin;

use crate::ApiConfig;

fn in_memory_stores() -> IdentityStores {
    IdentityStores {
        users: Arc::new(InMemoryRepository::new()),
        organizations: Arc::new(InMemoryRepository::new()),
        memberships: Arc::new(InMemoryRepository::new()),
        sessions: Arc::new(InMemoryRepository::new()),
        api_keys: Arc::new(InMemoryRepository::new()),
    }
}

/// Bootstrap identity, sessions, API keys, trust and tenancy over in-memory
/// stores.
pub fn build_runtime(config: &ApiConfig) -> Result<Runtime> {
    build_runtime_with_clock(config, Arc::new(SystemClock))
}

pub fn build_runtime_with_clock(config: &ApiConfig, clock: Arc<dyn Clock>) -> Result<Runtime> {
    let metrics: Arc<dyn AuthMetrics> = Arc::new(TracingMetrics);
    let hooks = Arc::new(HookRegistry::with_metrics(metrics.clone()));

    let identity = IdentityPlugin::new(in_memory_stores(), hooks.clone(), clock.clone())
        .with_session_config(config.sessions.clone())
        .with_api_key_prefix(config.api_keys.prefix.clone());
    let sessions = SessionPlugin::new(clock.clone())
        .with_bearer(config.bearer.clone())
        .with_cookie(config.cookie.clone());
    let api_keys = ApiKeyPlugin::new(config.api_keys.clone(), clock.clone());
    let trust = TrustPlugin::in_memory(clock);
    let tenancy = OrganizationPlugin::new(config.tenancy.clone()).with_metrics(metrics.clone());

    PluginHost::new()
        .with(Arc::new(identity))?
        .with(Arc::new(sessions))?
        .with(Arc::new(api_keys))?
        .with(Arc::new(trust))?
        .with(Arc::new(tenancy))?
        .bootstrap(
            RegistryBuilder::new(),
            hooks,
            StrategyDispatcher::with_metrics(metrics),
        )
}

/// Purge expired sessions and trust records every `every` until the runtime
/// shuts down.
pub fn spawn_expiry_sweeper(
    registry: ServiceRegistry,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(err) = sweep(&registry).await {
                warn!(error = %err, "expiry sweeper stopped");
                return;
            }
        }
    })
}

/// One sweep. Only a missing slot is fatal; storage errors are logged and
/// retried on the next tick.
async fn sweep(registry: &ServiceRegistry) -> Result<()> {
    let sessions = registry.get::<SessionSlot>()?;
    let devices = registry.get::<TrustedDeviceSlot>()?;
    let codes = registry.get::<OneTimeCodeSlot>()?;

    match sessions.purge_expired(&CallContext::new()).await {
        Ok(0) => {}
        Ok(removed) => info!(removed, "session sweep"),
        Err(err) => warn!(error = %err, "session sweep failed"),
    }
    if let Err(err) = devices.cleanup().await {
        warn!(error = %err, "trusted device sweep failed");
    }
    if let Err(err) = codes.cleanup().await {
        warn!(error = %err, "one-time code sweep failed");
    }
    Ok(())
}
