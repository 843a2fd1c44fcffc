//! Plugin bootstrap.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use warden_auth::StrategyDispatcher;
use warden_core::{CallContext, Error, Result};
use warden_hooks::HookRegistry;

use crate::{RegistryBuilder, ServiceRegistry};

/// An extension that contributes services, decorators, hooks and strategies.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique across the host.
    fn id(&self) -> &str;

    /// Called once, in registration order, during bootstrap.
    fn init(
        &self,
        services: &mut RegistryBuilder,
        hooks: &HookRegistry,
        strategies: &mut StrategyDispatcher,
    ) -> Result<()>;

    /// Schema setup for plugins that own storage.
    async fn migrate(&self, _ctx: &CallContext) -> Result<()> {
        Ok(())
    }
}

/// Ordered plugin list; consumed by [`PluginHost::bootstrap`].
#[derive(Default)]
pub struct PluginHost {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> Result<()> {
        if self.plugins.iter().any(|p| p.id() == plugin.id()) {
            return Err(Error::DuplicatePluginId(plugin.id().to_string()));
        }
        self.plugins.push(plugin);
        Ok(())
    }

    pub fn with(mut self, plugin: Arc<dyn Plugin>) -> Result<Self> {
        self.register(plugin)?;
        Ok(self)
    }

    pub fn plugin_ids(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.id()).collect()
    }

    /// Initialize every plugin, then freeze services and hooks.
    ///
    /// The first failing `init` aborts bootstrap.
    pub fn bootstrap(
        self,
        mut services: RegistryBuilder,
        hooks: Arc<HookRegistry>,
        mut strategies: StrategyDispatcher,
    ) -> Result<Runtime> {
        for plugin in &self.plugins {
            info!(plugin = plugin.id(), "initializing plugin");
            plugin.init(&mut services, &hooks, &mut strategies)?;
        }

        hooks.seal();
        let registry = services.seal();
        info!(
            plugins = self.plugins.len(),
            strategies = ?strategies.strategy_ids(),
            slots = ?registry.slots(),
            "bootstrap complete"
        );

        Ok(Runtime {
            registry,
            hooks,
            dispatcher: Arc::new(strategies),
            plugins: self.plugins,
        })
    }
}

/// Everything a serving process needs after bootstrap.
#[derive(Clone)]
pub struct Runtime {
    pub registry: ServiceRegistry,
    pub hooks: Arc<HookRegistry>,
    pub dispatcher: Arc<StrategyDispatcher>,
    plugins: Vec<Arc<dyn Plugin>>,
}

impl core::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Runtime")
            .field("registry", &self.registry)
            .field("dispatcher", &self.dispatcher)
            .field("plugins", &self.plugin_ids())
            .finish()
    }
}

impl Runtime {
    /// Run every plugin's `migrate`, in registration order.
    pub async fn migrate(&self, ctx: &CallContext) -> Result<()> {
        for plugin in &self.plugins {
            ctx.ensure_active()?;
            info!(plugin = plugin.id(), "running plugin migrations");
            plugin.migrate(ctx).await?;
        }
        Ok(())
    }

    pub fn plugin_ids(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.id()).collect()
    }
}
