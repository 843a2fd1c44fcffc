//! Trusted devices and one-time codes as registry services.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use warden_auth::StrategyDispatcher;
use warden_core::{CallContext, Clock, Result};
use warden_hooks::{HookListener, HookRegistry, Phase};
use warden_registry::{Plugin, RegistryBuilder, ServiceSlot};
use warden_trust::{
    CodeDigest, DeviceInfo, InMemoryTrustBackend, OneTimeCodes, TrustBackend, TrustedDevices,
    TtlPolicy,
};

use crate::UserDeleted;

pub type DeviceTrust = TrustedDevices<Arc<dyn TrustBackend<DeviceInfo>>>;
pub type CodeTrust = OneTimeCodes<Arc<dyn TrustBackend<CodeDigest>>>;

pub struct TrustedDeviceSlot;

impl ServiceSlot for TrustedDeviceSlot {
    type Service = DeviceTrust;
    const NAME: &'static str = "trusted_devices";
}

pub struct OneTimeCodeSlot;

impl ServiceSlot for OneTimeCodeSlot {
    type Service = CodeTrust;
    const NAME: &'static str = "one_time_codes";
}

/// Forgets a deleted user's devices.
struct ForgetDevices(Arc<DeviceTrust>);

#[async_trait]
impl HookListener<UserDeleted> for ForgetDevices {
    async fn call(&self, _ctx: &CallContext, event: &UserDeleted) -> Result<()> {
        self.0.revoke_all(event.user.id).await.map(|_| ())
    }
}

/// Provides the trusted-device and one-time-code slots.
pub struct TrustPlugin {
    devices: Arc<dyn TrustBackend<DeviceInfo>>,
    codes: Arc<dyn TrustBackend<CodeDigest>>,
    device_policy: TtlPolicy,
    code_policy: TtlPolicy,
    clock: Arc<dyn Clock>,
}

impl TrustPlugin {
    pub const ID: &'static str = "trust";

    pub fn new(
        devices: Arc<dyn TrustBackend<DeviceInfo>>,
        codes: Arc<dyn TrustBackend<CodeDigest>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            devices,
            codes,
            device_policy: TtlPolicy::trusted_devices(),
            code_policy: TtlPolicy::one_time_codes(),
            clock,
        }
    }

    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::new(
            Arc::new(InMemoryTrustBackend::new()),
            Arc::new(InMemoryTrustBackend::new()),
            clock,
        )
    }

    pub fn with_device_policy(mut self, policy: TtlPolicy) -> Self {
        self.device_policy = policy;
        self
    }

    pub fn with_code_policy(mut self, policy: TtlPolicy) -> Self {
        self.code_policy = policy;
        self
    }
}

#[async_trait]
impl Plugin for TrustPlugin {
    fn id(&self) -> &str {
        Self::ID
    }

    fn init(
        &self,
        services: &mut RegistryBuilder,
        hooks: &HookRegistry,
        _strategies: &mut StrategyDispatcher,
    ) -> Result<()> {
        let devices = Arc::new(TrustedDevices::new(
            self.devices.clone(),
            self.device_policy,
            self.clock.clone(),
        ));
        services.provide::<TrustedDeviceSlot>(devices.clone())?;
        services.provide::<OneTimeCodeSlot>(Arc::new(OneTimeCodes::new(
            self.codes.clone(),
            self.code_policy,
            self.clock.clone(),
        )))?;

        hooks.listen::<UserDeleted>(
            Phase::After,
            "trusted_devices.revoke_all",
            Arc::new(ForgetDevices(devices)),
        )?;
        info!("trust services provided");
        Ok(())
    }
}
