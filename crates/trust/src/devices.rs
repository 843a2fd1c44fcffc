//! "Remember this device" for two-factor challenges.

use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use warden_core::{Clock, Result, UserId};

use crate::{TrustBackend, TrustRecord, TrustStore, TtlPolicy};

/// What we remember about a trusted device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub label: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// Devices that may skip the second factor until their trust expires.
pub struct TrustedDevices<B> {
    store: TrustStore<DeviceInfo, B>,
}

impl<B> TrustedDevices<B>
where
    B: TrustBackend<DeviceInfo>,
{
    pub const STORE_NAME: &'static str = "trusted_devices";

    pub fn new(backend: B, policy: TtlPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: TrustStore::new(Self::STORE_NAME, backend, policy, clock),
        }
    }

    pub fn from_store(store: TrustStore<DeviceInfo, B>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &TrustStore<DeviceInfo, B> {
        &self.store
    }

    pub async fn trust(
        &self,
        user_id: UserId,
        device_id: &str,
        ttl: Option<Duration>,
        info: DeviceInfo,
    ) -> Result<TrustRecord<DeviceInfo>> {
        self.store
            .mark_trusted(&user_id.to_string(), device_id, ttl, info)
            .await
    }

    pub async fn is_trusted(&self, user_id: UserId, device_id: &str) -> Result<bool> {
        self.store
            .is_trusted(&user_id.to_string(), device_id)
            .await
    }

    /// Whether a login from `device_id` must complete the second factor.
    ///
    /// Users without a second factor are never challenged. A missing device id
    /// is never trusted.
    pub async fn requires_challenge(
        &self,
        user_id: UserId,
        device_id: Option<&str>,
        second_factor_enabled: bool,
    ) -> Result<bool> {
        if !second_factor_enabled {
            return Ok(false);
        }
        match device_id {
            Some(device_id) => Ok(!self.is_trusted(user_id, device_id).await?),
            None => Ok(true),
        }
    }

    pub async fn revoke(&self, user_id: UserId, device_id: &str) -> Result<bool> {
        self.store.revoke(&user_id.to_string(), device_id).await
    }

    /// Forget every device for a user, e.g. after a password change.
    pub async fn revoke_all(&self, user_id: UserId) -> Result<usize> {
        self.store.revoke_all(&user_id.to_string()).await
    }

    pub async fn list(&self, user_id: UserId) -> Result<Vec<TrustRecord<DeviceInfo>>> {
        self.store.list(&user_id.to_string()).await
    }

    pub async fn cleanup(&self) -> Result<usize> {
        self.store.cleanup().await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use warden_core::ManualClock;

    use super::*;
    use crate::InMemoryTrustBackend;

    fn devices(clock: Arc<ManualClock>) -> TrustedDevices<InMemoryTrustBackend<DeviceInfo>> {
        TrustedDevices::new(
            InMemoryTrustBackend::new(),
            TtlPolicy::trusted_devices(),
            clock,
        )
    }

    #[tokio::test]
    async fn trusted_device_skips_challenge_until_expiry() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let devices = devices(clock.clone());
        let user = UserId::new();

        assert!(devices.requires_challenge(user, Some("laptop"), true).await.unwrap());

        devices
            .trust(user, "laptop", None, DeviceInfo::default())
            .await
            .unwrap();
        assert!(!devices.requires_challenge(user, Some("laptop"), true).await.unwrap());
        assert!(devices.requires_challenge(user, Some("phone"), true).await.unwrap());
        assert!(devices.requires_challenge(user, None, true).await.unwrap());

        clock.advance(Duration::days(30));
        assert!(devices.requires_challenge(user, Some("laptop"), true).await.unwrap());
    }

    #[tokio::test]
    async fn no_second_factor_means_no_challenge() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let devices = devices(clock);
        assert!(!devices.requires_challenge(UserId::new(), None, false).await.unwrap());
    }

    #[tokio::test]
    async fn revoke_all_forgets_every_device() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let devices = devices(clock);
        let user = UserId::new();
        for device in ["a", "b"] {
            devices
                .trust(user, device, None, DeviceInfo::default())
                .await
                .unwrap();
        }

        assert_eq!(devices.revoke_all(user).await.unwrap(), 2);
        assert!(devices.list(user).await.unwrap().is_empty());
    }
}
