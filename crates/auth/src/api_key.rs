//! API key records and the `wdn_<key_id>.<secret>` wire form.

use std::borrow::Cow;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use warden_core::{AppId, CallContext, Entity, EnvironmentId, OrganizationId, Result, UserId};

use crate::Permission;

/// Stored API key. Only the digest of the secret half is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub key_id: String,
    pub name: String,
    pub secret_digest: String,
    pub user_id: UserId,
    pub app_id: Option<AppId>,
    pub organization_id: Option<OrganizationId>,
    pub environment_id: Option<EnvironmentId>,
    /// Permissions granted to requests made with this key. The owner's own
    /// permissions are not inherited.
    pub permissions: Vec<Permission>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl Entity for ApiKey {
    type Id = String;
    const RESOURCE: &'static str = "api_key";

    fn id(&self) -> &Self::Id {
        &self.key_id
    }

    fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "user_id" => Some(Cow::Owned(self.user_id.to_string())),
            "name" => Some(Cow::Borrowed(&self.name)),
            _ => None,
        }
    }
}

#[async_trait]
pub trait ApiKeyLookup: Send + Sync {
    async fn find_key(&self, ctx: &CallContext, key_id: &str) -> Result<Option<ApiKey>>;
}

/// Split `<prefix><key_id>.<secret>` into its halves.
///
/// Returns `None` when the prefix is missing or either half is empty; the key
/// id must be ASCII alphanumeric.
pub fn parse_api_key(prefix: &str, raw: &str) -> Option<(String, SecretString)> {
    let rest = raw.trim().strip_prefix(prefix)?;
    let (key_id, secret) = rest.split_once('.')?;

    if key_id.is_empty() || secret.is_empty() {
        return None;
    }
    if !key_id.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }

    Some((key_id.to_string(), SecretString::from(secret.to_string())))
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn parses_well_formed_keys() {
        let (id, secret) = parse_api_key("wdn_", "wdn_ab12.s3cr3t.with.dots").unwrap();
        assert_eq!(id, "ab12");
        assert_eq!(secret.expose_secret(), "s3cr3t.with.dots");
    }

    #[test]
    fn rejects_malformed_keys() {
        for raw in ["ab12.secret", "wdn_", "wdn_ab12", "wdn_.secret", "wdn_ab12.", "wdn_a-b.s"] {
            assert!(parse_api_key("wdn_", raw).is_none(), "{raw}");
        }
    }

    proptest::proptest! {
        #[test]
        fn never_panics_on_arbitrary_input(raw in ".*") {
            let _ = parse_api_key("wdn_", &raw);
        }
    }
}
