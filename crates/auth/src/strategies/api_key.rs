//! API keys, from `X-API-Key` or `Authorization: Bearer wdn_...`.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;

use warden_core::{CallContext, Clock, Error, Result};

use crate::credential::{digest, digests_match};
use crate::{
    ApiKeyLookup, AuthContext, AuthMethod, AuthStrategy, Credential, RequestAccessor,
    SubjectLookup, parse_api_key,
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApiKeyConfig {
    pub header: String,
    pub prefix: String,
    /// Also accept keys sent as `Authorization: Bearer <prefix>...`.
    pub accept_bearer: bool,
    pub priority: i32,
}

impl Default for ApiKeyConfig {
    fn default() -> Self {
        Self {
            header: "X-API-Key".to_string(),
            prefix: "wdn_".to_string(),
            accept_bearer: true,
            priority: 10,
        }
    }
}

pub struct ApiKeyStrategy {
    config: ApiKeyConfig,
    keys: Arc<dyn ApiKeyLookup>,
    subjects: Arc<dyn SubjectLookup>,
    clock: Arc<dyn Clock>,
}

impl ApiKeyStrategy {
    pub const ID: &'static str = "api_key";

    pub fn new(
        config: ApiKeyConfig,
        keys: Arc<dyn ApiKeyLookup>,
        subjects: Arc<dyn SubjectLookup>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            keys,
            subjects,
            clock,
        }
    }

    fn bearer_value(&self, request: &dyn RequestAccessor) -> Option<String> {
        let value = request.header("Authorization")?;
        let (scheme, rest) = value.trim().split_once(char::is_whitespace)?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let rest = rest.trim();
        rest.starts_with(self.config.prefix.as_str())
            .then(|| rest.to_string())
    }
}

#[async_trait]
impl AuthStrategy for ApiKeyStrategy {
    fn id(&self) -> &str {
        Self::ID
    }

    fn priority(&self) -> i32 {
        self.config.priority
    }

    fn extract(&self, request: &dyn RequestAccessor) -> Option<Credential> {
        let raw = match request.header(&self.config.header) {
            Some(value) => value,
            None if self.config.accept_bearer => self.bearer_value(request)?,
            None => return None,
        };

        let (key_id, secret) = parse_api_key(&self.config.prefix, &raw)?;
        Some(Credential::ApiKey { key_id, secret })
    }

    async fn authenticate(&self, ctx: &CallContext, credential: Credential) -> Result<AuthContext> {
        ctx.ensure_active()?;

        let Credential::ApiKey { key_id, secret } = credential else {
            return Err(Error::invalid_credential("api_key expects a key"));
        };

        let key = self
            .keys
            .find_key(ctx, &key_id)
            .await?
            .ok_or_else(|| Error::invalid_credential("unknown api key"))?;

        if !digests_match(&key.secret_digest, &digest(secret.expose_secret())) {
            return Err(Error::invalid_credential("api key secret mismatch"));
        }
        if key.is_expired(self.clock.now()) {
            return Err(Error::invalid_credential("api key expired"));
        }

        let subject = self
            .subjects
            .find_subject(ctx, key.user_id, key.organization_id)
            .await?
            .filter(|s| s.active)
            .ok_or(Error::UserNotFound)?;

        Ok(AuthContext::builder(subject.id, AuthMethod::API_KEY)
            .app_id(key.app_id)
            .organization_id(key.organization_id)
            .environment_id(key.environment_id)
            .roles(subject.roles)
            .permissions(key.permissions)
            .build())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::{Duration, Utc};

    use warden_core::{ErrorKind, ManualClock, OrganizationId, UserId};

    use super::*;
    use crate::session::testing::Fixture;
    use crate::{ApiKey, Permission, Role, SimpleRequest, Subject};

    #[derive(Default)]
    struct Keys(Mutex<HashMap<String, ApiKey>>);

    #[async_trait]
    impl ApiKeyLookup for Keys {
        async fn find_key(&self, _ctx: &CallContext, key_id: &str) -> Result<Option<ApiKey>> {
            Ok(self.0.lock().unwrap().get(key_id).cloned())
        }
    }

    struct Setup {
        strategy: ApiKeyStrategy,
        clock: Arc<ManualClock>,
        user_id: UserId,
    }

    fn setup(expires_in: Option<Duration>) -> Setup {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let user_id = UserId::new();
        let subjects = Arc::new(Fixture::default());
        subjects.subjects.lock().unwrap().insert(
            user_id,
            Subject {
                id: user_id,
                roles: vec![Role::OWNER],
                permissions: vec![Permission::WILDCARD],
                active: true,
            },
        );

        let keys = Arc::new(Keys::default());
        keys.0.lock().unwrap().insert(
            "k1".to_string(),
            ApiKey {
                key_id: "k1".to_string(),
                name: "ci".to_string(),
                secret_digest: digest("s3cret"),
                user_id,
                app_id: None,
                organization_id: Some(OrganizationId::new()),
                environment_id: None,
                permissions: vec![Permission::new("users.read")],
                created_at: clock.now(),
                expires_at: expires_in.map(|d| clock.now() + d),
            },
        );

        Setup {
            strategy: ApiKeyStrategy::new(ApiKeyConfig::default(), keys, subjects, clock.clone()),
            clock,
            user_id,
        }
    }

    #[test]
    fn extracts_from_header_or_prefixed_bearer() {
        let s = setup(None).strategy;

        let header = SimpleRequest::new().with_header("X-API-Key", "wdn_k1.s3cret");
        assert!(matches!(s.extract(&header), Some(Credential::ApiKey { key_id, .. }) if key_id == "k1"));

        let bearer = SimpleRequest::new().with_header("Authorization", "Bearer wdn_k1.s3cret");
        assert!(s.extract(&bearer).is_some());

        let session = SimpleRequest::new().with_header("Authorization", "Bearer session-token");
        assert!(s.extract(&session).is_none());

        let malformed = SimpleRequest::new().with_header("X-API-Key", "k1.s3cret");
        assert!(s.extract(&malformed).is_none());
    }

    #[tokio::test]
    async fn valid_key_carries_key_permissions_not_owner_permissions() {
        let Setup {
            strategy, user_id, ..
        } = setup(None);
        let credential = strategy
            .extract(&SimpleRequest::new().with_header("X-API-Key", "wdn_k1.s3cret"))
            .unwrap();

        let auth = strategy
            .authenticate(&CallContext::new(), credential)
            .await
            .unwrap();
        assert_eq!(auth.subject_id(), Some(user_id));
        assert_eq!(auth.method(), Some(&AuthMethod::API_KEY));
        assert!(auth.has_permission(&Permission::new("users.read")));
        assert!(!auth.has_permission(&Permission::new("users.write")));
        assert!(auth.has_role(&Role::OWNER));
    }

    #[tokio::test]
    async fn wrong_secret_unknown_key_and_expiry_are_invalid_credentials() {
        let Setup {
            strategy, clock, ..
        } = setup(Some(Duration::minutes(5)));
        let ctx = CallContext::new();

        for raw in ["wdn_k1.wrong", "wdn_k2.s3cret"] {
            let credential = strategy
                .extract(&SimpleRequest::new().with_header("X-API-Key", raw))
                .unwrap();
            let err = strategy.authenticate(&ctx, credential).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidCredential, "{raw}");
        }

        clock.advance(Duration::minutes(5));
        let credential = strategy
            .extract(&SimpleRequest::new().with_header("X-API-Key", "wdn_k1.s3cret"))
            .unwrap();
        let err = strategy.authenticate(&ctx, credential).await.unwrap_err();
        assert_eq!(err, Error::invalid_credential("api key expired"));
    }
}
