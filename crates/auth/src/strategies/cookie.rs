//! Session token carried in a cookie.

use async_trait::async_trait;
use serde::Deserialize;

use warden_core::{CallContext, Error, Result};

use crate::{AuthContext, AuthMethod, AuthStrategy, Credential, RequestAccessor, SessionAuthenticator};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    pub name: String,
    pub priority: i32,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "warden_session".to_string(),
            priority: 30,
        }
    }
}

pub struct CookieStrategy {
    config: CookieConfig,
    sessions: SessionAuthenticator,
}

impl CookieStrategy {
    pub const ID: &'static str = "cookie";

    pub fn new(config: CookieConfig, sessions: SessionAuthenticator) -> Self {
        Self { config, sessions }
    }
}

#[async_trait]
impl AuthStrategy for CookieStrategy {
    fn id(&self) -> &str {
        Self::ID
    }

    fn priority(&self) -> i32 {
        self.config.priority
    }

    fn extract(&self, request: &dyn RequestAccessor) -> Option<Credential> {
        let value = request.cookie(&self.config.name)?;
        let value = value.trim();
        (!value.is_empty()).then(|| Credential::token(value))
    }

    async fn authenticate(&self, ctx: &CallContext, credential: Credential) -> Result<AuthContext> {
        let Credential::Token(token) = credential else {
            return Err(Error::invalid_credential("cookie expects a token"));
        };
        self.sessions
            .authenticate(ctx, &token, AuthMethod::COOKIE)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use warden_core::{Clock, ManualClock};

    use super::*;
    use crate::SimpleRequest;
    use crate::session::testing::{Fixture, authenticator};

    fn strategy(config: CookieConfig) -> CookieStrategy {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        CookieStrategy::new(config, authenticator(Arc::new(Fixture::default()), clock))
    }

    #[test]
    fn extracts_configured_cookie_only() {
        let s = strategy(CookieConfig::default());
        assert!(s.extract(&SimpleRequest::new()).is_none());
        assert!(
            s.extract(&SimpleRequest::new().with_cookie("warden_session", "  "))
                .is_none()
        );
        assert!(
            s.extract(&SimpleRequest::new().with_cookie("warden_session", "tok"))
                .is_some()
        );

        let renamed = strategy(CookieConfig {
            name: "sid".to_string(),
            ..CookieConfig::default()
        });
        assert!(
            renamed
                .extract(&SimpleRequest::new().with_cookie("warden_session", "tok"))
                .is_none()
        );
    }

    #[tokio::test]
    async fn authenticates_with_cookie_method() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let fixture = Arc::new(Fixture::default());
        fixture.seed("tok", clock.now());
        let s = CookieStrategy::new(CookieConfig::default(), authenticator(fixture, clock));

        let request = SimpleRequest::new().with_cookie("warden_session", "tok");
        let credential = s.extract(&request).unwrap();
        let auth = s.authenticate(&CallContext::new(), credential).await.unwrap();
        assert_eq!(auth.method(), Some(&AuthMethod::COOKIE));
    }
}
