//! `Authorization: Bearer <token>` session tokens.

use async_trait::async_trait;
use serde::Deserialize;

use warden_core::{CallContext, Error, Result};

use crate::{AuthContext, AuthMethod, AuthStrategy, Credential, RequestAccessor, SessionAuthenticator};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BearerConfig {
    pub header: String,
    pub scheme: String,
    pub case_sensitive_scheme: bool,
    /// Token prefixes owned by other strategies (API keys by default).
    pub foreign_prefixes: Vec<String>,
    pub priority: i32,
}

impl Default for BearerConfig {
    fn default() -> Self {
        Self {
            header: "Authorization".to_string(),
            scheme: "Bearer".to_string(),
            case_sensitive_scheme: false,
            foreign_prefixes: vec!["wdn_".to_string()],
            priority: 20,
        }
    }
}

impl BearerConfig {
    /// The token part of a header value, if it uses the configured scheme.
    pub fn token_from(&self, value: &str) -> Option<String> {
        let value = value.trim_start();
        let scheme_len = self.scheme.len();
        let scheme = value.get(..scheme_len)?;

        let matches = if self.case_sensitive_scheme {
            scheme == self.scheme
        } else {
            scheme.eq_ignore_ascii_case(&self.scheme)
        };
        if !matches {
            return None;
        }

        let rest = &value[scheme_len..];
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }

        let token = rest.trim();
        if token.is_empty() {
            return None;
        }
        if self.foreign_prefixes.iter().any(|p| token.starts_with(p.as_str())) {
            return None;
        }

        Some(token.to_string())
    }
}

pub struct BearerStrategy {
    config: BearerConfig,
    sessions: SessionAuthenticator,
}

impl BearerStrategy {
    pub const ID: &'static str = "bearer";

    pub fn new(config: BearerConfig, sessions: SessionAuthenticator) -> Self {
        Self { config, sessions }
    }
}

#[async_trait]
impl AuthStrategy for BearerStrategy {
    fn id(&self) -> &str {
        Self::ID
    }

    fn priority(&self) -> i32 {
        self.config.priority
    }

    fn extract(&self, request: &dyn RequestAccessor) -> Option<Credential> {
        let value = request.header(&self.config.header)?;
        self.config.token_from(&value).map(Credential::token)
    }

    async fn authenticate(&self, ctx: &CallContext, credential: Credential) -> Result<AuthContext> {
        let Credential::Token(token) = credential else {
            return Err(Error::invalid_credential("bearer expects a token"));
        };
        self.sessions
            .authenticate(ctx, &token, AuthMethod::BEARER)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use secrecy::ExposeSecret;

    use warden_core::{Clock, ErrorKind, ManualClock};

    use super::*;
    use crate::SimpleRequest;
    use crate::session::testing::{Fixture, authenticator};

    fn token(config: &BearerConfig, value: &str) -> Option<String> {
        config.token_from(value)
    }

    #[test]
    fn extracts_trimmed_token_case_insensitively() {
        let config = BearerConfig::default();
        assert_eq!(token(&config, "Bearer abc").as_deref(), Some("abc"));
        assert_eq!(token(&config, "bearer   abc  ").as_deref(), Some("abc"));
        assert_eq!(token(&config, "BEARER\tabc").as_deref(), Some("abc"));
    }

    #[test]
    fn rejects_wrong_scheme_empty_token_and_foreign_prefixes() {
        let config = BearerConfig::default();
        assert!(token(&config, "Basic abc").is_none());
        assert!(token(&config, "Bearer").is_none());
        assert!(token(&config, "Bearer    ").is_none());
        assert!(token(&config, "Bearerabc").is_none());
        assert!(token(&config, "Bearer wdn_k1.secret").is_none());
        assert!(token(&config, "Béarer abc").is_none());
    }

    #[test]
    fn case_sensitive_scheme_when_configured() {
        let config = BearerConfig {
            case_sensitive_scheme: true,
            ..BearerConfig::default()
        };
        assert!(token(&config, "bearer abc").is_none());
        assert_eq!(token(&config, "Bearer abc").as_deref(), Some("abc"));
    }

    #[test]
    fn custom_header_and_scheme() {
        let config = BearerConfig {
            header: "X-Session".to_string(),
            scheme: "Token".to_string(),
            ..BearerConfig::default()
        };
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let strategy = BearerStrategy::new(
            config,
            authenticator(Arc::new(Fixture::default()), clock),
        );

        let request = SimpleRequest::new()
            .with_header("Authorization", "Bearer abc")
            .with_header("x-session", "Token xyz");
        let Some(Credential::Token(t)) = strategy.extract(&request) else {
            panic!("expected token");
        };
        assert_eq!(t.expose_secret(), "xyz");
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: BearerConfig =
            serde_json::from_str(r#"{"case_sensitive_scheme": true}"#).unwrap();
        assert!(config.case_sensitive_scheme);
        assert_eq!(config.header, "Authorization");
        assert_eq!(config.priority, 20);
    }

    #[tokio::test]
    async fn authenticates_known_session() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let fixture = Arc::new(Fixture::default());
        let (user_id, _) = fixture.seed("tok", clock.now());
        let strategy = BearerStrategy::new(BearerConfig::default(), authenticator(fixture, clock));

        let auth = strategy
            .authenticate(&CallContext::new(), Credential::token("tok"))
            .await
            .unwrap();
        assert_eq!(auth.subject_id(), Some(user_id));
        assert_eq!(auth.method(), Some(&AuthMethod::BEARER));

        let err = strategy
            .authenticate(&CallContext::new(), Credential::token("other"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionNotFound);
    }
}
