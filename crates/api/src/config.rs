//! Process configuration read from `WARDEN_*` environment variables.

use std::str::FromStr;

use tracing::{info, warn};

use warden_auth::{ApiKeyConfig, BearerConfig, CookieConfig};
use warden_identity::SessionConfig;
use warden_tenancy::TenancyConfig;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub bearer: BearerConfig,
    /// `None` disables cookie authentication.
    pub cookie: Option<CookieConfig>,
    pub api_keys: ApiKeyConfig,
    pub sessions: SessionConfig,
    pub tenancy: TenancyConfig,
    /// Mounts `POST /dev/sessions`, which signs in by email alone.
    pub dev_login: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            bearer: BearerConfig::default(),
            cookie: Some(CookieConfig::default()),
            api_keys: ApiKeyConfig::default(),
            sessions: SessionConfig::default(),
            tenancy: TenancyConfig::default(),
            dev_login: false,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable values keep their
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        match lookup("WARDEN_BIND_ADDR") {
            Some(addr) => config.bind_addr = addr,
            None => info!(bind_addr = %config.bind_addr, "WARDEN_BIND_ADDR not set; using default"),
        }

        if let Some(ttl) = parse(&lookup, "WARDEN_SESSION_TTL_SECONDS") {
            config.sessions.ttl_seconds = ttl;
        }

        if let Some(required) = parse(&lookup, "WARDEN_REQUIRE_ORGANIZATION") {
            config.tenancy.require_organization = required;
        }

        match lookup("WARDEN_SESSION_COOKIE") {
            Some(name) if name.trim().is_empty() => {
                info!("WARDEN_SESSION_COOKIE is empty; cookie authentication disabled");
                config.cookie = None;
            }
            Some(name) => {
                if let Some(cookie) = config.cookie.as_mut() {
                    cookie.name = name.trim().to_string();
                }
            }
            None => {}
        }

        if let Some(prefix) = lookup("WARDEN_API_KEY_PREFIX") {
            let prefix = prefix.trim().to_string();
            if prefix.is_empty() {
                warn!("WARDEN_API_KEY_PREFIX is empty; keeping default");
            } else {
                config.bearer.foreign_prefixes = vec![prefix.clone()];
                config.api_keys.prefix = prefix;
            }
        }

        if let Some(enabled) = parse(&lookup, "WARDEN_DEV_LOGIN") {
            config.dev_login = enabled;
        }
        if config.dev_login {
            warn!("WARDEN_DEV_LOGIN enabled; anyone can sign in by email");
        }

        config
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}
