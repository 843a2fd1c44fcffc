use chrono::Duration;
use serde::Deserialize;

use warden_core::{Error, Result};

/// Longest trust window a policy may allow (ten years).
pub const MAX_TRUST_TTL_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

/// Bounds for requested trust windows.
///
/// Always satisfies `0 < default_ttl <= max_ttl <= MAX_TRUST_TTL_SECONDS`, so
/// every record written under it expires in the future.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawTtlPolicy")]
pub struct TtlPolicy {
    default_ttl: Duration,
    max_ttl: Duration,
}

impl TtlPolicy {
    pub fn new(default_ttl: Duration, max_ttl: Duration) -> Result<Self> {
        if default_ttl <= Duration::zero() {
            return Err(Error::validation("default_ttl must be positive"));
        }
        if default_ttl > max_ttl {
            return Err(Error::validation("default_ttl cannot exceed max_ttl"));
        }
        if max_ttl > Duration::seconds(MAX_TRUST_TTL_SECONDS) {
            return Err(Error::validation(format!(
                "max_ttl cannot exceed {MAX_TRUST_TTL_SECONDS} seconds"
            )));
        }
        Ok(Self {
            default_ttl,
            max_ttl,
        })
    }

    /// 30 days by default, at most 90.
    pub fn trusted_devices() -> Self {
        Self {
            default_ttl: Duration::days(30),
            max_ttl: Duration::days(90),
        }
    }

    /// 10 minutes by default, at most one hour.
    pub fn one_time_codes() -> Self {
        Self {
            default_ttl: Duration::minutes(10),
            max_ttl: Duration::hours(1),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn max_ttl(&self) -> Duration {
        self.max_ttl
    }

    /// Effective TTL for a request.
    ///
    /// Anything outside `(0, max_ttl]`, or no request at all, falls back to
    /// `default_ttl` without error.
    pub fn clamp(&self, requested: Option<Duration>) -> Duration {
        match requested {
            Some(ttl) if ttl > Duration::zero() && ttl <= self.max_ttl => ttl,
            _ => self.default_ttl,
        }
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::trusted_devices()
    }
}

/// Wire form: both bounds in whole seconds.
#[derive(Deserialize)]
struct RawTtlPolicy {
    default_ttl: i64,
    max_ttl: i64,
}

impl TryFrom<RawTtlPolicy> for TtlPolicy {
    type Error = Error;

    fn try_from(raw: RawTtlPolicy) -> Result<Self> {
        let seconds = |name: &str, secs: i64| {
            Duration::try_seconds(secs)
                .ok_or_else(|| Error::validation(format!("{name} is out of range")))
        };
        Self::new(
            seconds("default_ttl", raw.default_ttl)?,
            seconds("max_ttl", raw.max_ttl)?,
        )
    }
}
