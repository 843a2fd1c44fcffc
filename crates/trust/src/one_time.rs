//! Single-use verification codes on top of the trust store.
//!
//! One outstanding code per `(subject, purpose)`: issuing again replaces the
//! previous code and restarts its window. Only a digest of the code is stored.

use std::borrow::Cow;
use std::sync::Arc;

use chrono::Duration;
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use warden_core::{Clock, Result};

use crate::{TrustBackend, TrustStore, TtlPolicy};

/// What a code is for; codes never verify across purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodePurpose(Cow<'static, str>);

impl CodePurpose {
    pub const EMAIL_VERIFICATION: CodePurpose = CodePurpose(Cow::Borrowed("email_verification"));
    pub const PASSWORD_RESET: CodePurpose = CodePurpose(Cow::Borrowed("password_reset"));
    pub const LOGIN_CHALLENGE: CodePurpose = CodePurpose(Cow::Borrowed("login_challenge"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Stored alongside the trust record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeDigest(String);

fn digest(code: &str) -> CodeDigest {
    CodeDigest(hex::encode(Sha256::digest(code.as_bytes())))
}

pub struct OneTimeCodes<B> {
    store: TrustStore<CodeDigest, B>,
    digits: u32,
}

impl<B> OneTimeCodes<B>
where
    B: TrustBackend<CodeDigest>,
{
    pub const STORE_NAME: &'static str = "one_time_codes";

    pub fn new(backend: B, policy: TtlPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: TrustStore::new(Self::STORE_NAME, backend, policy, clock),
            digits: 6,
        }
    }

    /// Code length, between 4 and 9 digits.
    pub fn with_digits(mut self, digits: u32) -> Self {
        self.digits = digits.clamp(4, 9);
        self
    }

    /// Issue a fresh numeric code, replacing any outstanding one.
    pub async fn issue(
        &self,
        subject_id: &str,
        purpose: &CodePurpose,
        ttl: Option<Duration>,
    ) -> Result<SecretString> {
        let bound = 10u32.pow(self.digits);
        let value = rand::thread_rng().gen_range(0..bound);
        let code = format!("{value:0width$}", width = self.digits as usize);

        self.store
            .mark_trusted(subject_id, purpose.as_str(), ttl, digest(&code))
            .await?;
        Ok(SecretString::from(code))
    }

    /// Consume the code if it matches.
    ///
    /// A wrong guess leaves the outstanding code in place, and so does a
    /// stale guess racing a re-issue. Of two concurrent correct submissions,
    /// exactly one succeeds.
    pub async fn verify(&self, subject_id: &str, purpose: &CodePurpose, code: &str) -> Result<bool> {
        Ok(self
            .store
            .take_if_matches(subject_id, purpose.as_str(), &digest(code.trim()))
            .await?
            .is_some())
    }

    pub async fn cancel(&self, subject_id: &str, purpose: &CodePurpose) -> Result<bool> {
        self.store.revoke(subject_id, purpose.as_str()).await
    }

    pub async fn cleanup(&self) -> Result<usize> {
        self.store.cleanup().await
    }
}

/// The code in clear, for delivery (mail, SMS).
pub fn reveal(code: &SecretString) -> &str {
    code.expose_secret()
}
