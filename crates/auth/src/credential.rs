//! Credentials extracted from requests.
//!
//! Secrets are wrapped in [`SecretString`] so they never show up in `Debug`
//! output. Logs carry a [`Credential::fingerprint`] instead.

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

/// Opaque credential handed from `extract` to `authenticate`.
#[derive(Debug, Clone)]
pub enum Credential {
    /// Session or bearer token.
    Token(SecretString),
    /// API key split into its public id and secret half.
    ApiKey { key_id: String, secret: SecretString },
    /// Plugin-defined credential.
    Custom {
        kind: &'static str,
        secret: SecretString,
    },
}

impl Credential {
    pub fn token(raw: impl Into<String>) -> Self {
        Credential::Token(SecretString::from(raw.into()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Credential::Token(_) => "token",
            Credential::ApiKey { .. } => "api_key",
            Credential::Custom { kind, .. } => kind,
        }
    }

    fn secret(&self) -> &SecretString {
        match self {
            Credential::Token(secret)
            | Credential::ApiKey { secret, .. }
            | Credential::Custom { secret, .. } => secret,
        }
    }

    /// Short, non-reversible tag safe to log.
    pub fn fingerprint(&self) -> String {
        fingerprint(self.secret().expose_secret())
    }
}

/// Hex SHA-256 of a secret; the form in which tokens and keys are stored.
pub fn digest(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// First 8 hex chars of the digest.
pub fn fingerprint(secret: &str) -> String {
    let mut digest = digest(secret);
    digest.truncate(8);
    digest
}

/// Compare two digests without short-circuiting on the first mismatch.
pub fn digests_match(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_the_secret() {
        let cred = Credential::token("super-secret-token");
        let rendered = format!("{cred:?}");
        assert!(!rendered.contains("super-secret-token"));
    }

    #[test]
    fn fingerprint_is_short_and_stable() {
        let a = Credential::token("abc");
        let b = Credential::token("abc");
        assert_eq!(a.fingerprint().len(), 8);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), Credential::token("abd").fingerprint());
    }

    #[test]
    fn digest_comparison() {
        let d = digest("secret");
        assert_eq!(d.len(), 64);
        assert!(digests_match(&d, &digest("secret")));
        assert!(!digests_match(&d, &digest("secreT")));
        assert!(!digests_match(&d, "short"));
    }
}
