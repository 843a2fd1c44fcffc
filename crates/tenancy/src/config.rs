use serde::Deserialize;

use warden_auth::Role;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TenancyConfig {
    /// Refuse user operations when the call carries no organization.
    pub require_organization: bool,
    /// Role granted to a user created inside an organization.
    pub default_role: Role,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            require_organization: false,
            default_role: Role::MEMBER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_defaults() {
        let config: TenancyConfig = serde_json::from_str(r#"{"require_organization": true}"#).unwrap();
        assert!(config.require_organization);
        assert_eq!(config.default_role, Role::MEMBER);

        let config: TenancyConfig = serde_json::from_str(r#"{"default_role": "viewer"}"#).unwrap();
        assert_eq!(config.default_role.as_str(), "viewer");
    }
}
