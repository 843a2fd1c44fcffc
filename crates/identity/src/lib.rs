//! `warden-identity` — the core directory services behind the auth
//! strategies: users, organizations, memberships, sessions and API keys,
//! plus the trust stores for devices and one-time codes.
//!
//! Each service is a trait with a repository-backed `Core*` implementation,
//! installed into a registry slot by [`IdentityPlugin`]. Other plugins may
//! replace or decorate those slots.

pub mod api_key;
pub mod lookup;
pub mod membership;
pub mod organization;
pub mod plugin;
pub mod session;
pub mod slots;
pub mod trust;
pub mod user;

pub use api_key::{
    ApiKeyService, CoreApiKeyService, IssuedApiKey, MAX_API_KEY_TTL_SECONDS, NewApiKey,
};
pub use lookup::{ApiKeyLookupAdapter, DirectorySubjects, SessionLookupAdapter};
pub use membership::{CoreMembershipService, Membership, MembershipService};
pub use organization::{
    CoreOrganizationService, NewOrganization, Organization, OrganizationService,
    create_with_owner,
};
pub use plugin::{ApiKeyPlugin, IdentityPlugin, IdentityStores, SessionPlugin};
pub use session::{
    CoreSessionService, IssuedSession, SessionConfig, SessionScope, SessionService,
    ensure_owned_by,
};
pub use slots::{ApiKeySlot, MembershipSlot, OrganizationSlot, SessionSlot, UserSlot};
pub use trust::{CodeTrust, DeviceTrust, OneTimeCodeSlot, TrustPlugin, TrustedDeviceSlot};
pub use user::{
    CoreUserService, NewUser, User, UserCreated, UserCreating, UserDeleted, UserDeleting,
    UserPatch, UserService, UserStatus, UserUpdated, UserUpdating, normalize_email,
};
