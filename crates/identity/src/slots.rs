//! Registry slots for the identity services.

use warden_registry::ServiceSlot;

use crate::{ApiKeyService, MembershipService, OrganizationService, SessionService, UserService};

pub struct UserSlot;

impl ServiceSlot for UserSlot {
    type Service = dyn UserService;
    const NAME: &'static str = "users";
}

pub struct OrganizationSlot;

impl ServiceSlot for OrganizationSlot {
    type Service = dyn OrganizationService;
    const NAME: &'static str = "organizations";
}

pub struct MembershipSlot;

impl ServiceSlot for MembershipSlot {
    type Service = dyn MembershipService;
    const NAME: &'static str = "memberships";
}

pub struct SessionSlot;

impl ServiceSlot for SessionSlot {
    type Service = dyn SessionService;
    const NAME: &'static str = "sessions";
}

pub struct ApiKeySlot;

impl ServiceSlot for ApiKeySlot {
    type Service = dyn ApiKeyService;
    const NAME: &'static str = "api_keys";
}
