use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::info;

use warden_auth::{AuthContext, Permission, Role, authorize_in_organization};
use warden_core::{CallContext, Error, OrganizationId};
use warden_identity::{
    MembershipSlot, NewOrganization, NewUser, OrganizationSlot, SessionScope, SessionSlot,
    UserSlot, create_with_owner,
};
use warden_registry::ServiceRegistry;

use crate::ApiConfig;
use crate::app::dto::{self, CreateMemberRequest, CreateOrganizationRequest};
use crate::app::errors::ApiError;
use crate::app::routes::sessions::{session_body, with_session_cookie};

/// Create an organization owned by the caller and switch them into it.
pub async fn create(
    Extension(registry): Extension<ServiceRegistry>,
    Extension(config): Extension<Arc<ApiConfig>>,
    Extension(auth): Extension<AuthContext>,
    Extension(ctx): Extension<CallContext>,
    Json(body): Json<CreateOrganizationRequest>,
) -> Result<Response, ApiError> {
    let subject = auth.subject_id().ok_or(Error::Unauthenticated)?;

    let (organization, membership) = create_with_owner(
        registry.get::<OrganizationSlot>()?.as_ref(),
        registry.get::<MembershipSlot>()?.as_ref(),
        &ctx,
        NewOrganization {
            name: body.name,
            slug: body.slug,
        },
        subject,
        Role::OWNER,
    )
    .await?;
    let issued = registry
        .get::<SessionSlot>()?
        .issue(&ctx, subject, SessionScope::organization(organization.id))
        .await?;
    info!(organization_id = %organization.id, owner = %subject, "organization created");

    let body = json!({
        "organization": organization,
        "membership": membership,
        "session": session_body(&issued),
    });
    Ok(with_session_cookie(
        (StatusCode::CREATED, Json(body)).into_response(),
        &config,
        Some(&issued.token),
    ))
}

pub async fn get(
    Extension(registry): Extension<ServiceRegistry>,
    Extension(auth): Extension<AuthContext>,
    Extension(ctx): Extension<CallContext>,
    Path(id): Path<OrganizationId>,
) -> Result<impl IntoResponse, ApiError> {
    let subject = auth.subject_id().ok_or(Error::Unauthenticated)?;
    registry
        .get::<MembershipSlot>()?
        .find(&ctx, id, subject)
        .await?
        .ok_or(Error::NotFound)?;

    let organization = registry.get::<OrganizationSlot>()?.get(&ctx, id).await?;
    Ok(Json(organization))
}

pub async fn members(
    Extension(registry): Extension<ServiceRegistry>,
    Extension(auth): Extension<AuthContext>,
    Extension(ctx): Extension<CallContext>,
    Path(id): Path<OrganizationId>,
) -> Result<impl IntoResponse, ApiError> {
    authorize_in_organization(&auth, id, &Permission::new("members.read"))?;

    let members = registry
        .get::<MembershipSlot>()?
        .list_for_organization(&ctx, id)
        .await?;
    Ok(Json(members))
}

/// Create a user directly inside the organization.
///
/// Goes through the organization-scoped user service, so the user and their
/// membership are created together or not at all.
pub async fn create_member(
    Extension(registry): Extension<ServiceRegistry>,
    Extension(auth): Extension<AuthContext>,
    Extension(ctx): Extension<CallContext>,
    Path(id): Path<OrganizationId>,
    Json(body): Json<CreateMemberRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize_in_organization(&auth, id, &Permission::new("users.create"))?;

    let ctx = ctx.with_organization(id);
    let created = registry
        .get::<UserSlot>()?
        .create(&ctx, NewUser::new(body.email, body.display_name))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "user": created.value,
            "warnings": dto::warnings(&created.warnings),
        })),
    ))
}
