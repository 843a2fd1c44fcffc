use axum::{
    Json,
    extract::{Extension, Path, Query},
    response::IntoResponse,
};
use serde_json::json;

use warden_auth::{AuthContext, Permission, require_permission};
use warden_core::{CallContext, Error, ListQuery, Pagination, UserId};
use warden_identity::{UserSlot, normalize_email};
use warden_registry::ServiceRegistry;

use crate::app::dto::{self, ListUsersParams};
use crate::app::errors::ApiError;

const USERS_READ: &str = "users.read";
const USERS_DELETE: &str = "users.delete";

pub async fn me(
    Extension(registry): Extension<ServiceRegistry>,
    Extension(auth): Extension<AuthContext>,
    Extension(ctx): Extension<CallContext>,
) -> Result<impl IntoResponse, ApiError> {
    let subject = auth.subject_id().ok_or(Error::Unauthenticated)?;
    let user = registry.get::<UserSlot>()?.get(&ctx, subject).await?;
    Ok(Json(user))
}

/// Users visible to the caller; scoped to the caller's organization when the
/// credential carries one.
pub async fn list(
    Extension(registry): Extension<ServiceRegistry>,
    Extension(auth): Extension<AuthContext>,
    Extension(ctx): Extension<CallContext>,
    Query(params): Query<ListUsersParams>,
) -> Result<impl IntoResponse, ApiError> {
    require_permission(&auth, &Permission::new(USERS_READ))?;

    let mut query = ListQuery::new().paginate(Pagination::new(params.limit, params.offset));
    if let Some(email) = params.email {
        query = query.filter("email", normalize_email(&email)?);
    }
    if let Some(status) = params.status {
        query = query.filter("status", status);
    }

    let page = registry.get::<UserSlot>()?.list(&ctx, &query).await?;
    Ok(Json(page))
}

pub async fn get(
    Extension(registry): Extension<ServiceRegistry>,
    Extension(auth): Extension<AuthContext>,
    Extension(ctx): Extension<CallContext>,
    Path(id): Path<UserId>,
) -> Result<impl IntoResponse, ApiError> {
    if auth.subject_id() != Some(id) {
        require_permission(&auth, &Permission::new(USERS_READ))?;
    }
    let user = registry.get::<UserSlot>()?.get(&ctx, id).await?;
    Ok(Json(user))
}

/// Users may delete themselves; anyone else needs `users.delete`.
pub async fn delete(
    Extension(registry): Extension<ServiceRegistry>,
    Extension(auth): Extension<AuthContext>,
    Extension(ctx): Extension<CallContext>,
    Path(id): Path<UserId>,
) -> Result<impl IntoResponse, ApiError> {
    if auth.subject_id() != Some(id) {
        require_permission(&auth, &Permission::new(USERS_DELETE))?;
    }
    let deleted = registry.get::<UserSlot>()?.delete(&ctx, id).await?;
    Ok(Json(json!({
        "deleted": id,
        "warnings": dto::warnings(&deleted.warnings),
    })))
}
