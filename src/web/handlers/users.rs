//! User, role and session handlers.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;
use uuid::Uuid;

use super::{read_upload_form, AppState};
use crate::policy::object_path;
use crate::user::{Role, Session, User};
use crate::web::dto::{
    CreateRoleRequest, ListQuery, UpdateRoleRequest, UpdateUserRequest, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::{expired_session_cookie, with_cookie, AuthUser};

// ============================================================================
// Users
// ============================================================================

/// GET /users - Search users by name.
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    params(ListQuery),
    responses((status = 200, description = "Matching users", body = Vec<User>))
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.users.find_users(&query.to_search()).await?))
}

/// GET /users/{id} - Get a user.
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.users.find_user(id).await?))
}

/// PATCH /users/{id} - Update a user.
///
/// Karma and role changes are reserved to administrators.
#[utoipa::path(
    patch,
    path = "/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Permission denied"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Stale version or name taken"),
        (status = 422, description = "Invalid field")
    ),
    security(("session_cookie" = []))
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    if req.is_privileged() && !ctx.is_admin() {
        return Err(ApiError::forbidden("Only administrators may change karma or roles"));
    }
    Ok(Json(state.users.update_user(id, &req.into()).await?))
}

/// PATCH /users/{id}/picture - Replace the profile picture.
///
/// Takes `multipart/form-data` with a `file` part of at most 5 MiB.
#[utoipa::path(
    patch,
    path = "/users/{id}/picture",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Picture stored", body = User),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Permission denied"),
        (status = 404, description = "User not found"),
        (status = 422, description = "Missing or oversized file")
    ),
    security(("session_cookie" = []))
)]
pub async fn upload_picture(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<User>, ApiError> {
    if !ctx.can(&state.policy, &object_path("users", id), "PATCH").await {
        return Err(ApiError::forbidden("Permission denied"));
    }
    let form = read_upload_form(multipart).await?;
    let picture = form
        .file
        .ok_or_else(|| ApiError::unprocessable("file part is required"))?;
    Ok(Json(state.users.set_profile_picture(id, picture).await?))
}

/// DELETE /users/{id} - Delete a user and its sessions.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Permission denied"),
        (status = 404, description = "User not found")
    ),
    security(("session_cookie" = []))
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state.users.delete_user(id).await?;
    info!(user_id = %id, by = %ctx.user_id, "User deleted");
    if id == ctx.user_id {
        return Ok(with_cookie(StatusCode::OK, expired_session_cookie()));
    }
    Ok(StatusCode::OK.into_response())
}

/// GET /sessions/{id} - Get a session of the caller.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session", body = Session),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not your session"),
        (status = 404, description = "Session not found")
    ),
    security(("session_cookie" = []))
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Session>, ApiError> {
    let session = state.users.find_session(id).await?;
    if session.user_id != ctx.user_id && !ctx.is_admin() {
        return Err(ApiError::forbidden("Not your session"));
    }
    Ok(Json(session))
}

// ============================================================================
// Roles
// ============================================================================

/// GET /roles - Search roles by name.
#[utoipa::path(
    get,
    path = "/roles",
    tag = "roles",
    params(ListQuery),
    responses((status = 200, description = "Matching roles", body = Vec<Role>))
)]
pub async fn list_roles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Role>>, ApiError> {
    Ok(Json(state.users.find_roles(&query.to_search()).await?))
}

/// GET /roles/{id} - Get a role.
#[utoipa::path(
    get,
    path = "/roles/{id}",
    tag = "roles",
    params(("id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Role", body = Role),
        (status = 404, description = "Role not found")
    )
)]
pub async fn get_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Role>, ApiError> {
    Ok(Json(state.users.find_role(id).await?))
}

/// POST /roles - Create a role.
#[utoipa::path(
    post,
    path = "/roles",
    tag = "roles",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Role created", body = Role),
        (status = 403, description = "Permission denied"),
        (status = 409, description = "Name taken"),
        (status = 422, description = "Invalid field")
    ),
    security(("session_cookie" = []))
)]
pub async fn create_role(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateRoleRequest>,
) -> Result<(StatusCode, Json<Role>), ApiError> {
    let role = state.users.create_role(req.name.trim()).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// PATCH /roles/{id} - Rename a role.
#[utoipa::path(
    patch,
    path = "/roles/{id}",
    tag = "roles",
    params(("id" = Uuid, Path, description = "Role ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = Role),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Stale version or name taken"),
        (status = 422, description = "Invalid field")
    ),
    security(("session_cookie" = []))
)]
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateRoleRequest>,
) -> Result<Json<Role>, ApiError> {
    Ok(Json(state.users.update_role(id, &req.into()).await?))
}

/// DELETE /roles/{id} - Delete an unused role.
#[utoipa::path(
    delete,
    path = "/roles/{id}",
    tag = "roles",
    params(("id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Role deleted"),
        (status = 404, description = "Role not found"),
        (status = 422, description = "Role is built in or still in use")
    ),
    security(("session_cookie" = []))
)]
pub async fn delete_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.users.delete_role(id).await?;
    Ok(StatusCode::OK)
}
