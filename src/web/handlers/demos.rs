//! Demo handlers.
//!
//! Every write goes through the thread syncer so a demo and its discussion
//! thread in the demo topic stay in step.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::{resolve_owner, AppState};
use crate::demo::Demo;
use crate::web::dto::{CreateDemoRequest, ListQuery, UpdateDemoRequest, ValidatedJson};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

/// GET /demos - Search demos.
#[utoipa::path(
    get,
    path = "/demos",
    tag = "demos",
    params(ListQuery),
    responses(
        (status = 200, description = "Matching demos", body = Vec<Demo>)
    )
)]
pub async fn list_demos(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Demo>>, ApiError> {
    Ok(Json(state.demos.find(&query.to_search()).await?))
}

/// GET /demos/{id} - Get a demo, counting a view.
#[utoipa::path(
    get,
    path = "/demos/{id}",
    tag = "demos",
    params(("id" = i64, Path, description = "Demo ID")),
    responses(
        (status = 200, description = "Demo", body = Demo),
        (status = 404, description = "Demo not found")
    )
)]
pub async fn get_demo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Demo>, ApiError> {
    Ok(Json(state.demos.find_by_id(id).await?))
}

/// POST /demos - Publish a demo together with its thread.
#[utoipa::path(
    post,
    path = "/demos",
    tag = "demos",
    request_body = CreateDemoRequest,
    responses(
        (status = 201, description = "Demo created", body = Demo),
        (status = 400, description = "Malformed body"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Permission denied"),
        (status = 422, description = "Invalid field")
    ),
    security(("session_cookie" = []))
)]
pub async fn create_demo(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateDemoRequest>,
) -> Result<(StatusCode, Json<Demo>), ApiError> {
    let owner = resolve_owner(&ctx, req.user_id)?;
    let demo = state.syncer.publish_demo(req.into_new(owner)).await?;
    Ok((StatusCode::CREATED, Json(demo)))
}

/// PATCH /demos/{id} - Update a demo and mirror the change onto its thread.
#[utoipa::path(
    patch,
    path = "/demos/{id}",
    tag = "demos",
    params(("id" = i64, Path, description = "Demo ID")),
    request_body = UpdateDemoRequest,
    responses(
        (status = 200, description = "Demo updated", body = Demo),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Permission denied"),
        (status = 404, description = "Demo not found"),
        (status = 409, description = "Stale version"),
        (status = 422, description = "Invalid field")
    ),
    security(("session_cookie" = []))
)]
pub async fn update_demo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateDemoRequest>,
) -> Result<Json<Demo>, ApiError> {
    Ok(Json(state.syncer.update_demo(id, &req.into()).await?))
}

/// DELETE /demos/{id} - Delete a demo and its thread.
#[utoipa::path(
    delete,
    path = "/demos/{id}",
    tag = "demos",
    params(("id" = i64, Path, description = "Demo ID")),
    responses(
        (status = 200, description = "Demo deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Permission denied"),
        (status = 404, description = "Demo not found")
    ),
    security(("session_cookie" = []))
)]
pub async fn delete_demo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.syncer.remove_demo(id).await?;
    Ok(StatusCode::OK)
}
