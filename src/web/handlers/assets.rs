//! Asset handlers.
//!
//! Create and update take `multipart/form-data` with a JSON `metadata` part
//! and a binary `file` part. The file size cap depends on the caller's tier.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use super::{read_upload_form, resolve_owner, AppState};
use crate::asset::Asset;
use crate::web::dto::validation::parse_validated;
use crate::web::dto::{CreateAssetRequest, ListQuery, UpdateAssetRequest};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

/// GET /assets - Search assets.
#[utoipa::path(
    get,
    path = "/assets",
    tag = "assets",
    params(ListQuery),
    responses(
        (status = 200, description = "Matching assets", body = Vec<Asset>)
    )
)]
pub async fn list_assets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Asset>>, ApiError> {
    Ok(Json(state.assets.find(&query.to_search()).await?))
}

/// GET /assets/{id} - Get an asset with a download link.
#[utoipa::path(
    get,
    path = "/assets/{id}",
    tag = "assets",
    params(("id" = i64, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Asset", body = Asset),
        (status = 404, description = "Asset not found")
    )
)]
pub async fn get_asset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Asset>, ApiError> {
    Ok(Json(state.assets.find_by_id(id).await?))
}

/// POST /assets - Upload a new asset.
#[utoipa::path(
    post,
    path = "/assets",
    tag = "assets",
    responses(
        (status = 201, description = "Asset created", body = Asset),
        (status = 400, description = "Malformed form"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Permission denied"),
        (status = 422, description = "Invalid metadata or file too large")
    ),
    security(("session_cookie" = []))
)]
pub async fn create_asset(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Asset>), ApiError> {
    let form = read_upload_form(multipart).await?;
    let metadata = form
        .metadata
        .ok_or_else(|| ApiError::unprocessable("metadata part is required"))?;
    let file = form
        .file
        .ok_or_else(|| ApiError::unprocessable("file part is required"))?;

    let req: CreateAssetRequest = parse_validated(&metadata)?;
    let owner = resolve_owner(&ctx, req.user_id)?;
    let tier = ctx.upload_tier(&state.policy).await;

    let asset = state.assets.create(&req.into_new(owner), file, tier).await?;
    info!(asset_id = asset.id, user_id = %owner, "Asset uploaded");
    Ok((StatusCode::CREATED, Json(asset)))
}

/// PATCH /assets/{id} - Update asset metadata and optionally replace the file.
#[utoipa::path(
    patch,
    path = "/assets/{id}",
    tag = "assets",
    params(("id" = i64, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Asset updated", body = Asset),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Permission denied"),
        (status = 404, description = "Asset not found"),
        (status = 409, description = "Stale version"),
        (status = 422, description = "Invalid metadata or file too large")
    ),
    security(("session_cookie" = []))
)]
pub async fn update_asset(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<Asset>, ApiError> {
    let form = read_upload_form(multipart).await?;
    let metadata = form
        .metadata
        .ok_or_else(|| ApiError::unprocessable("metadata part is required"))?;
    let req: UpdateAssetRequest = parse_validated(&metadata)?;
    let tier = ctx.upload_tier(&state.policy).await;

    let asset = state.assets.update(id, &req.into(), form.file, tier).await?;
    Ok(Json(asset))
}

/// DELETE /assets/{id} - Delete an asset and its file.
#[utoipa::path(
    delete,
    path = "/assets/{id}",
    tag = "assets",
    params(("id" = i64, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Asset deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Permission denied"),
        (status = 404, description = "Asset not found")
    ),
    security(("session_cookie" = []))
)]
pub async fn delete_asset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.assets.delete(id).await?;
    info!(asset_id = id, "Asset deleted");
    Ok(StatusCode::OK)
}
