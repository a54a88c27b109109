//! Registration, login and session handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{info, warn};
use uuid::Uuid;

use super::AppState;
use crate::auth::validate_reset_password;
use crate::policy::logout_object;
use crate::user::{NewUser, User};
use crate::web::dto::{LoginRequest, RegisterRequest, ValidatedJson};
use crate::web::error::ApiError;
use crate::web::middleware::{expired_session_cookie, session_cookie, with_cookie, AuthUser};
use crate::HangarError;

/// Header carrying the new password of a reset.
pub const PASSWORD_HEADER: &str = "Password";

/// POST /register - Create an account and log it in.
#[utoipa::path(
    post,
    path = "/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created; sets the sessionID cookie", body = User),
        (status = 400, description = "Malformed body"),
        (status = 409, description = "Username or e-mail taken"),
        (status = 422, description = "Invalid field or weak password"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<Response, ApiError> {
    let hash = state.authorizer.create_password_hash(&req.password).await?;
    let mut new_user = NewUser::new(req.username, req.email, hash);
    new_user.display_name = req.display_name;

    let user = state.users.create_user(&new_user).await?;
    let session = state.users.create_session(user.id).await?;
    info!(user_id = %user.id, username = %user.username, "User registered");

    Ok(with_cookie(
        (StatusCode::CREATED, Json(user)),
        session_cookie(session.id),
    ))
}

/// POST /login - Open a session by e-mail or username.
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; sets the sessionID cookie", body = User),
        (status = 400, description = "Malformed body"),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Response, ApiError> {
    let user = state
        .authorizer
        .identify_user(req.email.as_deref(), req.username.as_deref())
        .await
        .map_err(|e| match e {
            HangarError::NotFound(_) => ApiError::unauthorized("Invalid credentials"),
            other => other.into(),
        })?;

    if let Err(e) = state.authorizer.check_password(&req.password, user.id).await {
        warn!(user_id = %user.id, "Failed login attempt");
        return Err(e.into());
    }

    let session = state.users.create_session(user.id).await?;
    info!(user_id = %user.id, "User logged in");
    Ok(with_cookie(Json(user), session_cookie(session.id)))
}

/// GET /verify - Mark the caller's account as verified.
#[utoipa::path(
    get,
    path = "/verify",
    tag = "auth",
    responses(
        (status = 200, description = "Account verified", body = User),
        (status = 401, description = "Unauthorized")
    ),
    security(("session_cookie" = []))
)]
pub async fn verify(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.users.verify_user(ctx.user_id).await?))
}

/// PATCH /reset-password/{id} - Set a new password and close every session.
///
/// The new password comes in the `Password` header: 8 to 128 letters or
/// digits. Only the user itself or an administrator may reset it.
#[utoipa::path(
    patch,
    path = "/reset-password/{id}",
    tag = "auth",
    params(
        ("id" = Uuid, Path, description = "User ID"),
        ("Password" = String, Header, description = "New password")
    ),
    responses(
        (status = 200, description = "Password changed, sessions closed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not your account"),
        (status = 404, description = "User not found"),
        (status = 422, description = "Missing or invalid password")
    ),
    security(("session_cookie" = []))
)]
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if id != ctx.user_id && !ctx.is_admin() {
        return Err(ApiError::forbidden("Not your account"));
    }
    let password = headers
        .get(PASSWORD_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unprocessable("Password header is required"))?;
    validate_reset_password(password).map_err(HangarError::from)?;

    state.users.get_user(id).await?;
    let hash = state.authorizer.create_password_hash(password).await?;
    state.users.update_password(id, &hash).await?;
    let closed = state.users.delete_all_user_sessions(id).await?;
    info!(user_id = %id, closed, "Password reset");

    if id == ctx.user_id {
        return Ok(with_cookie(StatusCode::OK, expired_session_cookie()));
    }
    Ok(StatusCode::OK.into_response())
}

/// DELETE /logout/{id} - Close a session.
///
/// The session cookie is cleared only when the caller closes its own
/// current session.
#[utoipa::path(
    delete,
    path = "/logout/{id}",
    tag = "auth",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session closed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not your session"),
        (status = 404, description = "Session not found")
    ),
    security(("session_cookie" = []))
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state.users.find_session(id).await?;
    if !ctx.can(&state.policy, &logout_object(id), "DELETE").await {
        return Err(ApiError::forbidden("Not your session"));
    }
    state.users.delete_session(id).await?;
    info!(session_id = %id, by = %ctx.user_id, "Session closed");

    if id == ctx.session_id {
        return Ok(with_cookie(StatusCode::OK, expired_session_cookie()));
    }
    Ok(StatusCode::OK.into_response())
}
