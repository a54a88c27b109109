//! Permission checks for write routes.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::auth::AuthContext;
use crate::policy::request_object;
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::router::API_PREFIX;

/// Allow the request only if the caller, or its role, holds the request
/// method on the request path.
///
/// `PATCH /game-hangar/v1/demos/7` needs `PATCH` on `demos/7`;
/// `POST /game-hangar/v1/demos` needs `POST` on `demos`.
pub async fn enforce_policy(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx = req
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| ApiError::unauthorized("Login required"))?;

    let object = request_object(req.uri().path(), API_PREFIX);
    let action = req.method().as_str();
    if !ctx.can(&state.policy, object, action).await {
        debug!(user_id = %ctx.user_id, object, action, "Permission denied");
        return Err(ApiError::forbidden("Permission denied"));
    }
    Ok(next.run(req).await)
}
