//! Session cookie middleware and extractors.
//!
//! [`resolve_session`] turns the `sessionID` cookie into an [`AuthContext`]
//! stored in the request extensions. Handlers then pick it up through
//! [`AuthUser`].

use std::sync::Arc;

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "sessionID";

/// Lifetime of the session cookie in seconds (four days).
pub const SESSION_MAX_AGE_SECS: i64 = 4 * 24 * 60 * 60;

/// Resolve the session cookie, if any, to the user behind the request.
///
/// Unknown or malformed session IDs are ignored; routes that need a user
/// reject the request later with 401.
pub async fn resolve_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        match Uuid::parse_str(cookie.value()) {
            Ok(session_id) => match state.identifier.identify(session_id).await {
                Ok(ctx) => {
                    req.extensions_mut().insert(ctx);
                }
                Err(e) if e.is_not_found() => {
                    debug!(%session_id, "Ignoring stale session cookie");
                }
                Err(e) => return ApiError::from(e).into_response(),
            },
            Err(_) => debug!("Ignoring malformed session cookie"),
        }
    }
    next.run(req).await
}

fn base_session_cookie(value: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .build()
}

/// Cookie opening a session.
pub fn session_cookie(session_id: Uuid) -> Cookie<'static> {
    let max_age = Duration::seconds(SESSION_MAX_AGE_SECS);
    let mut cookie = base_session_cookie(session_id.to_string());
    cookie.set_max_age(max_age);
    cookie.set_expires(OffsetDateTime::now_utc() + max_age);
    cookie
}

/// Cookie clearing the session cookie.
pub fn expired_session_cookie() -> Cookie<'static> {
    let mut cookie = base_session_cookie(String::new());
    cookie.make_removal();
    cookie
}

/// Attach a cookie to a response.
pub fn with_cookie(response: impl IntoResponse, cookie: Cookie<'static>) -> Response {
    (CookieJar::new().add(cookie), response).into_response()
}

/// Extractor for a logged-in user.
///
/// Rejects the request with 401 when no valid session came with it.
#[derive(Debug, Clone)]
pub struct AuthUser(pub AuthContext);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| ApiError::unauthorized("Login required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let id = Uuid::new_v4();
        let cookie = session_cookie(id);
        assert_eq!(cookie.value(), id.to_string());
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(345_600)));
        assert!(cookie.expires_datetime().is_some());
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
    }

    #[test]
    fn test_expired_cookie() {
        let cookie = expired_session_cookie();
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        assert!(cookie.to_string().starts_with("sessionID=;"));
    }

    #[test]
    fn test_with_cookie_sets_header() {
        let response = with_cookie(axum::http::StatusCode::OK, expired_session_cookie());
        let header = response
            .headers()
            .get(axum::http::header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(header.starts_with("sessionID=;"));
        assert!(header.contains("Max-Age=0"));
        assert!(header.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn test_auth_user_requires_context() {
        let (mut parts, _) = Request::new(Body::empty()).into_parts();
        assert!(AuthUser::from_request_parts(&mut parts, &()).await.is_err());

        let ctx = AuthContext {
            user_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            role: "freetier".to_string(),
        };
        parts.extensions.insert(ctx.clone());
        let AuthUser(found) = AuthUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(found, ctx);
    }
}
