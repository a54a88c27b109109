//! Double-submit CSRF protection.
//!
//! Every response to a client without a `_csrf` cookie issues one. Unsafe
//! methods must echo the cookie value in the `X-CSRF-Token` header, except
//! on the endpoints that open a session.

use axum::{
    body::Body,
    http::{Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::warn;

use crate::policy::request_object;
use crate::web::error::ApiError;
use crate::web::router::API_PREFIX;

/// Name of the CSRF cookie.
pub const CSRF_COOKIE: &str = "_csrf";

/// Header carrying the CSRF token.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

const EXEMPT: [&str; 2] = ["register", "login"];

fn is_safe(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

/// Fresh random token, hex encoded.
pub fn new_csrf_token() -> String {
    let bytes: [u8; 32] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn tokens_match(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a.bytes()
            .zip(b.bytes())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}

/// CSRF middleware.
pub async fn csrf_protect(jar: CookieJar, req: Request<Body>, next: Next) -> Response {
    let cookie = jar.get(CSRF_COOKIE).map(|c| c.value().to_string());
    let exempt = EXEMPT.contains(&request_object(req.uri().path(), API_PREFIX));

    let valid = is_safe(req.method()) || exempt || {
        let header = req.headers().get(CSRF_HEADER).and_then(|v| v.to_str().ok());
        matches!((&cookie, header), (Some(c), Some(h)) if tokens_match(c, h))
    };

    let response = if valid {
        next.run(req).await
    } else {
        warn!(method = %req.method(), path = %req.uri().path(), "CSRF token missing or invalid");
        ApiError::forbidden("CSRF token missing or invalid").into_response()
    };
    if cookie.is_some() {
        return response;
    }
    let token = Cookie::build((CSRF_COOKIE, new_csrf_token()))
        .path("/")
        .same_site(SameSite::Strict);
    (jar.add(token), response).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{header::SET_COOKIE, StatusCode},
        middleware,
        routing::post,
        Router,
    };
    use tower::util::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/demos", post(|| async { "created" }).get(|| async { "list" }))
            .route("/login", post(|| async { "welcome" }))
            .layer(middleware::from_fn(csrf_protect))
    }

    fn request(method: &str, uri: &str) -> axum::http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    #[tokio::test]
    async fn test_get_issues_token() {
        let response = app()
            .oneshot(request("GET", "/demos").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("_csrf="));
    }

    #[tokio::test]
    async fn test_post_without_token_is_forbidden() {
        let response = app()
            .oneshot(request("POST", "/demos").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(SET_COOKIE).is_some());
    }

    #[tokio::test]
    async fn test_post_with_matching_token() {
        let response = app()
            .oneshot(
                request("POST", "/demos")
                    .header("Cookie", "_csrf=abc123")
                    .header(CSRF_HEADER, "abc123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_mismatched_token() {
        let response = app()
            .oneshot(
                request("POST", "/demos")
                    .header("Cookie", "_csrf=abc123")
                    .header(CSRF_HEADER, "abc124")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_login_is_exempt() {
        let response = app()
            .oneshot(request("POST", "/login").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_token_shape() {
        let token = new_csrf_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, new_csrf_token());
    }
}
