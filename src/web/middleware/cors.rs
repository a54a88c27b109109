//! CORS configuration.

use axum::http::header::{ACCEPT, CONTENT_TYPE, COOKIE};
use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

/// Build the CORS layer for the configured origins.
///
/// With no valid origin every origin is allowed, without credentials.
/// Listed origins may send cookies and the CSRF header.
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::DELETE,
        Method::PATCH,
        Method::OPTIONS,
    ];

    let parsed_origins: Vec<HeaderValue> =
        origins.iter().filter_map(|o| o.parse().ok()).collect();

    if parsed_origins.is_empty() {
        return CorsLayer::new()
            .allow_methods(methods)
            .allow_headers(Any)
            .allow_origin(Any);
    }

    CorsLayer::new()
        .allow_methods(methods)
        .allow_headers([
            CONTENT_TYPE,
            ACCEPT,
            COOKIE,
            HeaderName::from_static("x-csrf-token"),
            HeaderName::from_static("password"),
        ])
        .expose_headers([HeaderName::from_static("retry-after")])
        .allow_credentials(true)
        .allow_origin(parsed_origins)
}
