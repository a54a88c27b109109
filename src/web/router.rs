//! Router configuration for the Web API.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    middleware::{self, Next},
    routing::{delete, get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    timeout::{RequestBodyTimeoutLayer, TimeoutLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::{assets, auth, demos, forum, users, AppState};
use super::middleware::{
    create_cors_layer, csrf_protect, enforce_policy, login_rate_limit, resolve_session,
    security_headers, RateLimitState,
};
use super::openapi::ApiDoc;
use crate::config::ServerConfig;

/// Path prefix of every API route.
pub const API_PREFIX: &str = "/game-hangar/v1";

/// Path of the Swagger UI.
pub const DOCS_PATH: &str = "/game-hangar/docs";

/// Largest accepted request body: the biggest upload tier plus form overhead.
pub const MAX_BODY_BYTES: usize = 160 * 1024 * 1024;

/// Create the main router.
pub fn create_router(
    app_state: Arc<AppState>,
    limiter: Arc<RateLimitState>,
    config: &ServerConfig,
) -> Router {
    // Reads, plus writes that check ownership themselves
    let public_routes = Router::new()
        .route("/assets", get(assets::list_assets))
        .route("/assets/:id", get(assets::get_asset))
        .route("/demos", get(demos::list_demos))
        .route("/demos/:id", get(demos::get_demo))
        .route("/topics", get(forum::list_topics))
        .route("/topics/:id", get(forum::get_topic))
        .route("/threads", get(forum::list_threads))
        .route("/threads/:id", get(forum::get_thread))
        .route("/messages", get(forum::list_messages))
        .route("/messages/:id", get(forum::get_message))
        .route("/messages/thread/:id", get(forum::list_thread_messages))
        .route("/users", get(users::list_users))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id/picture", patch(users::upload_picture))
        .route("/roles", get(users::list_roles))
        .route("/roles/:id", get(users::get_role))
        .route("/sessions/:id", get(users::get_session))
        .route("/verify", get(auth::verify))
        .route("/reset-password/:id", patch(auth::reset_password))
        .route("/logout/:id", delete(auth::logout));

    // Writes guarded by the request path and method
    let protected_routes = Router::new()
        .route("/assets", post(assets::create_asset))
        .route(
            "/assets/:id",
            patch(assets::update_asset).delete(assets::delete_asset),
        )
        .route("/demos", post(demos::create_demo))
        .route(
            "/demos/:id",
            patch(demos::update_demo).delete(demos::delete_demo),
        )
        .route("/topics", post(forum::create_topic))
        .route(
            "/topics/:id",
            patch(forum::update_topic).delete(forum::delete_topic),
        )
        .route("/threads", post(forum::create_thread))
        .route(
            "/threads/:id",
            patch(forum::update_thread).delete(forum::delete_thread),
        )
        .route("/messages", post(forum::create_message))
        .route(
            "/messages/:id",
            patch(forum::update_message).delete(forum::delete_message),
        )
        .route(
            "/users/:id",
            patch(users::update_user).delete(users::delete_user),
        )
        .route("/roles", post(users::create_role))
        .route(
            "/roles/:id",
            patch(users::update_role).delete(users::delete_role),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            enforce_policy,
        ));

    let login_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route_layer(middleware::from_fn(move |req: Request<Body>, next: Next| {
            let limiter = limiter.clone();
            login_rate_limit(limiter, req, next)
        }));

    let api_routes = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(login_routes)
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            resolve_session,
        ))
        .layer(middleware::from_fn(csrf_protect));

    Router::new()
        .nest(API_PREFIX, api_routes)
        .route("/health", get(health_check))
        .merge(
            SwaggerUi::new(DOCS_PATH).url(format!("{DOCS_PATH}/openapi.json"), ApiDoc::openapi()),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(&config.cors_origins))
                .layer(middleware::from_fn(security_headers))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config.handler_timeout_secs,
                )))
                .layer(RequestBodyTimeoutLayer::new(Duration::from_secs(
                    config.read_timeout_secs,
                ))),
        )
        .with_state(app_state)
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
