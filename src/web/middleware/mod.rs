//! Middleware for the Web API.

pub mod auth;
pub mod cors;
pub mod csrf;
pub mod policy;
pub mod rate_limit;
pub mod security;

pub use auth::{
    expired_session_cookie, resolve_session, session_cookie, with_cookie, AuthUser,
    SESSION_COOKIE,
};
pub use cors::create_cors_layer;
pub use csrf::{csrf_protect, CSRF_COOKIE, CSRF_HEADER};
pub use policy::enforce_policy;
pub use rate_limit::{login_rate_limit, RateLimitState};
pub use security::security_headers;
