//! HTTP API of Game Hangar.
//!
//! JSON over HTTP under `/game-hangar/v1`, with session cookies, CSRF
//! protection and path-based permission checks on every write.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::{create_router, API_PREFIX};
pub use server::WebServer;
