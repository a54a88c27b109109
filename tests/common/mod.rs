//! Test helpers for the HTTP API tests.
//!
//! Every test gets its own server over the in-memory store, an in-memory
//! object store and a policy engine persisted into the same store.

#![allow(dead_code)]

use std::sync::Arc;

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::{TestRequest, TestResponse, TestServer};
use serde_json::{json, Value};
use uuid::Uuid;

use game_hangar::config::ServerConfig;
use game_hangar::user::UserUpdate;
use game_hangar::web::middleware::RateLimitState;
use game_hangar::web::router::create_router;
use game_hangar::{AppState, MemoryObjectStore, MemoryStore, PolicyEngine};

/// CSRF token every helper sends in both the cookie and the header.
pub const CSRF_TOKEN: &str = "0123456789abcdef0123456789abcdef";

/// Default password of test users.
pub const PASSWORD: &str = "pw12pw12";

/// Build an API path.
pub fn api(path: &str) -> String {
    format!("/game-hangar/v1{path}")
}

/// A running test application.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub objects: Arc<MemoryObjectStore>,
}

/// A logged-in test user.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub session: String,
    pub body: Value,
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        login_rate_limit: 1000,
        ..ServerConfig::default()
    }
}

/// Create an application with the given login rate limit.
pub async fn spawn_app_with_limit(login_rate_limit: u32) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let objects = Arc::new(MemoryObjectStore::new());
    let policy = Arc::new(
        PolicyEngine::load(store.clone())
            .await
            .expect("Failed to load policy"),
    );
    let state = Arc::new(AppState::new(store, policy, objects.clone()));

    let limiter = Arc::new(RateLimitState::new(login_rate_limit));
    let router = create_router(state.clone(), limiter, &test_config());
    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        state,
        objects,
    }
}

/// Create an application.
pub async fn spawn_app() -> TestApp {
    spawn_app_with_limit(1000).await
}

fn header(name: &'static str, value: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static(name),
        HeaderValue::from_str(value).expect("invalid header value"),
    )
}

/// Attach the CSRF cookie and header, and the session cookie if any.
pub fn authed(request: TestRequest, session: Option<&str>) -> TestRequest {
    let cookie = match session {
        Some(session) => format!("_csrf={CSRF_TOKEN}; sessionID={session}"),
        None => format!("_csrf={CSRF_TOKEN}"),
    };
    let (name, value) = header("x-csrf-token", CSRF_TOKEN);
    request
        .add_header(COOKIE, HeaderValue::from_str(&cookie).expect("invalid cookie"))
        .add_header(name, value)
}

/// Value of cookie `name` set by a response.
pub fn set_cookie(response: &TestResponse, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{name}=")))
        .map(|v| v.to_string())
}

/// Session ID carried by a `Set-Cookie: sessionID=...` header.
pub fn session_from(response: &TestResponse) -> Option<String> {
    let cookie = set_cookie(response, "sessionID")?;
    let value = cookie
        .trim_start_matches("sessionID=")
        .split(';')
        .next()?
        .to_string();
    (!value.is_empty()).then_some(value)
}

impl TestApp {
    /// Register a user and return it with its session.
    pub async fn register(&self, username: &str) -> TestUser {
        let response = self
            .server
            .post(&api("/register"))
            .json(&json!({
                "username": username,
                "email": format!("{username}@hangar.test"),
                "password": PASSWORD
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        let session = session_from(&response).expect("register sets a session cookie");
        let body: Value = response.json();
        TestUser {
            id: body["id"].as_str().unwrap().parse().unwrap(),
            session,
            body,
        }
    }

    /// Register a user and give it the admin role.
    pub async fn register_admin(&self, username: &str) -> TestUser {
        let user = self.register(username).await;
        self.set_role(user.id, "admin").await;
        user
    }

    /// Move a user into the named role.
    pub async fn set_role(&self, user_id: Uuid, role: &str) {
        let role = self.state.users.find_role_by_name(role).await.unwrap();
        self.state
            .users
            .update_user(user_id, &UserUpdate::new().role(role.id))
            .await
            .unwrap();
    }

    /// POST JSON as `user`.
    pub async fn post_json(&self, path: &str, user: &TestUser, body: Value) -> TestResponse {
        authed(self.server.post(&api(path)), Some(&user.session))
            .json(&body)
            .await
    }

    /// PATCH JSON as `user`.
    pub async fn patch_json(&self, path: &str, user: &TestUser, body: Value) -> TestResponse {
        authed(self.server.patch(&api(path)), Some(&user.session))
            .json(&body)
            .await
    }

    /// DELETE as `user`.
    pub async fn delete(&self, path: &str, user: &TestUser) -> TestResponse {
        authed(self.server.delete(&api(path)), Some(&user.session)).await
    }

    /// Anonymous GET.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.server.get(&api(path)).await
    }

    /// Anonymous GET with query parameters.
    pub async fn search(&self, path: &str, params: &[(&str, &str)]) -> TestResponse {
        let mut request = self.server.get(&api(path));
        for (key, value) in params {
            request = request.add_query_param(key, value);
        }
        request.await
    }

    /// Publish a demo as `user`.
    pub async fn publish_demo(&self, user: &TestUser, title: &str) -> Value {
        let response = self
            .post_json(
                "/demos",
                user,
                json!({
                    "title": title,
                    "link": "https://play.hangar.test/demo",
                    "tags": ["arcade"]
                }),
            )
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        response.json()
    }
}
