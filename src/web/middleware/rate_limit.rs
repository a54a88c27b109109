//! Per-client rate limiting of the login endpoint.

use std::{
    collections::HashMap,
    net::SocketAddr,
    num::NonZeroU32,
    sync::{Arc, RwLock},
    time::Duration,
};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};

use crate::web::error::ApiError;

/// Rate limiter of one client.
pub type IpRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

type LimiterMap = RwLock<HashMap<String, Arc<IpRateLimiter>>>;

/// Login attempts per client IP.
#[derive(Clone)]
pub struct RateLimitState {
    limiters: Arc<LimiterMap>,
    per_minute: u32,
    clock: DefaultClock,
}

impl RateLimitState {
    /// Allow `per_minute` login attempts per client.
    pub fn new(per_minute: u32) -> Self {
        Self {
            limiters: Arc::new(RwLock::new(HashMap::new())),
            per_minute,
            clock: DefaultClock::default(),
        }
    }

    fn limiter(&self, ip: &str) -> Arc<IpRateLimiter> {
        {
            let read_guard = self.limiters.read().unwrap_or_else(|e| e.into_inner());
            if let Some(limiter) = read_guard.get(ip) {
                return limiter.clone();
            }
        }

        let mut write_guard = self.limiters.write().unwrap_or_else(|e| e.into_inner());
        write_guard
            .entry(ip.to_string())
            .or_insert_with(|| {
                let quota =
                    Quota::per_minute(NonZeroU32::new(self.per_minute).unwrap_or(NonZeroU32::MIN));
                Arc::new(RateLimiter::direct(quota))
            })
            .clone()
    }

    /// Record an attempt from `ip`.
    ///
    /// Returns the wait before the next allowed attempt when over quota.
    pub fn check(&self, ip: &str) -> Result<(), Duration> {
        self.limiter(ip)
            .check()
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    /// Drop limiters nobody holds.
    pub fn cleanup(&self) {
        let mut guard = self.limiters.write().unwrap_or_else(|e| e.into_inner());
        guard.retain(|_, v| Arc::strong_count(v) > 1);
    }

    /// Run [`cleanup`](Self::cleanup) every five minutes.
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(300)).await;
                self.cleanup();
            }
        });
    }
}

/// Client IP, honouring proxy headers.
pub fn client_ip(req: &Request<Body>) -> String {
    if let Some(ip) = req
        .headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
    {
        return ip.trim().to_string();
    }

    if let Some(real_ip) = req
        .headers()
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
    {
        return real_ip.to_string();
    }

    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

/// Rate limiting middleware for the login endpoint.
pub async fn login_rate_limit(
    state: Arc<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(&req);

    if let Err(wait) = state.check(&ip) {
        tracing::warn!(ip = %ip, "Login rate limit exceeded");
        return ApiError::too_many_requests(wait.as_secs()).into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_quota_per_ip() {
        let state = RateLimitState::new(3);

        assert!(state.check("127.0.0.1").is_ok());
        assert!(state.check("127.0.0.1").is_ok());
        assert!(state.check("127.0.0.1").is_ok());
        let wait = state.check("127.0.0.1").unwrap_err();
        assert!(wait > Duration::ZERO);

        assert!(state.check("192.168.1.1").is_ok());
    }

    #[test]
    fn test_zero_quota_still_allows_one() {
        let state = RateLimitState::new(0);
        assert!(state.check("10.0.0.1").is_ok());
        assert!(state.check("10.0.0.1").is_err());
    }

    #[test]
    fn test_cleanup_drops_idle_limiters() {
        let state = RateLimitState::new(5);
        state.check("10.0.0.2").unwrap();
        state.cleanup();
        assert!(state.limiters.read().unwrap().is_empty());
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let req = Request::builder()
            .header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
            .header("X-Real-IP", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req), "203.0.113.7");

        let req = Request::builder()
            .header("X-Real-IP", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req), "198.51.100.2");

        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&req), "unknown");
    }
}
