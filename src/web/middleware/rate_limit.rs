//! Per-IP rate limiting for login and public-link downloads.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};

use crate::web::error::ApiError;

/// Rate limiter keyed by client IP.
pub type IpRateLimiter = DefaultKeyedRateLimiter<String>;

/// Limiters shared by the rate-limited routes.
pub struct RateLimitState {
    login: IpRateLimiter,
    link: IpRateLimiter,
}

fn per_minute(requests: u32) -> Quota {
    Quota::per_minute(NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN))
}

impl RateLimitState {
    /// Limits are requests per minute per IP.
    pub fn new(login_rate_limit: u32, link_rate_limit: u32) -> Self {
        Self {
            login: RateLimiter::keyed(per_minute(login_rate_limit)),
            link: RateLimiter::keyed(per_minute(link_rate_limit)),
        }
    }

    pub fn check_login(&self, ip: &str) -> bool {
        self.login.check_key(&ip.to_string()).is_ok()
    }

    pub fn check_link(&self, ip: &str) -> bool {
        self.link.check_key(&ip.to_string()).is_ok()
    }

    /// Forget IPs whose quota has fully replenished.
    pub fn cleanup(&self) {
        self.login.retain_recent();
        self.link.retain_recent();
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

/// Client IP: proxy headers first, then the socket address.
fn client_ip(req: &Request<Body>) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(ip) = forwarded.split(',').next() {
            return ip.trim().to_string();
        }
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
    if !state.check_login(&ip) {
        tracing::warn!(ip = %ip, "Login rate limit exceeded");
        return ApiError::too_many_requests("Too many login attempts. Please try again later.")
            .into_response();
    }
    next.run(req).await
}

/// Rate limiting middleware for public-link downloads.
pub async fn link_rate_limit(
    state: Arc<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(&req);
    if !state.check_link(&ip) {
        tracing::warn!(ip = %ip, "Public link rate limit exceeded");
        return ApiError::too_many_requests("Too many requests. Please try again later.")
            .into_response();
    }
    next.run(req).await
}
