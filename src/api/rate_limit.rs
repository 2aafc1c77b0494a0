//! Per-IP request throttling.
//!
//! Each (client IP, tier) pair gets a bucket of tokens that refills
//! continuously over the configured window. The auth tier is much tighter
//! than the general API tier because it guards password guessing.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::ApiError;
use crate::config::RateLimitConfig;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitTier {
    /// Everything behind a session
    Api,
    /// Login, setup, password reset and invite acceptance
    Auth,
}

#[derive(Debug, Clone)]
struct Bucket {
    tokens: u32,
    window_start: Instant,
    last_request: Instant,
}

impl Bucket {
    fn full(max_tokens: u32, now: Instant) -> Self {
        Self {
            tokens: max_tokens,
            window_start: now,
            last_request: now,
        }
    }
}

/// Thread-safe rate limiter using dashmap
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<(IpAddr, RateLimitTier), Bucket>,
    config: RateLimitConfig,
    window: Duration,
}

/// Headers attached to every throttled response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub remaining: u32,
    pub limit: u32,
    /// Seconds until the window resets
    pub reset_after: u64,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            window: Duration::from_secs(config.window_seconds.max(1)),
            config,
        }
    }

    pub fn limit_for(&self, tier: RateLimitTier) -> u32 {
        match tier {
            RateLimitTier::Api => self.config.api_requests_per_window,
            RateLimitTier::Auth => self.config.auth_requests_per_window,
        }
    }

    /// Take a token for this client. `Err` carries the retry-after in seconds.
    pub fn check(&self, ip: IpAddr, tier: RateLimitTier) -> Result<RateLimitInfo, u64> {
        if !self.config.enabled {
            return Ok(RateLimitInfo {
                remaining: u32::MAX,
                limit: u32::MAX,
                reset_after: 0,
            });
        }

        let limit = self.limit_for(tier);
        let now = Instant::now();
        let mut bucket = self
            .buckets
            .entry((ip, tier))
            .or_insert_with(|| Bucket::full(limit, now));

        let elapsed = now.duration_since(bucket.window_start);
        if elapsed >= self.window {
            *bucket = Bucket::full(limit, now);
        } else {
            let idle = now.duration_since(bucket.last_request).as_secs_f64();
            let refill = (idle * limit as f64 / self.window.as_secs_f64()) as u32;
            bucket.tokens = bucket.tokens.saturating_add(refill).min(limit);
        }
        bucket.last_request = now;

        let reset_after = self
            .window
            .saturating_sub(now.duration_since(bucket.window_start))
            .as_secs();

        if bucket.tokens == 0 {
            return Err(reset_after.max(1));
        }

        bucket.tokens -= 1;
        Ok(RateLimitInfo {
            remaining: bucket.tokens,
            limit,
            reset_after,
        })
    }

    /// Drop buckets idle for more than two windows
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        let expiry = self.window * 2;
        self.buckets
            .retain(|_, bucket| now.duration_since(bucket.last_request) < expiry);
    }

    pub fn entry_count(&self) -> usize {
        self.buckets.len()
    }
}

/// The socket peer, unless a trusted proxy in front of us names the client.
///
/// Forwarding headers are only read with `trust_proxy`. With no peer
/// (in-process requests) the client is loopback.
fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trust_proxy: bool) -> IpAddr {
    let peer = peer.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
    if !trust_proxy {
        return peer;
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok());

    forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .and_then(|ip| ip.trim().parse().ok())
        })
        .unwrap_or(peer)
}

fn set_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset_after: u64) {
    headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(reset_after));
}

pub async fn rate_limit_api(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    throttle(state, request, next, RateLimitTier::Api).await
}

pub async fn rate_limit_auth(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    throttle(state, request, next, RateLimitTier::Auth).await
}

async fn throttle(
    state: Arc<AppState>,
    request: Request<Body>,
    next: Next,
    tier: RateLimitTier,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let ip = client_ip(request.headers(), peer, state.rate_limiter.config.trust_proxy);

    match state.rate_limiter.check(ip, tier) {
        Ok(info) => {
            let mut response = next.run(request).await;
            if state.rate_limiter.config.enabled {
                set_headers(response.headers_mut(), info.limit, info.remaining, info.reset_after);
            }
            response
        }
        Err(retry_after) => {
            tracing::warn!(ip = %ip, tier = ?tier, "Rate limit exceeded");
            let mut response = ApiError::rate_limited(format!(
                "Rate limit exceeded. Try again in {} seconds.",
                retry_after
            ))
            .into_response();
            let headers = response.headers_mut();
            headers.insert("retry-after", HeaderValue::from(retry_after));
            set_headers(headers, state.rate_limiter.limit_for(tier), 0, retry_after);
            response
        }
    }
}

/// Spawn a background task to periodically clean up expired rate limit entries
pub fn spawn_cleanup_task(rate_limiter: Arc<RateLimiter>, cleanup_interval_secs: u64) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(cleanup_interval_secs.max(1));
        loop {
            tokio::time::sleep(interval).await;
            rate_limiter.cleanup_expired();
            tracing::debug!(
                "Rate limiter cleanup complete, {} entries remaining",
                rate_limiter.entry_count()
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            api_requests_per_window: 10,
            auth_requests_per_window: 3,
            window_seconds: 60,
            cleanup_interval: 300,
            trust_proxy: false,
        }
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, last))
    }

    #[test]
    fn test_blocks_after_limit() {
        let limiter = RateLimiter::new(test_config());

        for i in 0..10 {
            assert!(limiter.check(ip(1), RateLimitTier::Api).is_ok(), "request {}", i);
        }
        let retry_after = limiter.check(ip(1), RateLimitTier::Api).unwrap_err();
        assert!(retry_after >= 1 && retry_after <= 60);
    }

    #[test]
    fn test_remaining_counts_down() {
        let limiter = RateLimiter::new(test_config());
        let first = limiter.check(ip(1), RateLimitTier::Auth).unwrap();
        let second = limiter.check(ip(1), RateLimitTier::Auth).unwrap();
        assert_eq!(first.limit, 3);
        assert_eq!(first.remaining, 2);
        assert_eq!(second.remaining, 1);
    }

    #[test]
    fn test_ips_and_tiers_are_independent() {
        let limiter = RateLimiter::new(test_config());
        for _ in 0..3 {
            limiter.check(ip(1), RateLimitTier::Auth).unwrap();
        }

        assert!(limiter.check(ip(1), RateLimitTier::Auth).is_err());
        assert!(limiter.check(ip(1), RateLimitTier::Api).is_ok());
        assert!(limiter.check(ip(2), RateLimitTier::Auth).is_ok());
    }

    #[test]
    fn test_disabled_allows_everything() {
        let mut config = test_config();
        config.enabled = false;
        let limiter = RateLimiter::new(config);

        for _ in 0..100 {
            assert!(limiter.check(ip(1), RateLimitTier::Auth).is_ok());
        }
        assert_eq!(limiter.entry_count(), 0);
    }

    #[test]
    fn test_cleanup_keeps_recent_entries() {
        let limiter = RateLimiter::new(test_config());
        limiter.check(ip(1), RateLimitTier::Api).unwrap();
        limiter.cleanup_expired();
        assert_eq!(limiter.entry_count(), 1);
    }

    #[test]
    fn test_forwarding_headers_ignored_without_trusted_proxy() {
        let peer = Some(ip(40));
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, None, false), IpAddr::V4(Ipv4Addr::LOCALHOST));

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(client_ip(&headers, peer, false), ip(40));
    }

    #[test]
    fn test_client_ip_behind_trusted_proxy() {
        let peer = Some(ip(40));
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, peer, true), ip(40));

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(client_ip(&headers, peer, true), "10.0.0.9".parse::<IpAddr>().unwrap());

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers, peer, true), "203.0.113.7".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_rotating_forwarded_for_still_throttled() {
        use axum::{http::StatusCode, routing::post, Router};
        use tower::ServiceExt;

        let db = crate::db::connect_in_memory().await.unwrap();
        let mut config = crate::config::Config::default();
        config.rate_limit = test_config();
        let state = Arc::new(AppState::new(config, db));

        let app: Router = Router::new()
            .route("/login", post(|| async { "ok" }))
            .route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                rate_limit_auth,
            ))
            .with_state(state);

        let peer: SocketAddr = "198.51.100.20:51000".parse().unwrap();
        let mut statuses = Vec::new();
        for i in 0..5 {
            let mut request = Request::builder()
                .method("POST")
                .uri("/login")
                .header("x-forwarded-for", format!("203.0.113.{}", i))
                .body(Body::empty())
                .unwrap();
            request.extensions_mut().insert(ConnectInfo(peer));
            let response = app.clone().oneshot(request).await.unwrap();
            statuses.push(response.status());
        }

        assert_eq!(&statuses[..3], &[StatusCode::OK; 3]);
        assert_eq!(&statuses[3..], &[StatusCode::TOO_MANY_REQUESTS; 2]);
    }
}
