use axum::{
    body::Body,
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{collections::HashMap, sync::Arc, time::Duration, time::Instant};
use tokio::sync::RwLock;

use crate::error::ApiError;

/// Per-client token bucket. Refilled continuously at `max / window`, so a
/// client gets at most `max` requests in any `window`-sized burst.
#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(max_tokens: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_update: Instant::now(),
        }
    }

    fn try_consume(&mut self, refill_per_sec: f64, max_tokens: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_per_sec).min(max_tokens);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Sliding-window request limiter keyed by source address.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<RwLock<HashMap<String, TokenBucket>>>,
    refill_per_sec: f64,
    max_tokens: f64,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        let max_tokens = f64::from(max_requests);
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            refill_per_sec: max_tokens / window.as_secs_f64(),
            max_tokens,
        }
    }

    pub async fn check(&self, key: &str) -> bool {
        let mut buckets = self.buckets.write().await;

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.max_tokens));

        bucket.try_consume(self.refill_per_sec, self.max_tokens)
    }

    /// Drops buckets idle longer than `max_age`. Called from the
    /// maintenance sweep.
    pub async fn cleanup(&self, max_age: Duration) {
        let mut buckets = self.buckets.write().await;
        let now = Instant::now();

        buckets.retain(|_, bucket| now.duration_since(bucket.last_update) < max_age);
    }
}

/// Middleware rejecting requests over the limit with 429.
pub fn rate_limit_layer(
    limiter: RateLimiter,
) -> impl Fn(
    Request<Body>,
    Next,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Response> + Send>>
       + Clone
       + Send {
    move |request: Request<Body>, next: Next| {
        let limiter = limiter.clone();
        Box::pin(async move {
            let client_key = extract_client_ip(&request);

            if !limiter.check(&client_key).await {
                tracing::warn!(client = %client_key, path = %request.uri().path(), "rate limit exceeded");
                return (
                    [(header::RETRY_AFTER, "1")],
                    ApiError::RateLimited,
                )
                    .into_response();
            }

            next.run(request).await
        })
    }
}

/// Source address for limiting: X-Forwarded-For when present (first hop),
/// else the socket peer address.
fn extract_client_ip(request: &Request<Body>) -> String {
    if let Some(forwarded) = request.headers().get("x-forwarded-for") {
        if let Ok(s) = forwarded.to_str() {
            if let Some(ip) = s.split(',').next() {
                let ip = ip.trim();
                if !ip.is_empty() {
                    return ip.to_string();
                }
            }
        }
    }

    request
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_max_then_rejects() {
        let limiter = RateLimiter::new(5, Duration::from_secs(900));
        for _ in 0..5 {
            assert!(limiter.check("10.0.0.1").await);
        }
        assert!(!limiter.check("10.0.0.1").await);
    }

    #[tokio::test]
    async fn limits_are_per_client() {
        let limiter = RateLimiter::new(1, Duration::from_secs(900));
        assert!(limiter.check("10.0.0.1").await);
        assert!(!limiter.check("10.0.0.1").await);
        assert!(limiter.check("10.0.0.2").await);
    }

    #[tokio::test]
    async fn refills_over_time() {
        // 10 per 10ms window refills fast enough to observe in a test.
        let limiter = RateLimiter::new(10, Duration::from_millis(10));
        for _ in 0..10 {
            assert!(limiter.check("c").await);
        }
        assert!(!limiter.check("c").await);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(limiter.check("c").await);
    }

    #[tokio::test]
    async fn cleanup_drops_idle_buckets() {
        let limiter = RateLimiter::new(5, Duration::from_secs(900));
        limiter.check("old").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        limiter.cleanup(Duration::from_millis(1)).await;
        assert!(limiter.buckets.read().await.is_empty());
    }
}
