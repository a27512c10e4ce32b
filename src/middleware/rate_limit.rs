use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    task::{Context, Poll},
    time::{Duration, Instant},
};

use axum::{
    body::Body,
    http::Request as HttpRequest,
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use tower::{Layer, Service};

use crate::error::AppError;

/// Operation names the registry is seeded with at startup. Routes reference
/// these instead of ad-hoc strings so a typo fails loudly in review.
pub mod operations {
    pub const AUTH: &str = "auth";
    pub const EMAIL_VERIFICATION: &str = "email_verification";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const PASSWORD_CHANGE: &str = "password_change";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

/// Greedy-refill token bucket: `capacity` requests per `window`, refilled
/// continuously rather than in steps.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: u32, window: Duration) -> Self {
        let capacity = f64::from(capacity.max(1));
        let window_secs = window.as_secs_f64().max(0.001);
        Self {
            capacity,
            refill_per_sec: capacity / window_secs,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn try_acquire(&self) -> RateLimitDecision {
        // Fail open on a poisoned lock; availability beats throttling here.
        let Ok(mut state) = self.state.lock() else {
            return RateLimitDecision::Allowed;
        };

        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            RateLimitDecision::Allowed
        } else {
            RateLimitDecision::Limited
        }
    }
}

/// Process-wide bucket registry keyed by operation name, built once at
/// startup. Buckets are global per operation, not per client.
#[derive(Clone, Default)]
pub struct RateLimiterRegistry {
    buckets: HashMap<&'static str, Arc<TokenBucket>>,
}

impl RateLimiterRegistry {
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.register(
            operations::AUTH,
            TokenBucket::new(5, Duration::from_secs(60)),
        );
        registry.register(
            operations::EMAIL_VERIFICATION,
            TokenBucket::new(3, Duration::from_secs(5 * 60)),
        );
        registry.register(
            operations::REFRESH_TOKEN,
            TokenBucket::new(10, Duration::from_secs(60)),
        );
        registry.register(
            operations::PASSWORD_CHANGE,
            TokenBucket::new(3, Duration::from_secs(60 * 60)),
        );
        registry
    }

    pub fn register(&mut self, operation: &'static str, bucket: TokenBucket) {
        self.buckets.insert(operation, Arc::new(bucket));
    }

    pub fn check(&self, operation: &str) -> RateLimitDecision {
        match self.buckets.get(operation) {
            Some(bucket) => bucket.try_acquire(),
            None => RateLimitDecision::Allowed,
        }
    }

    pub fn layer(&self, operation: &'static str, message: &'static str) -> RateLimitLayer {
        let bucket = self.buckets.get(operation).cloned();
        if bucket.is_none() {
            tracing::warn!(operation, "no rate limiter registered, requests pass through");
        }
        RateLimitLayer { bucket, message }
    }
}

#[derive(Clone)]
pub struct RateLimitLayer {
    bucket: Option<Arc<TokenBucket>>,
    message: &'static str,
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimited<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimited {
            inner,
            bucket: self.bucket.clone(),
            message: self.message,
        }
    }
}

#[derive(Clone)]
pub struct RateLimited<S> {
    inner: S,
    bucket: Option<Arc<TokenBucket>>,
    message: &'static str,
}

impl<S> Service<HttpRequest<Body>> for RateLimited<S>
where
    S: Service<HttpRequest<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: HttpRequest<Body>) -> Self::Future {
        let bucket = self.bucket.clone();
        let message = self.message;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if let Some(bucket) = bucket
                && bucket.try_acquire() == RateLimitDecision::Limited
            {
                return Ok(AppError::too_many_requests(message).into_response());
            }

            inner.call(req).await
        })
    }
}
