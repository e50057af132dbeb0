//! Rate limiting middleware using token bucket algorithm

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use ragforge_common::{config::RateLimitConfig, errors::AppError};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter using governor crate
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Limiter plus the configured rate, for error reporting
#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<GlobalRateLimiter>,
    requests_per_second: u32,
}

impl RateLimit {
    /// Build from config; `None` when limiting is disabled
    pub fn from_config(config: &RateLimitConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        Some(Self {
            limiter: create_rate_limiter(config.requests_per_second, config.burst),
            requests_per_second: config.requests_per_second.max(1),
        })
    }
}

/// Create a new rate limiter. Zero rates are raised to one.
pub fn create_rate_limiter(requests_per_second: u32, burst: u32) -> Arc<GlobalRateLimiter> {
    let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(burst).unwrap_or(rate);
    let quota = Quota::per_second(rate).allow_burst(burst);

    Arc::new(RateLimiter::direct(quota))
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(rate_limit): State<RateLimit>,
    request: Request,
    next: Next,
) -> Response {
    match rate_limit.limiter.check() {
        Ok(_) => next.run(request).await,
        Err(_) => AppError::RateLimited {
            limit: rate_limit.requests_per_second,
        }
        .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = create_rate_limiter(100, 200);
        assert!(limiter.check().is_ok());
    }

    #[test]
    fn test_burst_exhaustion() {
        let limiter = create_rate_limiter(1, 2);
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }

    #[test]
    fn test_zero_values_do_not_panic() {
        let limiter = create_rate_limiter(0, 0);
        assert!(limiter.check().is_ok());
    }

    #[test]
    fn test_disabled_config() {
        let config = RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        };
        assert!(RateLimit::from_config(&config).is_none());
    }
}
