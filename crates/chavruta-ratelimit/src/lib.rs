#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

//! Per-IP request limiter for the MCP routes

mod error;

pub use error::RateLimitError;

use std::{num::NonZeroU32, sync::Arc, time::Duration};

use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DashMapStateStore};

type KeyedLimiter = RateLimiter<String, DashMapStateStore<String>, DefaultClock>;

/// Sliding-window limiter keyed by client IP
#[derive(Clone)]
pub struct RequestLimiter {
    limiter: Arc<KeyedLimiter>,
    max_requests: u32,
    window: Duration,
}

impl RequestLimiter {
    /// Create a limiter allowing `max_requests` per `window` per key
    pub fn new(max_requests: u32, window: Duration) -> Result<Self, RateLimitError> {
        if window.is_zero() {
            return Err(RateLimitError::Config("rate limit window must be > 0".to_string()));
        }
        let per_second = f64::from(max_requests.max(1)) / window.as_secs_f64();

        // Convert to governor's quota format
        let replenish_interval = Duration::from_secs_f64(1.0 / per_second);
        let burst = NonZeroU32::new(max_requests.max(1))
            .ok_or_else(|| RateLimitError::Config("max_requests must be > 0".to_string()))?;

        let quota = Quota::with_period(replenish_interval)
            .ok_or_else(|| RateLimitError::Config("invalid rate limit period".to_string()))?
            .allow_burst(burst);

        Ok(Self {
            limiter: Arc::new(RateLimiter::dashmap(quota)),
            max_requests,
            window,
        })
    }

    /// Check whether a request from `ip` is allowed
    pub fn check_ip(&self, ip: &str) -> Result<(), RateLimitError> {
        match self.limiter.check_key(&ip.to_string()) {
            Ok(()) => Ok(()),
            Err(not_until) => {
                let retry_after =
                    not_until.wait_time_from(governor::clock::Clock::now(&DefaultClock::default()));
                Err(RateLimitError::Exceeded {
                    retry_after: retry_after.as_secs().max(1),
                })
            }
        }
    }

    /// Configured request cap per window (for `RateLimit-*` headers)
    pub const fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Configured window length (for `RateLimit-*` headers)
    pub const fn window(&self) -> Duration {
        self.window
    }
}
