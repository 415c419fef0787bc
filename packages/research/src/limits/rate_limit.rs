//! Global rate limiting for completion calls.
//!
//! Uses the governor crate. Calls are spaced `per / requests` apart with a
//! burst of one, so any window of length `per` admits at most `requests`
//! calls no matter how many pages are summarized concurrently.

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::error::ConfigError;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// `requests` per `per` interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub requests: u32,
    pub per: Duration,
}

impl RateLimit {
    pub fn new(requests: u32, per: Duration) -> Self {
        Self { requests, per }
    }

    pub fn per_second(requests: u32) -> Self {
        Self::new(requests, Duration::from_secs(1))
    }

    pub fn per_minute(requests: u32) -> Self {
        Self::new(requests, Duration::from_secs(60))
    }

    /// Minimum spacing between two calls.
    pub fn period(&self) -> Duration {
        self.per / self.requests.max(1)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.requests == 0 {
            return Err(ConfigError::invalid(
                "summarizer_rate_limit",
                "requests must be at least 1",
            ));
        }
        if self.period().is_zero() {
            return Err(ConfigError::invalid(
                "summarizer_rate_limit",
                "interval is too short for the request count",
            ));
        }
        Ok(())
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::per_minute(30)
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.per.as_millis();
        if millis % 1000 == 0 {
            write!(f, "{}/{}s", self.requests, millis / 1000)
        } else {
            write!(f, "{}/{}ms", self.requests, millis)
        }
    }
}

impl FromStr for RateLimit {
    type Err = ConfigError;

    /// Parses `30/60s`, `1/s`, `100/m`, `2/1h`, `5/500ms`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format_err = || ConfigError::RateLimitFormat {
            input: s.to_string(),
        };

        let (requests, interval) = s.trim().split_once('/').ok_or_else(format_err)?;
        let requests: u32 = requests.trim().parse().map_err(|_| format_err())?;

        let interval = interval.trim();
        let split = interval
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(format_err)?;
        let (amount, unit) = interval.split_at(split);
        let amount: u64 = if amount.is_empty() {
            1
        } else {
            amount.parse().map_err(|_| format_err())?
        };

        let per = match unit {
            "ms" => Duration::from_millis(amount),
            "s" | "sec" => Duration::from_secs(amount),
            "m" | "min" => Duration::from_secs(amount * 60),
            "h" => Duration::from_secs(amount * 3600),
            _ => return Err(format_err()),
        };

        let limit = Self::new(requests, per);
        limit.validate()?;
        Ok(limit)
    }
}

/// Shared limiter gating every call to the completion service.
pub struct CompletionRateLimiter {
    limiter: DirectRateLimiter,
    limit: RateLimit,
}

impl CompletionRateLimiter {
    pub fn new(limit: RateLimit) -> Result<Self, ConfigError> {
        limit.validate()?;
        let quota = Quota::with_period(limit.period()).ok_or_else(|| {
            ConfigError::invalid("summarizer_rate_limit", "zero period between requests")
        })?;

        Ok(Self {
            limiter: RateLimiter::direct(quota),
            limit,
        })
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Wait until the next call is allowed.
    ///
    /// Dropping the returned future gives up the wait without consuming a
    /// permit.
    pub async fn until_ready(&self) {
        self.limiter.until_ready().await;
        debug!(limit = %self.limit, "Completion rate limit permit granted");
    }
}

impl fmt::Debug for CompletionRateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionRateLimiter")
            .field("limit", &self.limit)
            .finish()
    }
}
