//! Shared resource limits: the completion rate limiter and retry policy.
//!
//! Both are explicit handles passed into components at construction time.
//! The fetch concurrency pool is a plain `Arc<tokio::sync::Semaphore>`.

pub mod rate_limit;
pub mod retry;

pub use rate_limit::{CompletionRateLimiter, RateLimit};
pub use retry::{retry, RetryConfig, Retryable};
