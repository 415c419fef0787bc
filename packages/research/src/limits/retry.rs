//! Bounded retry with jittered exponential backoff.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{ErrorKind, FetchError, SearchError, SummarizeError};

/// Longest backoff hint we are willing to honor.
const MAX_HINT: Duration = Duration::from_secs(120);

/// Relative jitter applied to each computed delay (plus or minus).
const JITTER_FACTOR: f64 = 0.2;

/// Retry settings for one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delay after failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        let base = self.initial_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());

        self.jittered(capped)
    }

    /// Delay honoring a backend hint when present. The hint is jittered too,
    /// so callers that got the same `Retry-After` do not retry in lockstep.
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        match hint {
            Some(hint) => self.jittered(hint.min(MAX_HINT).as_secs_f64()),
            None => self.backoff(attempt),
        }
    }

    fn jittered(&self, secs: f64) -> Duration {
        let actual = if self.jitter {
            let jitter = (fastrand::f64() - 0.5) * 2.0 * JITTER_FACTOR;
            secs * (1.0 + jitter)
        } else {
            secs
        };
        Duration::from_secs_f64(actual.max(0.0))
    }
}

/// Errors that know whether they are worth retrying.
pub trait Retryable: std::fmt::Display {
    fn kind(&self) -> ErrorKind;

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for FetchError {
    fn kind(&self) -> ErrorKind {
        FetchError::kind(self)
    }
}

impl Retryable for SearchError {
    fn kind(&self) -> ErrorKind {
        SearchError::kind(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        SearchError::retry_after(self)
    }
}

impl Retryable for SummarizeError {
    fn kind(&self) -> ErrorKind {
        SummarizeError::kind(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        SummarizeError::retry_after(self)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable kind, or runs out
/// of attempts. `op` receives the 1-based attempt number.
pub async fn retry<T, E, F, Fut>(config: &RetryConfig, operation: &str, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => {
                let kind = error.kind();
                if !kind.is_retryable() || attempt >= max_attempts {
                    debug!(
                        operation,
                        attempt,
                        kind = %kind,
                        error = %error,
                        "Giving up"
                    );
                    return Err(error);
                }

                let delay = config.delay_for(attempt, error.retry_after());
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    kind = %kind,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying"
                );
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig::default()
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5))
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = RetryConfig::default().without_jitter();
        assert_eq!(config.backoff(1), Duration::from_millis(500));
        assert_eq!(config.backoff(2), Duration::from_secs(1));
        assert_eq!(config.backoff(3), Duration::from_secs(2));
        assert_eq!(config.backoff(10), Duration::from_secs(8));
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let config = RetryConfig::default();
        for _ in 0..100 {
            let delay = config.backoff(2);
            assert!(delay >= Duration::from_millis(800), "{:?}", delay);
            assert!(delay <= Duration::from_millis(1200), "{:?}", delay);
        }
    }

    #[test]
    fn test_hint_wins_over_backoff() {
        let config = RetryConfig::default().without_jitter();
        assert_eq!(
            config.delay_for(1, Some(Duration::from_secs(3))),
            Duration::from_secs(3)
        );
        assert_eq!(
            config.delay_for(1, Some(Duration::from_secs(3600))),
            MAX_HINT
        );
    }

    #[test]
    fn test_hint_is_jittered() {
        let config = RetryConfig::default();
        let delays: Vec<Duration> = (0..100)
            .map(|_| config.delay_for(1, Some(Duration::from_secs(10))))
            .collect();
        for delay in &delays {
            assert!(*delay >= Duration::from_secs(8), "{:?}", delay);
            assert!(*delay <= Duration::from_secs(12), "{:?}", delay);
        }
        assert!(delays.iter().any(|d| *d != delays[0]));
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, FetchError> = retry(&fast(), "fetch", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(FetchError::Timeout {
                        url: "https://a.com".into(),
                    })
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stops_at_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), FetchError> = retry(&fast(), "fetch", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(FetchError::Timeout {
                    url: "https://a.com".into(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_never_retries_blocked() {
        let calls = AtomicU32::new(0);
        let result: Result<(), FetchError> = retry(&fast(), "fetch", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(FetchError::Blocked {
                    url: "https://a.com".into(),
                    status: 403,
                })
            }
        })
        .await;

        assert!(matches!(result, Err(FetchError::Blocked { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
