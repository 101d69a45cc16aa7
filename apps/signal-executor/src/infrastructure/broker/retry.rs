//! Retry policies with exponential backoff for venue API calls.
//!
//! | Retryable | Non-Retryable |
//! |-----------|---------------|
//! | HTTP 429 (Rate Limited) | HTTP 400 (Bad Request) |
//! | HTTP 408, 5xx | HTTP 401/403 (Auth Errors) |
//! | Network timeouts, connection reset | HTTP 404, 422 |

use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Retry policy configuration for venue API calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Initial backoff duration.
    #[serde(with = "millis")]
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    #[serde(with = "millis")]
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential growth.
    pub backoff_multiplier: f64,
    /// Jitter factor for randomization (0.2 = ±20%).
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Policy tuned for the MetaApi trade endpoint: many short retries while
    /// the terminal reconnects.
    #[must_use]
    pub const fn metaapi() -> Self {
        Self {
            max_attempts: 50,
            initial_backoff: Duration::from_millis(300),
            max_backoff: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }

    /// Single attempt, no retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter_factor: 0.0,
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Calculator for exponential backoff with jitter.
#[derive(Debug)]
pub struct ExponentialBackoff {
    current_attempt: u32,
    max_attempts: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
    backoff_multiplier: f64,
    jitter_factor: f64,
}

impl ExponentialBackoff {
    /// Create a new backoff calculator from a retry policy.
    #[must_use]
    pub const fn new(policy: &RetryPolicy) -> Self {
        Self {
            current_attempt: 0,
            max_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
            backoff_multiplier: policy.backoff_multiplier,
            jitter_factor: policy.jitter_factor,
        }
    }

    /// Record a failed attempt and get the delay before the next one.
    ///
    /// Returns `None` once the attempt budget is spent.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        self.current_attempt += 1;
        if self.current_attempt >= self.max_attempts {
            return None;
        }

        let base_ms = self.base_backoff_ms();
        let jittered_ms = self.apply_jitter(base_ms).min(self.max_backoff_ms);

        Some(Duration::from_millis(jittered_ms))
    }

    fn base_backoff_ms(&self) -> u64 {
        let exponent = i32::try_from(self.current_attempt - 1).unwrap_or(i32::MAX);
        let multiplier = self.backoff_multiplier.powi(exponent);
        let backoff = (self.initial_backoff_ms as f64 * multiplier) as u64;
        backoff.min(self.max_backoff_ms)
    }

    // Uniform in [backoff * (1 - jitter), backoff * (1 + jitter)].
    fn apply_jitter(&self, backoff_ms: u64) -> u64 {
        if self.jitter_factor <= 0.0 || backoff_ms == 0 {
            return backoff_ms;
        }
        let jitter_range = backoff_ms as f64 * self.jitter_factor;
        let min = (backoff_ms as f64 - jitter_range).max(0.0);
        let max = backoff_ms as f64 + jitter_range;

        rand::rng().random_range(min..=max) as u64
    }

    /// Number of failed attempts so far.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.current_attempt
    }
}

/// Error category for determining retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rate limited; honour `Retry-After` when present.
    RateLimited,
    /// Transient failure.
    Retryable,
    /// Permanent failure.
    NonRetryable,
}

/// Categorize an HTTP status code for retry handling.
#[must_use]
pub const fn categorize_status(status: StatusCode) -> ErrorCategory {
    match status.as_u16() {
        429 => ErrorCategory::RateLimited,
        408 | 500..=599 => ErrorCategory::Retryable,
        _ => ErrorCategory::NonRetryable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(max_attempts: u32, initial_ms: u64, max_ms: u64, multiplier: f64) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(initial_ms),
            max_backoff: Duration::from_millis(max_ms),
            backoff_multiplier: multiplier,
            jitter_factor: 0.0,
        }
    }

    #[test]
    fn backoff_doubles_until_budget_spent() {
        let mut backoff = ExponentialBackoff::new(&no_jitter(4, 100, 10_000, 2.0));

        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(400)));
        assert_eq!(backoff.next_backoff(), None);
        assert_eq!(backoff.attempts(), 4);
    }

    #[test]
    fn backoff_respects_max() {
        let mut backoff = ExponentialBackoff::new(&no_jitter(10, 1000, 5000, 10.0));

        backoff.next_backoff();
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn jitter_stays_in_range() {
        let policy = RetryPolicy {
            jitter_factor: 0.2,
            ..no_jitter(100, 1000, 60_000, 1.0)
        };
        let mut backoff = ExponentialBackoff::new(&policy);

        for _ in 0..50 {
            let delay = backoff.next_backoff().unwrap();
            assert!(delay >= Duration::from_millis(800) && delay <= Duration::from_millis(1200));
        }
    }

    #[test]
    fn single_attempt_policy_never_retries() {
        let mut backoff = ExponentialBackoff::new(&RetryPolicy::none());
        assert!(backoff.next_backoff().is_none());
    }

    #[test]
    fn metaapi_policy_matches_terminal_reconnect_window() {
        let policy = RetryPolicy::metaapi();
        assert_eq!(policy.max_attempts, 50);
        assert_eq!(policy.max_backoff, Duration::from_secs(1));
    }

    #[test]
    fn categorize_statuses() {
        assert_eq!(
            categorize_status(StatusCode::TOO_MANY_REQUESTS),
            ErrorCategory::RateLimited
        );
        assert_eq!(
            categorize_status(StatusCode::BAD_GATEWAY),
            ErrorCategory::Retryable
        );
        assert_eq!(
            categorize_status(StatusCode::REQUEST_TIMEOUT),
            ErrorCategory::Retryable
        );
        assert_eq!(
            categorize_status(StatusCode::NOT_FOUND),
            ErrorCategory::NonRetryable
        );
        assert_eq!(
            categorize_status(StatusCode::UNAUTHORIZED),
            ErrorCategory::NonRetryable
        );
    }

    #[test]
    fn policy_deserializes_millis() {
        let policy: RetryPolicy =
            serde_json::from_str(r#"{"max_attempts": 3, "initial_backoff": 250}"#).unwrap();

        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_backoff, Duration::from_millis(250));
        assert_eq!(policy.max_backoff, Duration::from_secs(30));
    }
}
