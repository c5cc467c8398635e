//! Retry with exponential backoff for command execution

use std::time::{Duration, SystemTime};

/// Retry policy for transient execution failures
///
/// Controls how many times a failed command is retried and how long to wait
/// between attempts. The command keeps its id across attempts, so a retry
/// that reaches the server twice is replayed rather than applied twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay between retries (doubles each attempt)
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

/// Determine whether an HTTP status and response body indicate a recoverable error.
///
/// Recoverable errors are worth retrying: rate limits (429), server errors (5xx),
/// and transient network-level failures surfaced in the body text.
#[must_use]
pub fn is_recoverable(status: u16, body: &str) -> bool {
    if status == 429 {
        return true;
    }

    if (500..600).contains(&status) {
        return true;
    }

    let lower = body.to_lowercase();
    lower.contains("connection reset") || lower.contains("timed out") || lower.contains("dns error")
}

/// Compute the delay before the next retry attempt.
///
/// `min(base_delay * 2^attempt + jitter, max_delay)`, with jitter of 0-25%
/// of the computed delay derived from the system clock.
#[must_use]
pub fn delay_for_attempt(policy: &RetryPolicy, attempt: u32) -> Duration {
    let base = policy
        .base_delay
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(policy.max_delay);

    let jitter_nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();

    let jitter_fraction = f64::from(jitter_nanos % 250) / 1000.0;
    let jitter = base.mul_f64(jitter_fraction);

    (base + jitter).min(policy.max_delay)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_statuses() {
        assert!(is_recoverable(429, ""));
        assert!(is_recoverable(500, ""));
        assert!(is_recoverable(503, ""));
        assert!(is_recoverable(599, ""));
    }

    #[test]
    fn client_errors_are_final() {
        for status in [200, 400, 401, 404, 422] {
            assert!(!is_recoverable(status, ""), "{status}");
        }
    }

    #[test]
    fn network_text_is_recoverable() {
        assert!(is_recoverable(0, "Connection Reset by peer"));
        assert!(is_recoverable(0, "operation timed out"));
        assert!(is_recoverable(0, "dns error: no such host"));
    }

    #[test]
    fn delay_grows_then_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
        };

        let first = delay_for_attempt(&policy, 0);
        assert!(first >= Duration::from_millis(100));
        assert!(first <= Duration::from_millis(125));

        let third = delay_for_attempt(&policy, 2);
        assert!(third >= Duration::from_millis(400));
        assert!(third <= Duration::from_millis(500));

        assert_eq!(delay_for_attempt(&policy, 10), Duration::from_secs(1));
    }

    #[test]
    fn none_policy_has_no_delay() {
        let policy = RetryPolicy::none();
        assert_eq!(policy.max_retries, 0);
        assert_eq!(delay_for_attempt(&policy, 3), Duration::ZERO);
    }
}
