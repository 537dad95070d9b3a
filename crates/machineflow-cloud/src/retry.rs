//! Retry/backoff engine for remote API calls
//!
//! Two policies cover every remote call the driver makes:
//!
//! - [`RetryPolicy::throttling`] wraps each individual API call and retries
//!   only rate-limit errors, with a jittered delay.
//! - [`RetryPolicy::convergence`] drives state polling with a short fixed delay.

use crate::error::{CloudError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// HTTP statuses the provider uses to signal rate limiting
pub const THROTTLING_STATUS_CODES: [u16; 2] = [429, 503];

/// Error text markers used when no HTTP status is available
const THROTTLING_PATTERNS: [&str; 3] = ["requestlimitexceeded", "throttling", "too many requests"];

pub const DEFAULT_THROTTLING_MAX_ATTEMPTS: u32 = 60;
pub const DEFAULT_THROTTLING_MIN_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_THROTTLING_MAX_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_CONVERGENCE_MAX_ATTEMPTS: u32 = 180;
pub const DEFAULT_CONVERGENCE_DELAY: Duration = Duration::from_secs(1);

/// Whether an error is a transient throttling condition
///
/// The transport status decides when present; the textual description is only
/// consulted for errors that never produced one.
pub fn is_throttling_error(err: &CloudError) -> bool {
    if let Some(status) = err.status() {
        return THROTTLING_STATUS_CODES.contains(&status);
    }

    match err {
        CloudError::Transport(message) => {
            let lower = message.to_lowercase();
            THROTTLING_PATTERNS.iter().any(|p| lower.contains(p))
        }
        _ => false,
    }
}

/// Provider error type answered for identifiers that do not exist
pub const NOT_FOUND_ERROR_TYPE: &str = "InvalidResource";

/// Whether an error says the targeted resource does not exist
pub fn is_not_found_error(err: &CloudError) -> bool {
    match err {
        CloudError::ResourceNotFound(_) => true,
        CloudError::Api { status: 404, .. } => true,
        CloudError::Api { errors, .. } => errors
            .iter()
            .any(|e| e.error_type.as_deref() == Some(NOT_FOUND_ERROR_TYPE)),
        _ => false,
    }
}

/// Whether a poll round ended before the resource converged
pub fn is_not_converged(err: &CloudError) -> bool {
    matches!(
        err,
        CloudError::StateMismatch { .. } | CloudError::ResourceNotFound(_)
    )
}

/// Delay between two attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    Fixed(Duration),
    /// Uniformly random in `[min, max]`
    Jitter { min: Duration, max: Duration },
}

impl Delay {
    pub fn next(&self) -> Duration {
        match *self {
            Delay::Fixed(d) => d,
            Delay::Jitter { min, max } => {
                if max <= min {
                    return min;
                }
                let ms = rand::rng().random_range(min.as_millis() as u64..=max.as_millis() as u64);
                Duration::from_millis(ms)
            }
        }
    }
}

/// Configuration for one class of retries
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Name used in logs
    pub name: &'static str,

    /// Total number of attempts, including the first one
    pub max_attempts: u32,

    pub delay: Delay,

    retryable: fn(&CloudError) -> bool,
}

impl RetryPolicy {
    pub fn new(
        name: &'static str,
        max_attempts: u32,
        delay: Delay,
        retryable: fn(&CloudError) -> bool,
    ) -> Self {
        Self {
            name,
            max_attempts: max_attempts.max(1),
            delay,
            retryable,
        }
    }

    /// Long randomized backoff for rate-limited calls
    pub fn throttling() -> Self {
        Self::new(
            "throttling",
            DEFAULT_THROTTLING_MAX_ATTEMPTS,
            Delay::Jitter {
                min: DEFAULT_THROTTLING_MIN_DELAY,
                max: DEFAULT_THROTTLING_MAX_DELAY,
            },
            is_throttling_error,
        )
    }

    /// Short fixed delay for "not yet in the target state" polling
    pub fn convergence() -> Self {
        Self::new(
            "convergence",
            DEFAULT_CONVERGENCE_MAX_ATTEMPTS,
            Delay::Fixed(DEFAULT_CONVERGENCE_DELAY),
            is_not_converged,
        )
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_delay(mut self, delay: Delay) -> Self {
        self.delay = delay;
        self
    }

    pub fn is_retryable(&self, err: &CloudError) -> bool {
        (self.retryable)(err)
    }
}

/// The pair of policies every lifecycle operation runs under
#[derive(Debug, Clone)]
pub struct RetryPolicies {
    pub throttling: RetryPolicy,
    pub convergence: RetryPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            throttling: RetryPolicy::throttling(),
            convergence: RetryPolicy::convergence(),
        }
    }
}

impl RetryPolicies {
    /// Same classification, no waiting between attempts
    pub fn immediate() -> Self {
        let none = Delay::Fixed(Duration::ZERO);
        Self {
            throttling: RetryPolicy::throttling().with_delay(none),
            convergence: RetryPolicy::convergence().with_delay(none),
        }
    }
}

/// Run `operation` until it succeeds, fails terminally or attempts run out
///
/// The terminal error is returned as produced by the last attempt. Cancelling
/// `cancel` aborts the wait between two attempts with [`CloudError::Cancelled`].
pub async fn execute_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 1;

    loop {
        if cancel.is_cancelled() {
            return Err(CloudError::Cancelled);
        }

        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if attempt >= policy.max_attempts || !policy.is_retryable(&err) {
            if attempt > 1 {
                tracing::debug!(
                    policy = policy.name,
                    attempts = attempt,
                    "giving up: {}",
                    err
                );
            }
            return Err(err);
        }

        let delay = policy.delay.next();
        tracing::debug!(
            policy = policy.name,
            attempt,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "retrying after: {}",
            err
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(CloudError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
    }
}
