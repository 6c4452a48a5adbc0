//! Bounded retry with backoff for transient store failures.
//!
//! Safe because a failed operation leaves no partial writes behind: the
//! store's row scopes either commit in full or mutate nothing. Only
//! `TransientStore` is retried; business rejections (insufficient quantity,
//! invalid transitions, structural errors) surface immediately.

use std::thread;
use std::time::Duration;

use tracing::warn;

use papermill_core::DomainResult;

/// How often and how patiently to retry a transient failure.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Sleep before the first retry; doubles per retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(10),
        }
    }
}

/// Run `op` until it succeeds, fails non-transiently, or exhausts the policy.
pub fn with_retry<T>(
    policy: &RetryPolicy,
    mut op: impl FnMut() -> DomainResult<T>,
) -> DomainResult<T> {
    let mut delay = policy.backoff;
    let mut attempt = 1u32;
    loop {
        match op() {
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                warn!(attempt, error = %e, "transient store failure, retrying");
                thread::sleep(delay);
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            other => return other,
        }
    }
}
