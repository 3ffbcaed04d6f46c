//! Rate-limited call wrapper for the remote row store.
//!
//! The Sheets API enforces undocumented per-minute quotas and signals them
//! with HTTP 429 / "Quota exceeded" errors. Every bulk read and every
//! mutation goes through `call_with_retry`, which is the only defense
//! against those limits.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::sheets::SheetsError;

/// Retry behavior for quota-classified failures. Injected rather than
/// hard-coded so tests can run with zero delays.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total tries, including the initial attempt.
    pub max_attempts: u32,
    /// Escalating waits before each retry; the last entry repeats if there
    /// are more retries than entries.
    pub backoff: Vec<Duration>,
    /// Fixed wait after every successful call, to smooth call bursts.
    pub post_call_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: vec![Duration::from_secs(2), Duration::from_secs(5)],
            post_call_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Zero-delay policy for tests.
    pub fn no_delay() -> Self {
        Self {
            max_attempts: 3,
            backoff: vec![Duration::ZERO, Duration::ZERO],
            post_call_delay: Duration::ZERO,
        }
    }

    fn backoff_for(&self, retry: u32) -> Duration {
        let idx = (retry as usize).min(self.backoff.len().saturating_sub(1));
        self.backoff.get(idx).copied().unwrap_or(Duration::ZERO)
    }
}

/// Invokes `op`, retrying quota-classified failures per `policy`.
///
/// Non-quota errors propagate immediately. Quota errors on the final attempt
/// surface as `SheetsError::RateLimited`. Successful calls are followed by
/// the policy's fixed smoothing delay.
pub async fn call_with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, SheetsError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SheetsError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => {
                if !policy.post_call_delay.is_zero() {
                    tokio::time::sleep(policy.post_call_delay).await;
                }
                return Ok(value);
            }
            Err(err) if err.is_quota() => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    return Err(SheetsError::RateLimited { attempts: attempt });
                }
                let delay = policy.backoff_for(attempt - 1);
                warn!(
                    "sheet call hit quota (attempt {attempt}/{}), retrying in {}ms",
                    policy.max_attempts,
                    delay.as_millis()
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn quota_err() -> SheetsError {
        SheetsError::Api {
            status: 429,
            message: "Quota exceeded for quota metric".to_string(),
        }
    }

    fn hard_err() -> SheetsError {
        SheetsError::Api {
            status: 400,
            message: "Invalid range".to_string(),
        }
    }

    #[tokio::test]
    async fn test_rate_limited_after_three_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = call_with_retry(&RetryPolicy::no_delay(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(quota_err())
            }
        })
        .await;

        assert!(matches!(
            result,
            Err(SheetsError::RateLimited { attempts: 3 })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_transient_quota_error_then_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = call_with_retry(&RetryPolicy::no_delay(), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(quota_err())
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_quota_error_propagates_without_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = call_with_retry(&RetryPolicy::no_delay(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(hard_err())
            }
        })
        .await;

        assert!(matches!(result, Err(SheetsError::Api { status: 400, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let result = call_with_retry(&RetryPolicy::no_delay(), || async { Ok("rows") }).await;
        assert_eq!(result.unwrap(), "rows");
    }

    #[test]
    fn test_backoff_escalates_then_repeats_last() {
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff: vec![Duration::from_secs(2), Duration::from_secs(5)],
            post_call_delay: Duration::ZERO,
        };
        assert_eq!(policy.backoff_for(0), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(1), Duration::from_secs(5));
        assert_eq!(policy.backoff_for(3), Duration::from_secs(5));
    }
}
