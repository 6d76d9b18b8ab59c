//! Bounded retry loop shared by the request path.

use std::future::Future;

use tracing::{debug, warn};

use contracts::{Destination, RelayError, RetryConfig};

/// Run `op` up to `max_retries` times against one destination.
///
/// Each attempt is bounded by the configured attempt timeout; an
/// attempt that overruns counts as a transient failure. Permanent
/// errors short-circuit the loop, retrying them cannot change the
/// outcome. The delay between attempts is fixed, no backoff: the
/// request path is already latency-bounded by `max_retries`.
pub async fn with_retry<T, F, Fut>(
    destination: Destination,
    retry: &RetryConfig,
    mut op: F,
) -> Result<T, RelayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RelayError>>,
{
    let attempts = retry.max_retries.max(1);
    let mut last_err = RelayError::Unavailable { destination };

    for attempt in 1..=attempts {
        let outcome = match tokio::time::timeout(retry.attempt_timeout(), op()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(RelayError::Timeout {
                destination,
                timeout_ms: retry.attempt_timeout().as_millis() as u64,
            }),
        };

        match outcome {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        destination = destination.as_str(),
                        attempt, "delivery succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => {
                warn!(
                    destination = destination.as_str(),
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "delivery attempt failed"
                );
                last_err = e;
                if attempt < attempts {
                    tokio::time::sleep(retry.retry_delay()).await;
                }
            }
        }
    }

    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            retry_delay_s: 0,
            attempt_timeout_s: 1,
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result = with_retry(Destination::Storage, &fast_retry(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, RelayError>(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let calls = AtomicU32::new(0);
        let result = with_retry(Destination::Storage, &fast_retry(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(RelayError::connection(Destination::Storage, "refused"))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(Destination::RemoteApi, &fast_retry(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RelayError::connection(Destination::RemoteApi, "refused")) }
        })
        .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_short_circuits() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(Destination::Storage, &fast_retry(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(RelayError::UnassignedDevice {
                    machine_id: "m1".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(
            result.unwrap_err(),
            RelayError::UnassignedDevice { .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_attempt_times_out() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(Destination::Storage, &fast_retry(2), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(std::time::Duration::from_secs(10)).await;
                Ok(())
            }
        })
        .await;

        assert!(matches!(result.unwrap_err(), RelayError::Timeout { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
