//! Linear backoff retry for uploads

use std::future::Future;
use std::time::Duration;

use stowage_core::{BackendError, Error, ObjectKey, Result};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    max_attempts: u32,
    step: Duration,
}

impl RetryPolicy {
    /// Wait `attempt * 1s` after the `attempt`-th failure
    pub(crate) fn linear(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            step: Duration::from_secs(1),
        }
    }

    pub(crate) fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub(crate) fn backoff(&self, attempt: u32) -> Duration {
        self.step * attempt
    }

    /// Run `op` until it succeeds or the attempts run out; the last failure
    /// becomes the `Upload` error for `key`.
    pub(crate) async fn run<T, F, Fut>(&self, key: &ObjectKey, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, BackendError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(key = %key, attempt, max_attempts = self.max_attempts, "Upload attempt");

            match op().await {
                Ok(value) => return Ok(value),
                Err(source) if attempt >= self.max_attempts => {
                    return Err(Error::Upload {
                        key: key.to_string(),
                        attempts: attempt,
                        source,
                    });
                }
                Err(e) => {
                    let delay = self.backoff(attempt);
                    warn!(key = %key, attempt, error = %e, delay_secs = delay.as_secs(), "Upload attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::linear(3);
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(3));
    }

    #[test]
    fn test_at_least_one_attempt() {
        assert_eq!(RetryPolicy::linear(0).max_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_failures() {
        let policy = RetryPolicy::linear(5);
        let key = ObjectKey::new("", "a.txt");
        let calls = Cell::new(0u32);

        let start = tokio::time::Instant::now();
        let result = policy
            .run(&key, || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n <= 3 {
                        Err(BackendError::sdk("PutObject", "boom"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 4);
        assert_eq!(calls.get(), 4);
        // 1s + 2s + 3s
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(6));
        assert!(elapsed < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_surfaces_last_error() {
        let policy = RetryPolicy::linear(2);
        let key = ObjectKey::new("p", "a.txt");
        let calls = Cell::new(0u32);

        let result: Result<()> = policy
            .run(&key, || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { Err(BackendError::sdk("PutObject", format!("failure {}", n))) }
            })
            .await;

        match result {
            Err(Error::Upload {
                key,
                attempts,
                source,
            }) => {
                assert_eq!(key, "p/a.txt");
                assert_eq!(attempts, 2);
                assert_eq!(source.to_string(), "PutObject failed: failure 2");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(calls.get(), 2);
    }
}
