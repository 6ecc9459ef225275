use std::future::Future;
use std::time::Duration;

use tracing::warn;

use vital_watch_data::repository::RepositoryError;

/// Bounded retry for store calls that fail transiently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Fixed pause between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Run `op` once, with no retries
    pub fn none() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Run `op`, retrying while it fails with a transient error and attempts remain
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, RepositoryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RepositoryError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Err(e) if e.is_transient() && attempt < self.attempts => {
                    warn!(operation, attempt, error = %e, "Transient store failure, retrying");
                    attempt += 1;
                    if !self.backoff.is_zero() {
                        tokio::time::sleep(self.backoff).await;
                    }
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy { attempts: 3, backoff: Duration::ZERO };

        let result = policy
            .run("flaky", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(RepositoryError::Unavailable("down".to_string()))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(tokio_test::assert_ok!(result), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_last_attempt() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy { attempts: 2, backoff: Duration::ZERO };

        let result: Result<(), _> = policy
            .run("down", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RepositoryError::Unavailable("down".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = RetryPolicy::default()
            .run("invalid", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RepositoryError::Validation("bad".to_string()))
            })
            .await;

        assert!(matches!(result, Err(RepositoryError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
