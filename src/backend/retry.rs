use log::warn;
use std::future::Future;
use std::time::Duration;

use crate::error::{FetchError, Result};

const MAX_DELAY: Duration = Duration::from_secs(300);

/// Wait before the `retry`-th retry (1-based), capped at [`MAX_DELAY`].
fn delay_for(base_delay: Duration, retry: usize) -> Duration {
    u32::try_from(retry - 1)
        .ok()
        .and_then(|exp| 2u32.checked_pow(exp))
        .and_then(|factor| base_delay.checked_mul(factor))
        .map_or(MAX_DELAY, |delay| delay.min(MAX_DELAY))
}

/// Runs `op`, retrying up to `retries` more times. The k-th retry waits
/// `base_delay * 2^k` (1s, 2s, 4s for the defaults).
pub async fn with_backoff<T, F, Fut>(
    what: &str,
    retries: usize,
    base_delay: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = retries.saturating_add(1);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            // Retrying cannot fix a bad id.
            Err(e @ FetchError::InvalidId(_)) => return Err(e),
            Err(e) => {
                attempt += 1;
                if attempt >= attempts {
                    log::error!("{} failed after {} attempts: {}", what, attempts, e);
                    return Err(FetchError::Exhausted {
                        attempts,
                        source: Box::new(e),
                    });
                }
                let delay = delay_for(base_delay, attempt);
                warn!("retry {}/{} for {} in {:?}: {}", attempt, retries, what, delay, e);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicUsize::new(0);
        let result = with_backoff("pages", 3, Duration::ZERO, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(FetchError::Malformed("flaky".into()))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_all_retries() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = with_backoff("pages", 3, Duration::ZERO, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::Malformed("down".into()))
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(FetchError::Exhausted { attempts, source }) => {
                assert_eq!(attempts, 4);
                assert!(matches!(*source, FetchError::Malformed(_)));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn invalid_ids_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = with_backoff("pages", 3, Duration::ZERO, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::InvalidId("a.b".into()))
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(FetchError::InvalidId(_))));
    }

    #[test]
    fn huge_retry_counts_are_capped() {
        let base = Duration::from_secs(1);
        assert_eq!(delay_for(base, 1), base);
        assert_eq!(delay_for(base, 3), Duration::from_secs(4));
        assert_eq!(delay_for(base, 33), MAX_DELAY);
        assert_eq!(delay_for(base, usize::MAX), MAX_DELAY);
        assert_eq!(delay_for(Duration::MAX, 2), MAX_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_double_each_time() {
        let start = tokio::time::Instant::now();
        let _: Result<()> = with_backoff("pages", 3, Duration::from_secs(1), || async {
            Err(FetchError::Malformed("down".into()))
        })
        .await;
        assert_eq!(start.elapsed(), Duration::from_secs(7));
    }
}
