//! Caller-side retry.
//!
//! Nothing in the library retries on its own; front-ends wrap the calls
//! they consider safe to repeat.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::SyncError;

/// Errors that may succeed when the same call is repeated.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for SyncError {
    fn is_transient(&self) -> bool {
        SyncError::is_transient(self)
    }
}

/// Run `op` up to `attempts` times, sleeping `delay` between tries, as
/// long as it fails with a transient error.
pub async fn retry_transient<T, E, F, Fut>(attempts: usize, delay: Duration, mut op: F) -> Result<T, E>
where
    E: Transient + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt < attempts => {
                warn!(attempt, error = %e, "transient failure, retrying");
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retries_transient_until_success() {
        let calls = &AtomicUsize::new(0);
        let result = retry_transient(3, Duration::from_secs(2), || async move {
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 => Err(SyncError::Timeout),
                1 => Err(SyncError::ServerUnavailable(502)),
                n => Ok(n),
            }
        })
        .await;
        assert_eq!(result, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_error_is_not_retried() {
        let calls = &AtomicUsize::new(0);
        let result: Result<(), _> = retry_transient(5, Duration::from_secs(1), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(SyncError::CopayerVoted)
        })
        .await;
        assert_eq!(result, Err(SyncError::CopayerVoted));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_attempts() {
        let calls = &AtomicUsize::new(0);
        let result: Result<(), _> = retry_transient(3, Duration::from_secs(1), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(SyncError::Connection("refused".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
