// Retry with exponential backoff for transport calls

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Run `operation` until it succeeds or `max_attempts` is reached.
///
/// Waits `base_delay * 2^(attempt-1)` between attempts.
pub async fn with_retry<F, Fut, T, E>(operation: F, max_attempts: u32, base_delay: Duration) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    with_retry_if(operation, |_| true, max_attempts, base_delay).await
}

/// Like [`with_retry`], but gives up at once on errors `should_retry` rejects.
pub async fn with_retry_if<F, Fut, T, E, P>(
    mut operation: F,
    should_retry: P,
    max_attempts: u32,
    base_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                attempt += 1;
                if attempt >= max_attempts || !should_retry(&error) {
                    return Err(error);
                }

                let delay = base_delay * 2u32.pow((attempt - 1).min(5));
                warn!(attempt, error = %error, delay_ms = delay.as_millis() as u64, "Retrying after failure");
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<u32, String> = with_retry(
            move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("attempt {} failed", n))
                } else {
                    Ok(n)
                }
            },
            3,
            Duration::from_millis(1),
        )
        .await;
        assert_eq!(result, Ok(3));
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), String> = with_retry(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("down".to_string())
            },
            2,
            Duration::from_millis(1),
        )
        .await;
        assert_eq!(result, Err("down".to_string()));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_stops_on_permanent_error() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), String> = with_retry_if(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("forbidden".to_string())
            },
            |e: &String| e != "forbidden",
            3,
            Duration::from_millis(1),
        )
        .await;
        assert_eq!(result, Err("forbidden".to_string()));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
