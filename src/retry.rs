//! Bounded retry with exponential backoff, jitter, and a wall-clock deadline (C2, §4.1).
//!
//! Grounded on the prototype's `monitor.py::http_retry`: the deadline defaults to 270s of a
//! 300s tick, HTTP 429 and transient failures both back off by `min(base_backoff * attempt, 30s,
//! remaining)`, and exhausting the deadline returns the caller's empty sentinel rather than
//! raising — a failed source must never abort a tick (§7, "source-unavailable").

use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::warn;

/// The outcome of a single retryable attempt.
pub enum Attempt<T> {
    Success(T),
    /// The server signalled a rate limit (HTTP 429): always worth a retry.
    RateLimited,
    /// Any other transient failure, carrying a short description for logging.
    Failed(String),
}

/// Retries `f` until it succeeds or `deadline` elapses, then returns `empty()`.
///
/// `base_backoff` and `deadline` are per-call configuration (typically from `TickConfig`).
pub async fn retry_with_deadline<T, F, Fut>(
    mut f: F,
    base_backoff: Duration,
    deadline: Duration,
    empty: impl FnOnce() -> T,
    source_name: &str,
) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let start = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let elapsed = start.elapsed();
        if elapsed >= deadline {
            warn!(source = source_name, attempt, "retry deadline exhausted, returning empty result");
            return empty();
        }

        match f().await {
            Attempt::Success(value) => return value,
            Attempt::RateLimited | Attempt::Failed(_) => {
                let remaining = deadline.saturating_sub(start.elapsed());
                if remaining.is_zero() {
                    warn!(source = source_name, attempt, "retry deadline exhausted mid-backoff");
                    return empty();
                }
                let jitter_ms = rand::thread_rng().gen_range(0..250);
                let backoff = Duration::from_secs_f64(
                    (base_backoff.as_secs_f64() * attempt as f64).min(30.0),
                )
                .min(remaining)
                    + Duration::from_millis(jitter_ms);
                let backoff = backoff.min(remaining);
                warn!(source = source_name, attempt, backoff_ms = backoff.as_millis() as u64, "retrying after backoff");
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn succeeds_on_first_try() {
        let result = retry_with_deadline(
            || async { Attempt::Success(42) },
            Duration::from_millis(10),
            Duration::from_secs(1),
            || 0,
            "test",
        )
        .await;
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let result = retry_with_deadline(
            move || {
                let calls = calls_clone.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Attempt::Failed("boom".into())
                    } else {
                        Attempt::Success(7)
                    }
                }
            },
            Duration::from_millis(1),
            Duration::from_secs(5),
            || 0,
            "test",
        )
        .await;
        assert_eq!(result, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_empty_sentinel_on_deadline_exhaustion() {
        let result: i32 = retry_with_deadline(
            || async { Attempt::Failed::<i32>("always fails".into()) },
            Duration::from_millis(1),
            Duration::from_millis(20),
            || -1,
            "test",
        )
        .await;
        assert_eq!(result, -1);
    }

    #[tokio::test]
    async fn rate_limited_is_retried_like_a_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let result = retry_with_deadline(
            move || {
                let calls = calls_clone.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n == 0 {
                        Attempt::RateLimited
                    } else {
                        Attempt::Success(1)
                    }
                }
            },
            Duration::from_millis(1),
            Duration::from_secs(5),
            || 0,
            "test",
        )
        .await;
        assert_eq!(result, 1);
    }
}
