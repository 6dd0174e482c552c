use log::{error, warn};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1500);

/// Fixed-count, fixed-delay retry policy. No backoff growth, no jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Result of running an operation under a [`RetryPolicy`].
#[derive(Debug, PartialEq)]
pub enum RetryOutcome<T> {
    Done(T),
    Exhausted { attempts: u32, last_error: String },
}

impl<T> RetryOutcome<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            RetryOutcome::Done(value) => Some(value),
            RetryOutcome::Exhausted { .. } => None,
        }
    }
}

/// Runs `op` until it succeeds or `policy.retries` attempts have failed.
///
/// Every failed attempt except the last logs a warning and waits `policy.delay`.
/// Exhaustion logs one error and is reported as [`RetryOutcome::Exhausted`]; this
/// function never returns the underlying error itself.
pub async fn with_retry<T, E, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let retries = policy.retries.max(1);
    let mut last_error = String::new();

    for attempt in 1..=retries {
        match op().await {
            Ok(value) => return RetryOutcome::Done(value),
            Err(e) => {
                last_error = e.to_string();
                if attempt < retries {
                    warn!("[RETRY] {} attempt {}/{} failed: {}", label, attempt, retries, last_error);
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }

    error!("[ERROR] {}: {}", label, last_error);
    RetryOutcome::Exhausted {
        attempts: retries,
        last_error,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn policy() -> RetryPolicy {
        RetryPolicy::default()
    }

    #[tokio::test(start_paused = true)]
    async fn returns_value_after_k_failures_with_k_warnings() {
        test_log::reset();
        let calls = Cell::new(0u32);

        let outcome = with_retry(policy(), "flaky", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n <= 3 {
                    Err(format!("boom {}", n))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(outcome, RetryOutcome::Done(4));
        assert_eq!(calls.get(), 4);
        assert_eq!(test_log::warnings(), 3);
        assert_eq!(test_log::errors(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_op_is_exhausted_without_raising() {
        test_log::reset();
        let calls = Cell::new(0u32);

        let outcome: RetryOutcome<()> = with_retry(policy(), "dead", || {
            calls.set(calls.get() + 1);
            async { Err("connection refused") }
        })
        .await;

        assert_eq!(
            outcome,
            RetryOutcome::Exhausted {
                attempts: 5,
                last_error: "connection refused".to_string()
            }
        );
        assert_eq!(calls.get(), 5);
        assert_eq!(test_log::warnings(), 4);
        assert_eq!(test_log::errors(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_fixed_delay_between_attempts() {
        test_log::reset();
        let start = tokio::time::Instant::now();

        let _: RetryOutcome<()> = with_retry(policy(), "timed", || async { Err("nope") }).await;

        // Four gaps between five attempts, no sleep after the last one.
        assert_eq!(start.elapsed(), DEFAULT_RETRY_DELAY * 4);
    }

    #[tokio::test]
    async fn first_success_does_not_log() {
        test_log::reset();
        let outcome = with_retry(policy(), "ok", || async { Ok::<_, String>("fine") }).await;
        assert_eq!(outcome.ok(), Some("fine"));
        assert_eq!(test_log::warnings(), 0);
    }
}
