//! Bounded retry with constant delay and a one-shot fallback.
//!
//! This is the resilience mechanism for every live fetch in the crate. The
//! delay is a flat second rather than an exponential curve: observed failures
//! are almost always short network blips between browser, proxy and Tally,
//! not load shedding, and a dashboard user will not wait out a long curve
//! anyway. Retry count and fallback are orthogonal, and there is no
//! cancellation path; a slow backend consumes its transport timeout budget.

use crate::source::SourceError;
use backoff::backoff::Backoff;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Default attempt budget for a primary source.
pub const DEFAULT_MAX_RETRIES: usize = 2;

const RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Constant-delay policy allowing a bounded number of attempts.
#[derive(Debug, Clone)]
struct Attempts {
    delay: Duration,
    remaining: usize,
    budget: usize,
}

impl Attempts {
    /// Allow `max_attempts` total attempts, so `max_attempts - 1` delays.
    fn new(max_attempts: usize, delay: Duration) -> Self {
        let budget = max_attempts.saturating_sub(1);
        Self {
            delay,
            remaining: budget,
            budget,
        }
    }
}

impl Backoff for Attempts {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            None
        } else {
            self.remaining -= 1;
            Some(self.delay)
        }
    }

    fn reset(&mut self) {
        self.remaining = self.budget;
    }
}

/// Classify a source error for the retry policy: transient faults are worth
/// another attempt, everything else short-circuits immediately.
pub fn classify(err: SourceError) -> backoff::Error<SourceError> {
    if err.is_transient() {
        backoff::Error::transient(err)
    } else {
        backoff::Error::permanent(err)
    }
}

/// Run `primary` with bounded retries, then hand over to `fallback` once.
///
/// # Arguments
/// * `primary` - Attempted up to `max_retries` times with a constant 1s delay
///   between attempts; a permanent error stops the attempts early.
/// * `fallback` - Invoked exactly once after the primary is exhausted; its
///   own errors propagate unwrapped.
/// * `max_retries` - Total primary attempts. `1` means a single attempt
///   before the fallback.
pub async fn with_retry_and_fallback<T, E, P, PF, F, FF>(
    primary: P,
    fallback: Option<F>,
    max_retries: usize,
) -> Result<T, E>
where
    E: std::fmt::Display,
    P: FnMut() -> PF,
    PF: Future<Output = Result<T, backoff::Error<E>>>,
    F: FnOnce() -> FF,
    FF: Future<Output = Result<T, E>>,
{
    match backoff::future::retry(Attempts::new(max_retries, RETRY_DELAY), primary).await {
        Ok(value) => Ok(value),
        Err(primary_err) => match fallback {
            Some(fallback) => {
                warn!(
                    "Primary source exhausted ({}), switching to fallback",
                    primary_err
                );
                fallback().await
            }
            None => Err(primary_err),
        },
    }
}

/// Bounded retries with no fallback chain.
pub async fn with_retry<T, E, P, PF>(primary: P, max_retries: usize) -> Result<T, E>
where
    E: std::fmt::Display,
    P: FnMut() -> PF,
    PF: Future<Output = Result<T, backoff::Error<E>>>,
{
    let no_fallback: Option<fn() -> std::future::Ready<Result<T, E>>> = None;
    with_retry_and_fallback(primary, no_fallback, max_retries).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn transient(message: &str) -> backoff::Error<SourceError> {
        backoff::Error::transient(SourceError::Status {
            code: 503,
            message: message.to_string(),
        })
    }

    #[test]
    fn attempts_policy_grants_bounded_delays() {
        let mut policy = Attempts::new(3, RETRY_DELAY);
        assert_eq!(policy.next_backoff(), Some(RETRY_DELAY));
        assert_eq!(policy.next_backoff(), Some(RETRY_DELAY));
        assert_eq!(policy.next_backoff(), None);

        policy.reset();
        assert_eq!(policy.next_backoff(), Some(RETRY_DELAY));
    }

    #[tokio::test]
    async fn exhausted_primary_hands_over_to_fallback_once() {
        let primary_calls = AtomicUsize::new(0);
        let fallback_calls = AtomicUsize::new(0);

        let result: Result<&str, SourceError> = with_retry_and_fallback(
            || async {
                primary_calls.fetch_add(1, Ordering::SeqCst);
                Err(transient("primary down"))
            },
            Some(|| async {
                fallback_calls.fetch_add(1, Ordering::SeqCst);
                Ok("from backup")
            }),
            2,
        )
        .await;

        assert_eq!(result.unwrap(), "from backup");
        assert_eq!(primary_calls.load(Ordering::SeqCst), 2);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_on_second_attempt_skips_fallback() {
        let primary_calls = AtomicUsize::new(0);

        let result: Result<&str, SourceError> = with_retry_and_fallback(
            || async {
                let attempt = primary_calls.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 2 {
                    Err(transient("flaky"))
                } else {
                    Ok("live data")
                }
            },
            Some(|| async { panic!("fallback must not run when the primary recovers") }),
            3,
        )
        .await;

        assert_eq!(result.unwrap(), "live data");
        assert_eq!(primary_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn authentication_failure_is_never_retried() {
        let primary_calls = AtomicUsize::new(0);

        let result: Result<&str, SourceError> = with_retry(
            || async {
                primary_calls.fetch_add(1, Ordering::SeqCst);
                Err(classify(SourceError::AuthenticationFailed(
                    "bad token".to_string(),
                )))
            },
            3,
        )
        .await;

        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(SourceError::AuthenticationFailed(_))));
    }

    #[tokio::test]
    async fn no_fallback_returns_last_error_after_all_attempts() {
        let primary_calls = AtomicUsize::new(0);

        let result: Result<(), SourceError> = with_retry(
            || async {
                primary_calls.fetch_add(1, Ordering::SeqCst);
                Err(transient("still down"))
            },
            3,
        )
        .await;

        assert_eq!(primary_calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            result,
            Err(SourceError::Status { code: 503, .. })
        ));
    }

    #[tokio::test]
    async fn single_attempt_budget_goes_straight_to_fallback() {
        let primary_calls = AtomicUsize::new(0);

        let result: Result<u32, SourceError> = with_retry_and_fallback(
            || async {
                primary_calls.fetch_add(1, Ordering::SeqCst);
                Err(transient("down"))
            },
            Some(|| async { Ok(7) }),
            1,
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fallback_errors_propagate_unwrapped() {
        let result: Result<(), SourceError> = with_retry_and_fallback(
            || async { Err(transient("down")) },
            Some(|| async {
                Err(SourceError::Unavailable("no backup uploaded".to_string()))
            }),
            1,
        )
        .await;

        assert!(matches!(result, Err(SourceError::Unavailable(_))));
    }
}
