//! Bounded retry around a single page fetch.
//!
//! Only classified-transient failures are retried; anti-automation pages,
//! error envelopes, and malformed bodies indicate conditions a retry with
//! the same request cannot fix and propagate immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use tracing::warn;

/// Outcome of one fetch attempt. Created per attempt, consumed immediately,
/// never persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(Value),
    /// Network timeout, connection abort, or 5xx. Retryable.
    Transient(String),
    /// Error envelope, malformed body, or unbuildable request. Not retryable.
    Fatal(String),
    /// Markup challenge page where JSON was expected. Not retryable: the
    /// same stale session will be challenged again.
    AntiAutomation,
}

/// Backoff multiplier per attempt.
const BACKOFF_FACTOR: f64 = 1.5;
/// Upper bound on the random jitter added to each backoff sleep.
const JITTER_MS: u64 = 250;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Run `attempt` up to `1 + max_retries` times, sleeping with
    /// multiplicative backoff plus jitter between transient failures.
    /// Exhausting retries returns the last transient outcome verbatim.
    pub async fn execute<F, Fut>(&self, mut attempt: F) -> FetchOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FetchOutcome>,
    {
        let mut delay = self.base_delay;

        for attempt_no in 0..=self.max_retries {
            match attempt().await {
                FetchOutcome::Transient(reason) => {
                    if attempt_no == self.max_retries {
                        warn!(
                            attempts = attempt_no + 1,
                            reason, "Retries exhausted on transient failure"
                        );
                        return FetchOutcome::Transient(reason);
                    }
                    let jitter = Duration::from_millis(rand::rng().random_range(0..JITTER_MS));
                    warn!(
                        attempt = attempt_no + 1,
                        delay_ms = delay.as_millis() as u64,
                        reason,
                        "Transient failure, retrying after backoff"
                    );
                    tokio::time::sleep(delay + jitter).await;
                    delay = delay.mul_f64(BACKOFF_FACTOR);
                }
                terminal => return terminal,
            }
        }

        unreachable!("loop always returns on the final attempt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn persistent_timeouts_make_exactly_initial_plus_max_retries_attempts() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(2000));

        let outcome = policy
            .execute(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { FetchOutcome::Transient("request timed out".to_string()) }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(
            outcome,
            FetchOutcome::Transient("request timed out".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transient_then_success_recovers_invisibly() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(100));

        let outcome = policy
            .execute(|| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        FetchOutcome::Transient("connection reset".to_string())
                    } else {
                        FetchOutcome::Success(serde_json::json!({"ok": true}))
                    }
                }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(matches!(outcome, FetchOutcome::Success(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_and_anti_automation_are_never_retried() {
        for terminal in [
            FetchOutcome::Fatal("bad auth".to_string()),
            FetchOutcome::AntiAutomation,
        ] {
            let attempts = AtomicU32::new(0);
            let policy = RetryPolicy::new(3, Duration::from_millis(100));
            let expected = terminal.clone();

            let outcome = policy
                .execute(|| {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    let out = terminal.clone();
                    async move { out }
                })
                .await;

            assert_eq!(attempts.load(Ordering::SeqCst), 1);
            assert_eq!(outcome, expected);
        }
    }
}
