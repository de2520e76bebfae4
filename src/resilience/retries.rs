//! Retry logic.
//!
//! # Responsibilities
//! - Determine if a failure is retryable
//! - Execute retries with exponential backoff + jitter
//! - Derive each retry's deadline context from the configured policy
//!
//! # Design Decisions
//! - Under the shared policy a retry never starts if the pause would use up
//!   the rest of the operation deadline
//! - Connection errors are retryable; deadline expirations are not

use std::future::Future;

use crate::config::{RetryConfig, RetryDeadline};
use crate::context::SharedDeadlineContext;
use crate::observability::metrics;
use crate::operation::OperationError;
use crate::resilience::backoff::backoff_for;
use crate::timing::Remaining;

/// Errors that may succeed when the attempt is repeated.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Runs an operation, retrying retryable failures.
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    fn max_attempts(&self) -> u32 {
        if self.config.enabled {
            self.config.max_attempts.max(1)
        } else {
            1
        }
    }

    /// Context for the `attempt`-th attempt (1-based).
    ///
    /// The first attempt runs on `ctx` itself. Later attempts get an
    /// independent context with either the same deadline or a fresh budget.
    pub fn attempt_context(
        &self,
        ctx: &SharedDeadlineContext,
        attempt: u32,
    ) -> SharedDeadlineContext {
        if attempt <= 1 {
            return ctx.clone();
        }
        match self.config.deadline {
            RetryDeadline::Shared => ctx.clone_context(),
            RetryDeadline::Fresh => ctx.refreshed(),
        }
    }

    /// Runs `operation` until it succeeds, fails permanently, or runs out of
    /// attempts or deadline.
    pub async fn execute<T, F, Fut>(
        &self,
        ctx: &SharedDeadlineContext,
        mut operation: F,
    ) -> Result<T, OperationError>
    where
        F: FnMut(SharedDeadlineContext, u32) -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;

        loop {
            let attempt_ctx = self.attempt_context(ctx, attempt);
            let err = match operation(attempt_ctx, attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() || attempt >= max_attempts {
                return Err(err);
            }

            let pause = backoff_for(attempt, &self.config);
            if self.config.deadline == RetryDeadline::Shared {
                if let Remaining::Finite(left) = ctx.lock().remaining() {
                    if left <= pause {
                        tracing::warn!(
                            attempt = attempt + 1,
                            remaining_ms = left.as_millis() as u64,
                            backoff_ms = pause.as_millis() as u64,
                            "Not enough time left to retry"
                        );
                        return Err(OperationError::RetryDeadline {
                            attempt: attempt + 1,
                            last: Box::new(err),
                        });
                    }
                }
            }

            tracing::warn!(
                attempt,
                max_attempts,
                backoff_ms = pause.as_millis() as u64,
                policy = self.config.deadline.as_str(),
                error = %err,
                "Operation attempt failed, retrying"
            );
            metrics::record_retry(self.config.deadline.as_str());
            tokio::time::sleep(pause).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{create_deadline_context, TimeoutOptions};
    use crate::timing::{DeadlineError, Phase};
    use std::io;
    use std::sync::Mutex;
    use std::time::Duration;

    fn reset() -> OperationError {
        OperationError::Io {
            phase: Phase::SocketRead,
            source: io::Error::new(io::ErrorKind::ConnectionReset, "reset"),
        }
    }

    fn unified(timeout_ms: u64) -> SharedDeadlineContext {
        create_deadline_context(&TimeoutOptions::unified(
            Duration::from_millis(timeout_ms),
            Duration::ZERO,
        ))
        .unwrap()
    }

    fn executor(deadline: RetryDeadline) -> RetryExecutor {
        RetryExecutor::new(RetryConfig {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            deadline,
            ..RetryConfig::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let ctx = unified(10_000);
        let calls = Mutex::new(Vec::new());

        let value = executor(RetryDeadline::Shared)
            .execute(&ctx, |_ctx, attempt| {
                calls.lock().unwrap().push(attempt);
                async move {
                    if attempt < 3 {
                        Err(reset())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, "done");
        assert_eq!(*calls.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_failures_are_final() {
        let ctx = unified(10_000);
        let mut calls = 0;

        let err = executor(RetryDeadline::Shared)
            .execute(&ctx, |_ctx, _attempt| {
                calls += 1;
                async {
                    Err::<(), _>(OperationError::Timeout {
                        phase: Phase::SocketRead,
                        source: DeadlineError::expired_after(Duration::from_millis(5)),
                    })
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, OperationError::Timeout { .. }));
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let ctx = unified(0);
        let mut calls = 0;

        let err = executor(RetryDeadline::Shared)
            .execute(&ctx, |_ctx, _attempt| {
                calls += 1;
                async { Err::<(), _>(reset()) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, OperationError::Io { .. }));
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_runs_once() {
        let ctx = unified(0);
        let executor = RetryExecutor::new(RetryConfig {
            enabled: false,
            ..RetryConfig::default()
        });
        let mut calls = 0;

        executor
            .execute(&ctx, |_ctx, _attempt| {
                calls += 1;
                async { Err::<(), _>(reset()) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_deadline_stops_retrying() {
        let ctx = unified(150);

        let err = executor(RetryDeadline::Shared)
            .execute(&ctx, |_ctx, _attempt| async { Err::<(), _>(reset()) })
            .await
            .unwrap_err();

        match err {
            OperationError::RetryDeadline { attempt, last } => {
                assert_eq!(attempt, 3);
                assert!(matches!(*last, OperationError::Io { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_contexts_follow_policy() {
        let ctx = unified(1000);
        let seen = Mutex::new(Vec::new());

        for policy in [RetryDeadline::Shared, RetryDeadline::Fresh] {
            let _ = executor(policy)
                .execute(&ctx, |attempt_ctx, attempt| {
                    seen.lock().unwrap().push((
                        policy,
                        attempt,
                        attempt_ctx.ptr_eq(&ctx),
                        attempt_ctx.lock().remaining(),
                    ));
                    async { Err::<(), _>(reset()) }
                })
                .await;
        }

        let seen = seen.into_inner().unwrap();
        let first = &seen[0];
        assert_eq!((first.1, first.2), (1, true));

        let shared_retry = seen
            .iter()
            .find(|(policy, attempt, ..)| *policy == RetryDeadline::Shared && *attempt == 2)
            .unwrap();
        assert!(!shared_retry.2);
        assert!(shared_retry.3.as_duration().unwrap() < Duration::from_millis(1000));

        let fresh_retry = seen
            .iter()
            .find(|(policy, attempt, ..)| *policy == RetryDeadline::Fresh && *attempt == 2)
            .unwrap();
        assert!(!fresh_retry.2);
        assert_eq!(fresh_retry.3, Remaining::Finite(Duration::from_millis(1000)));
    }
}
