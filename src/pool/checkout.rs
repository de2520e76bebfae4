//! Connection checkout bounded by the deadline context.
//!
//! # Responsibilities
//! - Wait for a free pool slot, racing the context's checkout delay
//! - Always cancel the checkout delay once the wait is over
//! - Report wait-queue timeouts, wrapped as operation timeouts when the
//!   unified deadline is in force

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::config::PoolConfig;
use crate::context::SharedDeadlineContext;
use crate::observability::metrics;
use crate::pool::connection::PooledConnection;
use crate::timing::{race_optional, DeadlineError, Phase};

/// Errors from [`ConnectionPool::check_out`].
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Timed out while checking out a connection from connection pool {address}")]
    WaitQueueTimeout { address: String, waited: Duration },

    /// Wait-queue timeout under the operation deadline.
    #[error("Timed out during connection checkout")]
    OperationTimeout {
        #[source]
        cause: Box<CheckoutError>,
    },

    #[error("connection pool for {0} was closed")]
    PoolClosed(String),

    #[error(transparent)]
    Context(#[from] DeadlineError),
}

impl CheckoutError {
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            CheckoutError::WaitQueueTimeout { .. } | CheckoutError::OperationTimeout { .. }
        )
    }
}

/// Bounded pool of connections to one server address.
#[derive(Debug)]
pub struct ConnectionPool {
    address: String,
    max_connections: usize,
    permits: Arc<Semaphore>,
    checked_out: Arc<AtomicUsize>,
    next_id: AtomicU64,
}

impl ConnectionPool {
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            address: config.address.clone(),
            max_connections: config.max_connections,
            permits: Arc::new(Semaphore::new(config.max_connections)),
            checked_out: Arc::new(AtomicUsize::new(0)),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Number of connections currently checked out.
    pub fn checked_out(&self) -> usize {
        self.checked_out.load(Ordering::Relaxed)
    }

    /// Fails every pending and future checkout.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Check a connection out, waiting at most as long as the context allows.
    pub async fn check_out(
        &self,
        ctx: &SharedDeadlineContext,
    ) -> Result<PooledConnection, CheckoutError> {
        let (delay, unified) = {
            let mut guard = ctx.lock();
            (guard.checkout_delay()?, guard.uses_operation_deadline())
        };

        let started = Instant::now();
        let outcome = race_optional(delay.as_ref(), self.permits.clone().acquire_owned()).await;
        if let Some(delay) = &delay {
            delay.cancel();
        }

        match outcome {
            Ok(Ok(permit)) => {
                metrics::record_checkout("success");
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(address = %self.address, connection_id = id, "Connection checked out");
                Ok(PooledConnection::new(
                    id,
                    self.address.clone(),
                    self.checked_out.clone(),
                    permit,
                ))
            }
            Ok(Err(_closed)) => {
                metrics::record_checkout("closed");
                Err(CheckoutError::PoolClosed(self.address.clone()))
            }
            Err(deadline) => {
                metrics::record_checkout("timeout");
                metrics::record_deadline_exceeded(Phase::ConnectionCheckout);
                let waited = started.elapsed();
                tracing::warn!(
                    address = %self.address,
                    waited_ms = waited.as_millis() as u64,
                    checked_out = self.checked_out(),
                    error = %deadline,
                    "Connection checkout timed out"
                );
                let timeout = CheckoutError::WaitQueueTimeout {
                    address: self.address.clone(),
                    waited,
                };
                if unified {
                    Err(CheckoutError::OperationTimeout {
                        cause: Box::new(timeout),
                    })
                } else {
                    Err(timeout)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{create_deadline_context, TimeoutOptions};

    fn pool(max_connections: usize) -> ConnectionPool {
        ConnectionPool::new(&PoolConfig {
            address: "db.internal:27017".into(),
            max_connections,
        })
    }

    fn per_step(wait_queue_ms: u64) -> SharedDeadlineContext {
        create_deadline_context(&TimeoutOptions::per_step(
            Duration::ZERO,
            Duration::from_millis(wait_queue_ms),
            Duration::ZERO,
        ))
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_checkout_and_release() {
        let pool = pool(2);
        let ctx = per_step(0);

        let a = pool.check_out(&ctx).await.unwrap();
        let b = pool.check_out(&ctx).await.unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.address(), "db.internal:27017");
        assert_eq!(pool.checked_out(), 2);

        drop(a);
        assert_eq!(pool.checked_out(), 1);
        let _c = pool.check_out(&ctx).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_queue_timeout() {
        let pool = pool(1);
        let ctx = per_step(100);
        let _held = pool.check_out(&ctx).await.unwrap();

        let err = pool.check_out(&ctx).await.unwrap_err();

        match err {
            CheckoutError::WaitQueueTimeout { waited, .. } => {
                assert!(waited >= Duration::from_millis(100));
                assert!(waited < Duration::from_millis(110));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unified_timeout_wraps_wait_queue_error() {
        let pool = pool(1);
        let ctx = create_deadline_context(&TimeoutOptions::unified(
            Duration::from_millis(200),
            Duration::ZERO,
        ))
        .unwrap();
        ctx.lock().selection_delay();
        let _held = pool.check_out(&ctx).await.unwrap();

        ctx.lock().selection_delay();
        let err = pool.check_out(&ctx).await.unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Timed out during connection checkout");
        let cause = std::error::Error::source(&err).unwrap();
        assert!(cause.to_string().starts_with("Timed out while checking out a connection"));
    }

    #[tokio::test]
    async fn test_unified_checkout_requires_selection() {
        let pool = pool(1);
        let ctx = create_deadline_context(&TimeoutOptions::unified(
            Duration::from_secs(1),
            Duration::ZERO,
        ))
        .unwrap();

        let err = pool.check_out(&ctx).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Context(DeadlineError::SelectionNotResolved)));
    }

    #[tokio::test]
    async fn test_closed_pool() {
        let pool = pool(1);
        pool.close();

        let err = pool.check_out(&per_step(0)).await.unwrap_err();
        assert!(matches!(err, CheckoutError::PoolClosed(_)));
    }
}
