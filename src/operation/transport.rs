//! Command transport.
//!
//! # Responsibilities
//! - Abstract the socket write/read pair the pipeline bounds with delays
//! - Provide a simulated transport with configurable latency and failures

use serde_json::{json, Value};
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::context::Command;

/// Sends a command and reads its reply.
pub trait Transport: Send + Sync {
    fn write(&self, command: &Command) -> impl Future<Output = io::Result<()>> + Send;

    fn read(&self) -> impl Future<Output = io::Result<Value>> + Send;
}

/// In-process transport that sleeps instead of doing I/O.
#[derive(Debug, Default)]
pub struct SimulatedTransport {
    write_latency: Duration,
    read_latency: Duration,
    /// Reads that fail with a connection reset before replies succeed.
    failures_remaining: AtomicU32,
    sent: Mutex<Vec<Command>>,
}

impl SimulatedTransport {
    pub fn new(write_latency: Duration, read_latency: Duration) -> Self {
        Self {
            write_latency,
            read_latency,
            ..Self::default()
        }
    }

    /// Makes the first `failures` reads fail.
    pub fn failing_first(self, failures: u32) -> Self {
        self.failures_remaining.store(failures, Ordering::SeqCst);
        self
    }

    /// Commands written so far, in order.
    pub fn sent(&self) -> Vec<Command> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    fn take_failure(&self) -> bool {
        self.failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Transport for SimulatedTransport {
    async fn write(&self, command: &Command) -> io::Result<()> {
        tokio::time::sleep(self.write_latency).await;
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(command.clone());
        }
        Ok(())
    }

    async fn read(&self) -> io::Result<Value> {
        tokio::time::sleep(self.read_latency).await;
        if self.take_failure() {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "simulated connection reset",
            ));
        }
        Ok(json!({ "ok": 1 }))
    }
}
