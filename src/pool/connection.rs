//! Checked-out connection handle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OwnedSemaphorePermit;

/// A connection checked out of a [`crate::pool::ConnectionPool`].
///
/// Holds one pool slot; dropping it checks the connection back in.
#[derive(Debug)]
pub struct PooledConnection {
    id: u64,
    address: String,
    checked_out: Arc<AtomicUsize>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    pub(crate) fn new(
        id: u64,
        address: String,
        checked_out: Arc<AtomicUsize>,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        checked_out.fetch_add(1, Ordering::Relaxed);
        Self {
            id,
            address,
            checked_out,
            _permit: permit,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.checked_out.fetch_sub(1, Ordering::Relaxed);
    }
}
