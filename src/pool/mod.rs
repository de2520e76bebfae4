//! Connection pool.
//!
//! # Data Flow
//! ```text
//! check_out(ctx)
//!     → ctx.checkout_delay() (mirrors selection delay, or per-step wait-queue timeout)
//!     → race(semaphore slot, delay)
//!     → PooledConnection (slot released on drop)
//! ```

pub mod checkout;
pub mod connection;

pub use checkout::{CheckoutError, ConnectionPool};
pub use connection::PooledConnection;
