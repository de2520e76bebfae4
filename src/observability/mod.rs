//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! contexts, pool, operations, retries produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters by phase / outcome)
//!
//! Consumers:
//!     → stderr log output
//!     → Prometheus snapshot printed by the CLI
//! ```
//!
//! # Design Decisions
//! - Every operation runs in a span carrying its operation id
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
