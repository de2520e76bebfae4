//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProbeConfig (validated, immutable)
//!     → TimeoutOptions::try_from(&config.timeouts) → deadline context factory
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::ProbeConfig;
pub use schema::TimeoutConfig;
pub use schema::PoolConfig;
pub use schema::RetryConfig;
pub use schema::RetryDeadline;
pub use schema::ObservabilityConfig;
