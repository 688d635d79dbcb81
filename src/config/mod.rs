//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → job section handed to the adapter, the rest to ledger/driver/observability
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the job config never changes mid-run
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{AppConfig, BlockchainConfig, ObservabilityConfig, PollerConfig, RetryConfig};
