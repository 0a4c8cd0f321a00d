//! Common utilities and shared types for wildwatch.
//!
//! This crate provides foundational components used across all wildwatch crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//! - **Telemetry**: `tracing` subscriber setup via [`init_tracing`]
//!
//! # Example
//!
//! ```no_run
//! use wildwatch_common::{AppResult, Config, IdGenerator};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     wildwatch_common::init_tracing(&config.logging)?;
//!     let id = IdGenerator::new().generate();
//!     tracing::info!(%id, "Generated ID");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod telemetry;

pub use config::{
    Config, DatabaseConfig, LoggingConfig, PointsConfig, RateLimitConfig, RateLimitRule,
    StoreBackend, StoreConfig,
};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use telemetry::init_tracing;
