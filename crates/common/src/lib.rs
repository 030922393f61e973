//! Common utilities and shared types for ballotbox.
//!
//! This crate provides foundational components used across all ballotbox crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//!
//! # Example
//!
//! ```no_run
//! use ballotbox_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let poll_id = id_gen.generate();
//!     println!("Listening on {}:{} for poll {}", config.server.host, config.server.port, poll_id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;

pub use config::{
    ActorConfig, AuthConfig, Config, OutboxConfig, ServerConfig, StorageBackend, StorageConfig,
};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
