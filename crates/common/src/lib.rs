//! Common utilities and shared types for civicdesk.
//!
//! This crate provides foundational components used across all civicdesk crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **Cryptography**: Secret digests and constant-time comparison for codes and tokens
//! - **ID Generation**: ULID-based identifiers, opaque tokens and numeric codes via [`IdGenerator`]
//!
//! # Example
//!
//! ```no_run
//! use civicdesk_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let code = id_gen.generate_numeric_code(config.verification.code_length);
//!     println!("Generated code of length {}", code.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod id;

pub use config::Config;
pub use crypto::{constant_time_eq, digest_secret};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
