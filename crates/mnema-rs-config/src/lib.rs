//! Configuration models and loading for Mnema.
//!
//! This crate owns the Mnema config schema, validation, and JSON5 loading
//! used by the engine and by embedding services.

mod error;
mod model;

/// Public error type returned by config loading and validation APIs.
pub use error::ConfigError;
/// Configuration schema models.
pub use model::*;
