//! Parsing and validation of `gpl.toml` placer configuration files.
//!
//! This crate produces a strongly-typed [`PlacerConfig`] with a serde default
//! for every field. All entry points run range validation so that a config
//! handed to the placement engine is always within bounds.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;
pub mod validate;

pub use error::ConfigError;
pub use loader::{load_config, load_config_file, load_config_from_str, CONFIG_FILE_NAME};
pub use types::*;
pub use validate::validate_config;
