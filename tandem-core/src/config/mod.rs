//! Configuration management for Tandem
//!
//! - Schema-driven configuration with validation
//! - Loading from a TOML file on the search path plus `TANDEM_*` overrides
//!
//! # Examples
//!
//! ```rust,no_run
//! use tandem_core::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .with_path("/etc/tandem")
//!     .load()
//!     .expect("Failed to load configuration");
//!
//! println!("Publishing through {} servers", config.servers.len());
//! ```

pub mod loader;
pub mod schema;
pub mod validator;

pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::ConfigValidator;

use crate::Result;
use std::path::Path;

/// Load configuration from the default search paths
///
/// # Errors
/// Returns an error if loading or validation fails.
pub fn load_default() -> Result<TandemConfig> {
    ConfigLoader::new().load()
}

/// Load configuration from a specific file
///
/// # Errors
/// Returns an error if the file cannot be read, parsed or validated.
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<TandemConfig> {
    ConfigLoader::new().load_from_file(path)
}

/// Validate a configuration object
///
/// # Errors
/// Returns [`Error::Configuration`](crate::Error::Configuration) on the first
/// violated rule.
pub fn validate(config: &TandemConfig) -> Result<()> {
    ConfigValidator::validate(config)
}
