//! Configuration management module.
//!
//! This module provides the configuration plumbing used by the client:
//! - YAML, TOML and JSON configuration file formats
//! - Validation with descriptive, path-qualified error messages
//! - Environment variable overrides
//!
//! # Example
//!
//! ```rust,ignore
//! use echo_core::config::{ConfigLoader, ConfigFormat};
//!
//! // Load from YAML file, apply ECHO_WS_* overrides, then validate
//! let config: SessionConfig = ConfigLoader::new()
//!     .with_env_prefix("ECHO_WS")
//!     .load_validated("session.yaml")?;
//!
//! // Load from TOML string
//! let config: SessionConfig = ConfigLoader::new()
//!     .load_str(toml_content, ConfigFormat::Toml)?;
//! ```

mod loader;
mod traits;
pub mod validation;

pub use loader::{ConfigFormat, ConfigLoader};
pub use traits::{Configurable, Validatable};
pub use validation::{EnvOverride, ValidationContext, ValidationResult, Validator};
