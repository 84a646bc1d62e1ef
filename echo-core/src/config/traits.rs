//! Configuration traits for validation and loading.

use crate::error::ConfigError;

/// Trait for types that can be validated.
///
/// # Example
///
/// ```rust
/// use echo_core::config::Validatable;
/// use echo_core::error::ConfigError;
///
/// struct Endpoint {
///     url: String,
/// }
///
/// impl Validatable for Endpoint {
///     fn validate(&self) -> Result<(), ConfigError> {
///         if self.url.is_empty() {
///             return Err(ConfigError::missing_field("url"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Validatable {
    /// Validates the configuration.
    ///
    /// Returns `Ok(())` if the configuration is valid, or a `ConfigError`
    /// describing the first problem found.
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Trait for types that support environment variable overrides.
pub trait Configurable: Sized {
    /// Applies environment variable overrides to the configuration.
    ///
    /// # Arguments
    ///
    /// * `prefix` - The environment variable prefix (e.g., "`ECHO_WS`")
    fn apply_env_overrides(&mut self, prefix: &str);

    /// Returns the environment variable names that can override this configuration.
    fn env_var_names(prefix: &str) -> Vec<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestConfig {
        capacity: i32,
    }

    impl Validatable for TestConfig {
        fn validate(&self) -> Result<(), ConfigError> {
            if self.capacity <= 0 {
                return Err(ConfigError::invalid_value(
                    "capacity",
                    "Capacity must be positive",
                ));
            }
            Ok(())
        }
    }

    #[test]
    fn test_validatable_success() {
        let config = TestConfig { capacity: 10 };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validatable_failure() {
        let config = TestConfig { capacity: 0 };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("capacity"));
    }
}
