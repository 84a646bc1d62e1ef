//! Configuration loader supporting YAML, TOML and JSON formats.

use super::traits::{Configurable, Validatable};
use crate::error::ConfigError;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigFormat {
    /// YAML format (.yaml, .yml)
    #[default]
    Yaml,
    /// TOML format (.toml)
    Toml,
    /// JSON format (.json)
    Json,
}

impl ConfigFormat {
    /// Detects the format from a file extension.
    ///
    /// Returns `None` if the extension is not recognized.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "yaml" | "yml" => Some(Self::Yaml),
                "toml" => Some(Self::Toml),
                "json" => Some(Self::Json),
                _ => None,
            })
    }

    /// Returns the file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Toml => "toml",
            Self::Json => "json",
        }
    }
}

/// Configuration loader with support for multiple formats and environment overrides.
///
/// # Example
///
/// ```rust,ignore
/// use echo_core::config::ConfigLoader;
///
/// let config: SessionConfig = ConfigLoader::new()
///     .with_env_prefix("ECHO_WS")
///     .load_validated("session.yaml")?;
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Environment variable prefix for overrides.
    env_prefix: Option<String>,
    /// Whether to validate after loading.
    validate: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            env_prefix: None,
            validate: true,
        }
    }

    /// Sets the environment variable prefix for overrides.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Sets whether [`load_validated`](Self::load_validated) runs validation.
    ///
    /// Default is `true`.
    #[must_use]
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Returns the environment variable prefix, if set.
    #[must_use]
    pub fn env_prefix(&self) -> Option<&str> {
        self.env_prefix.as_deref()
    }

    /// Loads configuration from a file.
    ///
    /// The format is automatically detected from the file extension.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The file format is not recognized
    /// - The content cannot be parsed
    pub fn load_file<T, P>(&self, path: P) -> Result<T, ConfigError>
    where
        T: DeserializeOwned,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::InvalidFormat {
            path: path.display().to_string(),
            reason: "Unrecognized file extension. Supported: .yaml, .yml, .toml, .json".to_string(),
        })?;

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        self.load_str(&content, format)
            .map_err(|e| with_path(e, &path.display().to_string()))
    }

    /// Loads a file, applies environment overrides when a prefix is set,
    /// then validates the result.
    pub fn load_validated<T, P>(&self, path: P) -> Result<T, ConfigError>
    where
        T: DeserializeOwned + Validatable + Configurable,
        P: AsRef<Path>,
    {
        let mut config: T = self.load_file(path)?;
        self.finish(&mut config)?;
        Ok(config)
    }

    /// Applies environment overrides and validation to an already built value.
    pub fn finish<T>(&self, config: &mut T) -> Result<(), ConfigError>
    where
        T: Validatable + Configurable,
    {
        if let Some(prefix) = &self.env_prefix {
            config.apply_env_overrides(prefix);
        }
        if self.validate {
            config.validate()?;
        }
        Ok(())
    }

    /// Loads configuration from a string with the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be parsed.
    pub fn load_str<T>(&self, content: &str, format: ConfigFormat) -> Result<T, ConfigError>
    where
        T: DeserializeOwned,
    {
        let config: T = match format {
            ConfigFormat::Yaml => {
                serde_yaml::from_str(content).map_err(|e| ConfigError::InvalidFormat {
                    path: "<string>".to_string(),
                    reason: format!("YAML parse error: {e}"),
                })?
            }
            ConfigFormat::Toml => {
                toml::from_str(content).map_err(|e| ConfigError::InvalidFormat {
                    path: "<string>".to_string(),
                    reason: format!("TOML parse error: {e}"),
                })?
            }
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| ConfigError::InvalidFormat {
                    path: "<string>".to_string(),
                    reason: format!("JSON parse error: {e}"),
                })?
            }
        };

        Ok(config)
    }

    /// Serializes a configuration to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize<T>(config: &T, format: ConfigFormat) -> Result<String, ConfigError>
    where
        T: serde::Serialize,
    {
        match format {
            ConfigFormat::Yaml => {
                serde_yaml::to_string(config).map_err(|e| ConfigError::InvalidFormat {
                    path: "<serialize>".to_string(),
                    reason: format!("YAML serialization error: {e}"),
                })
            }
            ConfigFormat::Toml => {
                toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidFormat {
                    path: "<serialize>".to_string(),
                    reason: format!("TOML serialization error: {e}"),
                })
            }
            ConfigFormat::Json => {
                serde_json::to_string_pretty(config).map_err(|e| ConfigError::InvalidFormat {
                    path: "<serialize>".to_string(),
                    reason: format!("JSON serialization error: {e}"),
                })
            }
        }
    }

    /// Saves a configuration to a file.
    ///
    /// The format is automatically detected from the file extension.
    pub fn save_file<T, P>(config: &T, path: P) -> Result<(), ConfigError>
    where
        T: serde::Serialize,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::InvalidFormat {
            path: path.display().to_string(),
            reason: "Unrecognized file extension. Supported: .yaml, .yml, .toml, .json".to_string(),
        })?;

        let content = Self::serialize(config, format)?;

        std::fs::write(path, content).map_err(|e| ConfigError::FileWriteError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

fn with_path(error: ConfigError, path: &str) -> ConfigError {
    match error {
        ConfigError::InvalidFormat { reason, .. } => ConfigError::InvalidFormat {
            path: path.to_string(),
            reason,
        },
        other => other,
    }
}
