//! Configuration validation utilities.
//!
//! This module provides utilities for validating configuration values
//! with descriptive error messages.

use crate::error::ConfigError;
use std::collections::HashMap;

/// Result type for validation operations.
pub type ValidationResult = Result<(), ConfigError>;

/// Context for validation operations.
///
/// Tracks the current path in the configuration tree for better error messages.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    /// Current path in the configuration (e.g., "reconnection.max_delay_ms").
    path: Vec<String>,
    /// Collected validation errors.
    errors: Vec<ConfigError>,
}

impl ValidationContext {
    /// Creates a new validation context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters a new section in the configuration.
    pub fn enter(&mut self, section: impl Into<String>) {
        self.path.push(section.into());
    }

    /// Exits the current section.
    pub fn exit(&mut self) {
        self.path.pop();
    }

    /// Returns the current path as a dot-separated string.
    #[must_use]
    pub fn current_path(&self) -> String {
        self.path.join(".")
    }

    /// Adds a validation error.
    pub fn add_error(&mut self, error: ConfigError) {
        self.errors.push(error);
    }

    /// Returns true if there are no validation errors.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the collected validation errors.
    #[must_use]
    pub fn errors(&self) -> &[ConfigError] {
        &self.errors
    }

    /// Consumes the context and returns the first error, if any.
    pub fn into_result(self) -> ValidationResult {
        self.errors.into_iter().next().map_or(Ok(()), Err)
    }

    /// Creates a missing field error with the current path context.
    #[must_use]
    pub fn missing_field(&self, field: impl Into<String>) -> ConfigError {
        let field = field.into();
        let section = if self.path.is_empty() {
            None
        } else {
            Some(self.current_path())
        };
        ConfigError::MissingField { field, section }
    }

    /// Creates an invalid value error with the current path context.
    #[must_use]
    pub fn invalid_value(
        &self,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> ConfigError {
        let field_name = field.into();
        let full_field = if self.path.is_empty() {
            field_name
        } else {
            format!("{}.{}", self.current_path(), field_name)
        };
        ConfigError::InvalidValue {
            field: full_field,
            reason: reason.into(),
        }
    }
}

/// Validator for configuration values.
///
/// Provides fluent API for validating configuration fields.
#[derive(Debug)]
pub struct Validator<'a> {
    ctx: &'a mut ValidationContext,
}

impl<'a> Validator<'a> {
    /// Creates a new validator with the given context.
    pub fn new(ctx: &'a mut ValidationContext) -> Self {
        Self { ctx }
    }

    /// Validates that a string field is not empty.
    pub fn require_non_empty(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.ctx.add_error(self.ctx.missing_field(field));
        }
        self
    }

    /// Validates that a numeric value is within a range.
    pub fn in_range<T: PartialOrd + std::fmt::Display>(
        &mut self,
        field: &str,
        value: &T,
        min: &T,
        max: &T,
    ) -> &mut Self {
        if value < min || value > max {
            self.ctx.add_error(self.ctx.invalid_value(
                field,
                format!("Value {value} must be between {min} and {max}"),
            ));
        }
        self
    }

    /// Validates that a numeric value is at least `min`.
    pub fn at_least<T: PartialOrd + std::fmt::Display>(
        &mut self,
        field: &str,
        value: &T,
        min: &T,
    ) -> &mut Self {
        if value < min {
            self.ctx.add_error(
                self.ctx
                    .invalid_value(field, format!("Value {value} must be at least {min}")),
            );
        }
        self
    }

    /// Validates that a numeric value is positive.
    pub fn positive<T: PartialOrd + Default + std::fmt::Display>(
        &mut self,
        field: &str,
        value: &T,
    ) -> &mut Self {
        if *value <= T::default() {
            self.ctx.add_error(
                self.ctx
                    .invalid_value(field, format!("Value {value} must be positive")),
            );
        }
        self
    }

    /// Validates using a custom predicate.
    pub fn custom<F>(&mut self, field: &str, predicate: F, error_msg: &str) -> &mut Self
    where
        F: FnOnce() -> bool,
    {
        if !predicate() {
            self.ctx.add_error(self.ctx.invalid_value(field, error_msg));
        }
        self
    }

    /// Validates a WebSocket URL (`ws://` or `wss://`).
    pub fn valid_ws_url(&mut self, field: &str, value: &str) -> &mut Self {
        if !value.is_empty() && !value.starts_with("ws://") && !value.starts_with("wss://") {
            self.ctx.add_error(
                self.ctx
                    .invalid_value(field, "Must be a WebSocket URL (ws:// or wss://)"),
            );
        }
        self
    }

    /// Returns the validation result.
    pub fn result(&self) -> ValidationResult {
        self.ctx.errors().first().cloned().map_or(Ok(()), Err)
    }
}

/// Environment variable helper for applying overrides.
///
/// Unset variables and values that fail to parse leave the target untouched.
pub struct EnvOverride;

impl EnvOverride {
    /// Applies an environment variable override to a string value.
    pub fn apply_string(var_name: &str, target: &mut String) {
        if let Ok(value) = std::env::var(var_name) {
            *target = value;
        }
    }

    /// Applies an environment variable override to a numeric value.
    pub fn apply_number<T: std::str::FromStr>(var_name: &str, target: &mut T) {
        if let Ok(value) = std::env::var(var_name)
            && let Ok(parsed) = value.trim().parse()
        {
            *target = parsed;
        }
    }

    /// Applies an environment variable override to a boolean value.
    pub fn apply_bool(var_name: &str, target: &mut bool) {
        if let Ok(value) = std::env::var(var_name) {
            if let Some(parsed) = parse_bool(&value) {
                *target = parsed;
            }
        }
    }

    /// Merges `KEY1=VALUE1,KEY2=VALUE2` pairs from an environment variable into a map.
    pub fn apply_map(var_name: &str, target: &mut HashMap<String, String>) {
        if let Ok(value) = std::env::var(var_name) {
            target.extend(parse_pairs(&value));
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_pairs(value: &str) -> impl Iterator<Item = (String, String)> + '_ {
    value.split(',').filter_map(|pair| {
        pair.split_once('=')
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
    })
}
