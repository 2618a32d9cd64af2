//! Resource configuration
//!
//! Settings that apply to every type defined in a [`Schema`](crate::Schema).
//! Values can be built in code or read from `ELIF_RESOURCE_*` environment
//! variables.

use std::env;
use std::str::FromStr;

use crate::error::ConfigError;

pub const ENV_STRICT_INVERSE: &str = "ELIF_RESOURCE_STRICT_INVERSE";
pub const ENV_PRIMARY_KEY: &str = "ELIF_RESOURCE_PRIMARY_KEY";
pub const ENV_LOG_RESOLUTIONS: &str = "ELIF_RESOURCE_LOG_RESOLUTIONS";

/// Configuration for association resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceConfig {
    /// Run `check_validity` on a reflection every time an association proxy
    /// is created, turning unresolved explicit `inverse_of` names into errors
    pub strict_inverse_validation: bool,
    /// Primary key attribute for types that do not set their own
    pub default_primary_key: String,
    /// Emit a debug event for every resolution and remote lookup
    pub log_resolutions: bool,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self {
            strict_inverse_validation: false,
            default_primary_key: "id".to_string(),
            log_resolutions: true,
        }
    }

    /// Configuration for test suites: inverse declarations are checked eagerly
    pub fn testing() -> Self {
        Self {
            strict_inverse_validation: true,
            ..Self::new()
        }
    }

    /// Configuration for production: quiet, lenient
    pub fn production() -> Self {
        Self {
            log_resolutions: false,
            ..Self::new()
        }
    }

    pub fn with_strict_inverse_validation(mut self, strict: bool) -> Self {
        self.strict_inverse_validation = strict;
        self
    }

    pub fn with_default_primary_key(mut self, key: impl Into<String>) -> Self {
        self.default_primary_key = key.into();
        self
    }

    pub fn with_log_resolutions(mut self, enabled: bool) -> Self {
        self.log_resolutions = enabled;
        self
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();

        if let Ok(value) = env::var(ENV_STRICT_INVERSE) {
            config.strict_inverse_validation = parse_flag(ENV_STRICT_INVERSE, &value)?;
        }

        if let Ok(value) = env::var(ENV_PRIMARY_KEY) {
            config.default_primary_key = value;
        }

        if let Ok(value) = env::var(ENV_LOG_RESOLUTIONS) {
            config.log_resolutions = parse_flag(ENV_LOG_RESOLUTIONS, &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let key = self.default_primary_key.trim();
        if key.is_empty() {
            return Err(ConfigError::ValidationFailed {
                message: "default_primary_key cannot be empty".to_string(),
            });
        }

        if key.chars().any(char::is_whitespace) {
            return Err(ConfigError::ValidationFailed {
                message: format!("default_primary_key '{}' cannot contain whitespace", key),
            });
        }

        Ok(())
    }
}

/// Boolean flag as accepted from the environment
struct Flag(bool);

impl FromStr for Flag {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Flag(true)),
            "0" | "false" | "no" | "off" => Ok(Flag(false)),
            _ => Err(()),
        }
    }
}

fn parse_flag(field: &str, value: &str) -> Result<bool, ConfigError> {
    value
        .parse::<Flag>()
        .map(|flag| flag.0)
        .map_err(|_| ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            expected: "true or false".to_string(),
        })
}
