//! Error types for the resource association system
//!
//! Errors fall into four groups: configuration mistakes made while declaring
//! associations, lookups that found nothing, failures reported by the remote
//! collaborators, and record-level save/destroy failures.

use thiserror::Error;

/// Result type alias for resource operations
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Error types for resource and association operations
#[derive(Debug, Clone, Error)]
pub enum ResourceError {
    /// Unknown option passed to an association declaration
    #[error("Unknown key: '{key}' for {macro_name} :{association}. Valid keys are: {valid}")]
    UnknownOption {
        macro_name: String,
        association: String,
        key: String,
        valid: String,
    },

    /// Dependent policy not supported by the association macro
    #[error("The :dependent option of {macro_name} :{association} must be one of {valid}, got '{value}'")]
    InvalidDependent {
        macro_name: String,
        association: String,
        value: String,
        valid: String,
    },

    /// Explicit `inverse_of` that does not resolve on the target type
    #[error("Could not find the inverse association for {association} (:{inverse} in {class_name})")]
    InverseOfAssociationNotFound {
        association: String,
        inverse: String,
        class_name: String,
    },

    /// Record of the wrong type handed to an association writer
    #[error("{expected} expected, got {got}")]
    AssociationTypeMismatch { expected: String, got: String },

    /// Class name that the schema cannot resolve
    #[error("Uninitialized resource type: {0}")]
    UnknownResourceType(String),

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Association name that was never declared
    #[error("Association named '{association}' was not found on {resource}; perhaps you misspelled it?")]
    AssociationNotFound { resource: String, association: String },

    /// Accessor that was never synthesized for the type
    #[error("Undefined accessor '{accessor}' for {resource}")]
    UndefinedAccessor { resource: String, accessor: String },

    /// Remote single-record lookup with no result
    #[error("Couldn't find {resource} with '{key}'={id}")]
    NotFound {
        resource: String,
        key: String,
        id: String,
    },

    /// Owner of an association proxy no longer exists
    #[error("Owner of association '{0}' has been dropped")]
    OwnerDropped(String),

    /// Association proxy already borrowed further up the call stack
    #[error("Association '{0}' is already in use")]
    AssociationBusy(String),

    /// Destroy blocked by a `restrict_with_exception` association
    #[error("Cannot delete record because of dependent {0}")]
    DeleteRestriction(String),

    /// Record could not be persisted
    #[error("Record not saved: {0}")]
    RecordNotSaved(String),

    /// Destroy aborted by a dependency restriction
    #[error("Failed to destroy the record: {0}")]
    RecordNotDestroyed(String),

    /// Record failed remote validation
    #[error("Validation failed: {0}")]
    RecordInvalid(String),

    /// Failure reported by a remote collaborator
    #[error("Remote error: {0}")]
    Remote(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ResourceError {
    /// Declaration-time mistakes that retrying can never fix
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownOption { .. }
                | Self::InvalidDependent { .. }
                | Self::InverseOfAssociationNotFound { .. }
                | Self::AssociationTypeMismatch { .. }
                | Self::UnknownResourceType(_)
                | Self::Configuration(_)
        )
    }

    /// Lookups that found nothing
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::AssociationNotFound { .. }
        )
    }

    /// Whether a later call may succeed without code changes
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl From<serde_json::Error> for ResourceError {
    fn from(err: serde_json::Error) -> Self {
        ResourceError::Serialization(err.to_string())
    }
}

/// Error type for environment driven configuration
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: '{value}' (expected {expected})")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Configuration validation failed: {message}")]
    ValidationFailed { message: String },
}

impl From<ConfigError> for ResourceError {
    fn from(err: ConfigError) -> Self {
        ResourceError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let unknown = ResourceError::UnknownOption {
            macro_name: "has_many".to_string(),
            association: "comments".to_string(),
            key: "soo_invalid".to_string(),
            valid: "class_name".to_string(),
        };
        assert!(unknown.is_configuration());
        assert!(!unknown.is_retryable());
        assert!(unknown.to_string().contains("soo_invalid"));

        let missing = ResourceError::NotFound {
            resource: "Post".to_string(),
            key: "id".to_string(),
            id: "7".to_string(),
        };
        assert!(missing.is_not_found());
        assert!(!missing.is_retryable());
        assert!(!missing.is_configuration());

        assert!(ResourceError::Remote("timeout".to_string()).is_retryable());
    }

    #[test]
    fn test_association_not_found_message() {
        let err = ResourceError::AssociationNotFound {
            resource: "Post".to_string(),
            association: "comentz".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Association named 'comentz' was not found on Post; perhaps you misspelled it?"
        );
    }
}
