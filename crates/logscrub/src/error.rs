//! Error types for logscrub.
//!
//! Two failure classes exist: fatal configuration errors raised while
//! compiling filter rules (the enrichment must not activate with a broken
//! filter), and the recoverable [`CollectionAccessError`] raised by a host
//! request accessor when it refuses to expose a raw collection.

use thiserror::Error;

/// The main error type for logscrub operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    /// A filter rule's regex pattern failed to compile.
    #[error("invalid filter pattern '{pattern}': {source}")]
    InvalidFilterPattern {
        /// The pattern text as written in the rule.
        pattern: String,
        /// The underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for logscrub operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Check if this error was caused by a malformed filter pattern.
    #[must_use]
    pub fn is_pattern_error(&self) -> bool {
        matches!(self, Self::InvalidFilterPattern { .. })
    }
}

/// A host request accessor refused to expose a raw collection.
///
/// This is the recoverable per-collection failure: snapshot construction
/// substitutes a one-entry sentinel collection carrying this message instead
/// of aborting. It never terminates enrichment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CollectionAccessError {
    /// The host's description of why the collection could not be read.
    pub message: String,
}

impl CollectionAccessError {
    /// Create a new collection access error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_pattern_display() {
        let source = regex::Regex::new("[unclosed").unwrap_err();
        let err = Error::InvalidFilterPattern {
            pattern: "[unclosed".to_string(),
            source,
        };
        let msg = err.to_string();
        assert!(msg.contains("[unclosed"));
        assert!(err.is_pattern_error());
    }

    #[test]
    fn test_config_validation_display() {
        let err = Error::config_validation("minimum_level unparseable");
        assert_eq!(
            err.to_string(),
            "invalid configuration: minimum_level unparseable"
        );
        assert!(!err.is_pattern_error());
    }

    #[test]
    fn test_collection_access_error_display() {
        let err = CollectionAccessError::new("request validation rejected Form");
        assert_eq!(err.to_string(), "request validation rejected Form");
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }
}
