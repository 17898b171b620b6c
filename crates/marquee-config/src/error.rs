//! Error types for configuration loading.

use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable was absent or blank.
    #[error("missing environment configuration")]
    MissingEnv {
        /// Name of the missing variable.
        name: &'static str,
    },
    /// A variable held a value that failed validation.
    #[error("invalid configuration field")]
    InvalidField {
        /// Variable that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// The `.env` file existed but could not be read.
    #[error("failed to load dotenv file")]
    Dotenv {
        /// File path when known.
        path: Option<PathBuf>,
        /// Underlying dotenv error.
        #[source]
        source: dotenvy::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: &'static str, value: &str) -> Self {
        Self::InvalidField {
            field,
            reason,
            value: Some(value.to_string()),
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_helper_captures_value() {
        let err = ConfigError::invalid("SEARCH_LIMIT", "must be a positive integer", "zero");
        assert_eq!(err.to_string(), "invalid configuration field");
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "SEARCH_LIMIT",
                value: Some(ref value),
                ..
            } if value == "zero"
        ));
    }
}
