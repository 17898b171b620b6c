//! Error types for core domain conversions.

use thiserror::Error;

/// Primary error type for core model operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A content locator could not be parsed.
    #[error("invalid content locator")]
    InvalidLocator {
        /// Machine-readable reason for the rejection.
        reason: &'static str,
        /// Offending value.
        value: String,
    },
    /// A persisted delivery state label was not recognised.
    #[error("unknown delivery state")]
    UnknownDeliveryState {
        /// Label read from storage.
        label: String,
    },
    /// A ready delivery state was missing one of its references.
    #[error("incomplete delivery state")]
    IncompleteDeliveryState {
        /// Name of the missing field.
        field: &'static str,
    },
    /// A built-in matching pattern failed to compile.
    #[error("pattern compilation failed")]
    PatternCompile {
        /// Pattern identifier.
        pattern: &'static str,
        /// Underlying regex failure.
        #[source]
        source: regex::Error,
    },
    /// A worker terminal message could not be encoded or decoded.
    #[error("malformed worker message")]
    MalformedWorkerMessage {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying serde failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience alias for core results.
pub type CoreResult<T> = Result<T, CoreError>;
