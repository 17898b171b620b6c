//! Error types for the data access layer.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use marquee_core::CoreError;

/// Result alias for data layer operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors raised by the data access layer.
#[derive(Debug)]
pub enum DataError {
    /// Migration execution failed.
    MigrationFailed {
        /// Underlying migration error.
        source: sqlx::migrate::MigrateError,
    },
    /// A database operation failed.
    QueryFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying SQL error.
        source: sqlx::Error,
    },
    /// A stored row could not be turned back into a record.
    RowDecode {
        /// Column that failed to decode.
        column: &'static str,
        /// Underlying domain error.
        source: CoreError,
    },
}

impl DataError {
    pub(crate) const fn query(operation: &'static str, source: sqlx::Error) -> Self {
        Self::QueryFailed { operation, source }
    }
}

impl Display for DataError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::MigrationFailed { .. } => formatter.write_str("migration failed"),
            Self::QueryFailed { .. } => formatter.write_str("database operation failed"),
            Self::RowDecode { .. } => formatter.write_str("stored row could not be decoded"),
        }
    }
}

impl Error for DataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MigrationFailed { source } => Some(source),
            Self::QueryFailed { source, .. } => Some(source),
            Self::RowDecode { source, .. } => Some(source),
        }
    }
}

impl From<sqlx::Error> for DataError {
    fn from(source: sqlx::Error) -> Self {
        Self::QueryFailed {
            operation: "sqlx operation",
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_error_display_and_source() {
        let migration = DataError::MigrationFailed {
            source: sqlx::migrate::MigrateError::VersionMissing(1),
        };
        assert_eq!(migration.to_string(), "migration failed");
        assert!(migration.source().is_some());

        let query = DataError::query("promote_latest_pending", sqlx::Error::RowNotFound);
        assert_eq!(query.to_string(), "database operation failed");
        assert!(query.source().is_some());

        let decode = DataError::RowDecode {
            column: "delivery_state",
            source: CoreError::UnknownDeliveryState {
                label: "PENDING_BOT_MUST_READ_CHANNEL".into(),
            },
        };
        assert_eq!(decode.to_string(), "stored row could not be decoded");
        assert!(decode.source().is_some());

        let from = DataError::from(sqlx::Error::RowNotFound);
        assert!(matches!(
            from,
            DataError::QueryFailed {
                operation: "sqlx operation",
                ..
            }
        ));
    }
}
