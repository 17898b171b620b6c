//! # Design
//!
//! - Application-level errors raised while bootstrapping and serving.
//! - Constant messages; the failing step travels in `operation`.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: marquee_config::ConfigError,
    },
    /// Telemetry could not be initialised.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: marquee_telemetry::TelemetryError,
    },
    /// The database could not be reached.
    #[error("database connection failed")]
    Database {
        /// Operation identifier.
        operation: &'static str,
        /// Source database error.
        source: sqlx::Error,
    },
    /// The job record store could not be initialised.
    #[error("job record store operation failed")]
    Data {
        /// Operation identifier.
        operation: &'static str,
        /// Source data error.
        source: marquee_data::DataError,
    },
    /// The Bot API adapter failed.
    #[error("bot api operation failed")]
    Telegram {
        /// Operation identifier.
        operation: &'static str,
        /// Source adapter error.
        source: marquee_telegram::TelegramError,
    },
    /// The search provider client could not be built.
    #[error("http client operation failed")]
    Http {
        /// Operation identifier.
        operation: &'static str,
        /// Source HTTP client error.
        source: reqwest::Error,
    },
    /// IO operations failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Source IO error.
        source: std::io::Error,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: marquee_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: marquee_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn telegram(
        operation: &'static str,
        source: marquee_telegram::TelegramError,
    ) -> Self {
        Self::Telegram { operation, source }
    }

    pub(crate) const fn io(operation: &'static str, source: std::io::Error) -> Self {
        Self::Io { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_build_variants() {
        let config = AppError::config(
            "load",
            marquee_config::ConfigError::MissingEnv { name: "BOT_TOKEN" },
        );
        assert!(matches!(config, AppError::Config { operation: "load", .. }));
        assert_eq!(config.to_string(), "configuration operation failed");

        let io = AppError::io("serve", std::io::Error::other("boom"));
        assert!(matches!(io, AppError::Io { .. }));
    }
}
