//! Typed settings produced by the loader.

use std::fmt::{self, Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ConfigError;

/// How storage events are bound to pending job records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStrategy {
    /// Bind to the most recently created pending record.
    #[default]
    Recent,
    /// Bind by the job tag carried in the upload caption, else by recency.
    Correlated,
}

impl ReconcileStrategy {
    /// Configuration label for the strategy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Recent => "recent",
            Self::Correlated => "correlated",
        }
    }
}

impl FromStr for ReconcileStrategy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "recent" => Ok(Self::Recent),
            "correlated" => Ok(Self::Correlated),
            _ => Err(ConfigError::invalid(
                "RECONCILE_STRATEGY",
                "expected 'recent' or 'correlated'",
                value,
            )),
        }
    }
}

impl Display for ReconcileStrategy {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Requested log output style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStyle {
    /// Structured JSON lines.
    Json,
    /// Human-readable output.
    Pretty,
}

impl FromStr for LogStyle {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            _ => Err(ConfigError::invalid(
                "LOG_FORMAT",
                "expected 'json' or 'pretty'",
                value,
            )),
        }
    }
}

/// Logging settings shared by both binaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggingSettings {
    /// Default level directive when `RUST_LOG` is unset.
    pub level: String,
    /// Explicit output style; inferred from the build when `None`.
    pub style: Option<LogStyle>,
}

/// Search provider settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchSettings {
    /// Base URL of the indexer aggregator.
    pub api_url: String,
    /// API key, when the aggregator requires one.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Category passed with each search.
    pub category: String,
    /// Maximum number of candidates requested per search.
    pub limit: usize,
}

/// Worker dispatch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchSettings {
    /// Worker executable.
    pub worker_bin: PathBuf,
    /// Upper bound on concurrently running workers.
    pub max_concurrent_workers: usize,
}

/// External fetch client invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchSettings {
    /// Program to execute.
    pub command: String,
    /// Arguments placed before the destination and locator.
    pub args: Vec<String>,
}

/// Settings for the long-running front-end service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceConfig {
    /// Bot API base URL.
    pub telegram_api_url: String,
    /// Front-end bot token.
    #[serde(skip_serializing)]
    pub bot_token: String,
    /// Storage location chat id.
    pub storage_channel_id: i64,
    /// Authorized uploading identity, when restricted.
    pub uploader_id: Option<i64>,
    /// Job record store URL.
    #[serde(skip_serializing)]
    pub database_url: String,
    /// Search provider settings.
    pub search: SearchSettings,
    /// Dispatch settings.
    pub dispatch: DispatchSettings,
    /// Reconciliation strategy.
    pub reconcile_strategy: ReconcileStrategy,
    /// Logging settings.
    pub logging: LoggingSettings,
    /// Ops listener address, disabled when `None`.
    pub http_addr: Option<SocketAddr>,
}

/// Settings for a single worker run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerConfig {
    /// Bot API base URL.
    pub telegram_api_url: String,
    /// Token of the uploading identity.
    #[serde(skip_serializing)]
    pub uploader_token: String,
    /// Storage location chat id.
    pub storage_channel_id: i64,
    /// Job record store URL.
    #[serde(skip_serializing)]
    pub database_url: String,
    /// Scratch root for materialized payloads.
    pub download_dir: PathBuf,
    /// Fetch client invocation.
    pub fetch: FetchSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconcile_strategy_parses_known_labels() {
        assert_eq!(
            "Recent".parse::<ReconcileStrategy>().ok(),
            Some(ReconcileStrategy::Recent)
        );
        assert_eq!(
            " correlated ".parse::<ReconcileStrategy>().ok(),
            Some(ReconcileStrategy::Correlated)
        );
        assert!("oldest".parse::<ReconcileStrategy>().is_err());
        assert_eq!(ReconcileStrategy::default().to_string(), "recent");
    }

    #[test]
    fn log_style_parses_known_labels() {
        assert_eq!("JSON".parse::<LogStyle>().ok(), Some(LogStyle::Json));
        assert_eq!("pretty".parse::<LogStyle>().ok(), Some(LogStyle::Pretty));
        assert!("compact".parse::<LogStyle>().is_err());
    }
}
