//! Error types for the Bot API adapter.

use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while talking to the Bot API.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// The HTTP client could not be constructed.
    #[error("failed to build bot api client")]
    ClientBuild {
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// The request could not be sent or its body could not be read.
    #[error("bot api request failed")]
    Transport {
        /// Bot API method.
        method: &'static str,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// The Bot API answered with `ok: false`.
    #[error("{description}")]
    Rejected {
        /// Bot API method.
        method: &'static str,
        /// Error code reported by the Bot API.
        code: Option<i64>,
        /// Description reported by the Bot API.
        description: String,
    },
    /// The Bot API answered `ok: true` without a result.
    #[error("bot api response missing result")]
    MissingResult {
        /// Bot API method.
        method: &'static str,
    },
    /// A local file could not be opened for upload.
    #[error("failed to open upload source")]
    UploadSource {
        /// File being uploaded.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias for Bot API results.
pub type TelegramResult<T> = Result<T, TelegramError>;

impl TelegramError {
    pub(crate) const fn transport(method: &'static str, source: reqwest::Error) -> Self {
        Self::Transport { method, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_displays_api_description() {
        let err = TelegramError::Rejected {
            method: "sendDocument",
            code: Some(400),
            description: "Bad Request: file is too big".into(),
        };
        assert_eq!(err.to_string(), "Bad Request: file is too big");
    }
}
