//! # Design
//!
//! - One variant per worker state that can fail, each with a constant message.
//! - `reason()` is what crosses the process boundary: the constant message plus
//!   the root cause, when there is one.

use std::error::Error as _;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Failures raised while running a job.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The storage channel could not be established.
    #[error("connect failed")]
    Connect {
        /// Underlying failure.
        #[source]
        source: anyhow::Error,
    },
    /// The payload could not be materialized.
    #[error("fetch failed")]
    Fetch {
        /// Underlying failure.
        #[source]
        source: anyhow::Error,
    },
    /// The fetched payload could not be scanned.
    #[error("failed to scan payload")]
    Scan {
        /// Directory being scanned.
        path: PathBuf,
        /// Underlying traversal error.
        #[source]
        source: walkdir::Error,
    },
    /// No file with an allowed media extension was found.
    #[error("no video file found")]
    NoMediaFile {
        /// Directory that was scanned.
        path: PathBuf,
    },
    /// The storage channel rejected the upload.
    #[error("upload failed")]
    Upload {
        /// Underlying failure.
        #[source]
        source: anyhow::Error,
    },
    /// The pending record could not be created.
    #[error("record failed")]
    Record {
        /// Underlying failure.
        #[source]
        source: anyhow::Error,
    },
    /// The local payload could not be removed. Logged; the job still succeeds.
    #[error("cleanup failed")]
    Cleanup {
        /// Directory being removed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl WorkerError {
    /// Reason reported in the terminal message.
    #[must_use]
    pub fn reason(&self) -> String {
        let Some(mut cause) = self.source() else {
            return self.to_string();
        };
        while let Some(next) = cause.source() {
            cause = next;
        }
        format!("{self}: {cause}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn reason_appends_root_cause() {
        let err = WorkerError::Upload {
            source: anyhow!("Bad Request: file is too big").context("failed to upload movie.mkv"),
        };
        assert_eq!(err.reason(), "upload failed: Bad Request: file is too big");
    }

    #[test]
    fn reason_without_cause_is_constant() {
        let err = WorkerError::NoMediaFile {
            path: PathBuf::from("/tmp/job"),
        };
        assert_eq!(err.reason(), "no video file found");
    }
}
