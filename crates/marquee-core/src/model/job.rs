//! Worker invocation parameters and the terminal message protocol.
//!
//! # Design
//! - The invocation is the whole contract: job id, requester, title, locator.
//! - A worker answers with exactly one newline-terminated JSON object.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ChatId, ContentLocator};
use crate::error::{CoreError, CoreResult};

/// Command-line flag carrying the job identifier.
pub const ARG_JOB_ID: &str = "--job-id";
/// Command-line flag carrying the requester identity.
pub const ARG_REQUESTER: &str = "--requester";
/// Command-line flag carrying the display title.
pub const ARG_TITLE: &str = "--title";
/// Command-line flag carrying the content locator.
pub const ARG_LOCATOR: &str = "--locator";

/// Parameters a worker receives at spawn time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRequest {
    /// Identifier minted by the dispatcher.
    pub job_id: Uuid,
    /// Where to fetch the payload from.
    pub locator: ContentLocator,
    /// Chat that asked for the payload.
    pub requester: ChatId,
    /// Title shown to users and stored on the record.
    pub title: String,
}

impl WorkerRequest {
    /// Build a request with a fresh job identifier.
    #[must_use]
    pub fn new(locator: ContentLocator, requester: ChatId, title: impl Into<String>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            locator,
            requester,
            title: title.into(),
        }
    }

    /// Render the request as worker command-line arguments.
    ///
    /// Values are joined to their flag with `=` so titles or locators that
    /// start with `-` are never read as flags.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        vec![
            format!("{ARG_JOB_ID}={}", self.job_id),
            format!("{ARG_REQUESTER}={}", self.requester),
            format!("{ARG_TITLE}={}", self.title),
            format!("{ARG_LOCATOR}={}", self.locator.as_str()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_args_join_flags_and_values() {
        let request = WorkerRequest::new(
            ContentLocator::Magnet("magnet:?xt=urn:btih:abc".into()),
            ChatId(77),
            "-=Interstellar=- 1080p",
        );
        let args = request.to_args();
        assert_eq!(
            args,
            vec![
                format!("--job-id={}", request.job_id),
                "--requester=77".to_string(),
                "--title=-=Interstellar=- 1080p".to_string(),
                "--locator=magnet:?xt=urn:btih:abc".to_string(),
            ]
        );
    }

    #[test]
    fn outcome_lines_use_status_tag() -> CoreResult<()> {
        let success = WorkerOutcome::Success {
            message_locator: 12,
        };
        assert_eq!(
            success.to_line()?,
            r#"{"status":"success","message_locator":12}"#
        );
        assert_eq!(
            WorkerOutcome::from_line(r#" {"status":"error","reason":"no video file found"} "#)?,
            WorkerOutcome::error("no video file found")
        );
        Ok(())
    }

    #[test]
    fn non_protocol_lines_are_rejected() {
        assert!(WorkerOutcome::from_line("downloading 10%").is_err());
        assert!(WorkerOutcome::from_line(r#"{"status":"partial"}"#).is_err());
    }
}
