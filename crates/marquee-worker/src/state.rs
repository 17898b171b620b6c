//! Run-to-completion job state machine.
//!
//! # Design
//! - `advance` performs exactly one transition; `run` loops until a terminal
//!   state and turns it into the terminal message.
//! - The pending record is written before the local payload is removed, so a
//!   crash between the two leaves both behind.
//! - Cleanup happens only on the success path. A cleanup failure is logged
//!   and the job still succeeds, since the upload and its record exist.

use std::fmt;
use std::path::PathBuf;

use marquee_core::{
    JobRecordStore, NewJobRecord, PayloadFetcher, StorageUploader, UploadCaption, UploadReceipt,
    WorkerOutcome, WorkerRequest,
};
use tracing::{info, warn};

use crate::error::{WorkerError, WorkerResult};
use crate::select::{SelectedFile, select_largest_media};

/// Position of a job in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerState {
    /// Establishing the storage channel.
    Connecting,
    /// Materializing the payload locally.
    Fetching,
    /// Choosing the media file to transfer.
    Selecting,
    /// Uploading the selected file.
    Transferring {
        /// File being uploaded.
        file: SelectedFile,
    },
    /// Writing the pending job record.
    Recording {
        /// Uploaded file.
        file: SelectedFile,
        /// Storage receipt for the upload.
        receipt: UploadReceipt,
    },
    /// Removing the local payload.
    Cleaning {
        /// Storage receipt for the upload.
        receipt: UploadReceipt,
    },
    /// Job finished successfully.
    Done {
        /// Position of the upload in the storage chat.
        message_locator: i64,
    },
    /// Job failed.
    Error {
        /// Reason reported to the dispatcher.
        reason: String,
    },
}

impl WorkerState {
    /// Stable label for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Fetching => "fetching",
            Self::Selecting => "selecting",
            Self::Transferring { .. } => "transferring",
            Self::Recording { .. } => "recording",
            Self::Cleaning { .. } => "cleaning",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    /// Terminal message for a terminal state; `None` otherwise.
    #[must_use]
    pub fn outcome(&self) -> Option<WorkerOutcome> {
        match self {
            Self::Done { message_locator } => Some(WorkerOutcome::Success {
                message_locator: *message_locator,
            }),
            Self::Error { reason } => Some(WorkerOutcome::error(reason.clone())),
            _ => None,
        }
    }
}

/// Collaborators a job needs; all borrowed for the lifetime of the run.
pub struct JobContext<'a> {
    /// Storage channel uploader.
    pub uploader: &'a dyn StorageUploader,
    /// Payload fetcher.
    pub fetcher: &'a dyn PayloadFetcher,
    /// Job record store.
    pub store: &'a dyn JobRecordStore,
    /// Scratch root; the payload lands in `<root>/<job id>`.
    pub download_root: PathBuf,
}

impl fmt::Debug for JobContext<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("JobContext")
            .field("download_root", &self.download_root)
            .finish_non_exhaustive()
    }
}

/// One job driven through its states.
#[derive(Debug)]
pub struct JobRun<'a> {
    request: WorkerRequest,
    context: JobContext<'a>,
    payload_dir: PathBuf,
}

impl<'a> JobRun<'a> {
    /// Prepare a run for `request`.
    #[must_use]
    pub fn new(request: WorkerRequest, context: JobContext<'a>) -> Self {
        let payload_dir = context.download_root.join(request.job_id.to_string());
        Self {
            request,
            context,
            payload_dir,
        }
    }

    /// Directory the payload is materialized into.
    #[must_use]
    pub fn payload_dir(&self) -> &std::path::Path {
        &self.payload_dir
    }

    /// Perform one transition. Terminal states are returned unchanged.
    pub async fn advance(&self, state: WorkerState) -> WorkerState {
        if state.is_terminal() {
            return state;
        }
        let label = state.label();
        match self.step(state).await {
            Ok(next) => {
                info!(job_id = %self.request.job_id, from = label, to = next.label(), "worker state advanced");
                next
            }
            Err(err) => {
                let reason = err.reason();
                warn!(job_id = %self.request.job_id, state = label, error = %reason, "worker job failed");
                WorkerState::Error { reason }
            }
        }
    }

    /// Drive the job from `Connecting` to a terminal state.
    pub async fn run(&self) -> WorkerOutcome {
        let mut state = WorkerState::Connecting;
        while !state.is_terminal() {
            state = self.advance(state).await;
        }
        state
            .outcome()
            .unwrap_or_else(|| WorkerOutcome::error("worker stopped in a non-terminal state"))
    }

    async fn step(&self, state: WorkerState) -> WorkerResult<WorkerState> {
        match state {
            WorkerState::Connecting => {
                self.context
                    .uploader
                    .connect()
                    .await
                    .map_err(|source| WorkerError::Connect { source })?;
                Ok(WorkerState::Fetching)
            }
            WorkerState::Fetching => {
                self.context
                    .fetcher
                    .fetch(&self.request.locator, &self.payload_dir)
                    .await
                    .map_err(|source| WorkerError::Fetch { source })?;
                Ok(WorkerState::Selecting)
            }
            WorkerState::Selecting => {
                let file = select_largest_media(&self.payload_dir)?;
                info!(
                    job_id = %self.request.job_id,
                    file = %file.path.display(),
                    size_bytes = file.size_bytes,
                    "media file selected"
                );
                Ok(WorkerState::Transferring { file })
            }
            WorkerState::Transferring { file } => {
                let caption = UploadCaption {
                    title: self.request.title.clone(),
                    size_bytes: file.size_bytes,
                    job_id: self.request.job_id,
                };
                let receipt = self
                    .context
                    .uploader
                    .upload(&file.path, &caption.render())
                    .await
                    .map_err(|source| WorkerError::Upload { source })?;
                Ok(WorkerState::Recording { file, receipt })
            }
            WorkerState::Recording { file, receipt } => {
                let record = NewJobRecord::pending(
                    self.request.job_id,
                    self.request.title.clone(),
                    file.size_bytes,
                );
                self.context
                    .store
                    .create_pending(record)
                    .await
                    .map_err(|source| WorkerError::Record { source })?;
                Ok(WorkerState::Cleaning { receipt })
            }
            WorkerState::Cleaning { receipt } => {
                if let Err(source) = tokio::fs::remove_dir_all(&self.payload_dir).await {
                    let err = WorkerError::Cleanup {
                        path: self.payload_dir.clone(),
                        source,
                    };
                    warn!(
                        job_id = %self.request.job_id,
                        path = %self.payload_dir.display(),
                        error = %err.reason(),
                        "payload left on disk; upload is already stored"
                    );
                }
                Ok(WorkerState::Done {
                    message_locator: receipt.message_locator,
                })
            }
            terminal @ (WorkerState::Done { .. } | WorkerState::Error { .. }) => Ok(terminal),
        }
    }
}
