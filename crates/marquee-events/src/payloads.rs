//! Event payloads carried on the bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned to each event published on the bus.
pub type EventId = u64;

/// Job and reconciliation lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A job was accepted and waits for a worker slot.
    JobQueued {
        /// Job identifier.
        job_id: Uuid,
        /// Display title.
        title: String,
        /// Requesting chat.
        requester: i64,
    },
    /// A worker process was started for the job.
    JobStarted {
        /// Job identifier.
        job_id: Uuid,
    },
    /// The worker reported a successful upload.
    JobSucceeded {
        /// Job identifier.
        job_id: Uuid,
        /// Position of the upload in the storage location.
        message_locator: i64,
    },
    /// The worker reported (or implied) a failure.
    JobFailed {
        /// Job identifier.
        job_id: Uuid,
        /// Failure reason relayed to the requester.
        reason: String,
    },
    /// A worker sent more than one terminal message.
    ProtocolViolation {
        /// Job identifier.
        job_id: Uuid,
    },
    /// A storage post was bound to a pending record.
    RecordReconciled {
        /// Promoted record identifier.
        record_id: Uuid,
        /// Title of the promoted record.
        title: String,
        /// Position of the post in the storage location.
        message_locator: i64,
    },
    /// A storage post had no pending record to bind to.
    UploadUnlinked {
        /// Position of the post in the storage location.
        message_locator: i64,
    },
}

impl Event {
    /// Machine-friendly discriminator.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::JobQueued { .. } => "job_queued",
            Self::JobStarted { .. } => "job_started",
            Self::JobSucceeded { .. } => "job_succeeded",
            Self::JobFailed { .. } => "job_failed",
            Self::ProtocolViolation { .. } => "protocol_violation",
            Self::RecordReconciled { .. } => "record_reconciled",
            Self::UploadUnlinked { .. } => "upload_unlinked",
        }
    }
}

/// Event plus its sequence number and emission time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Sequential identifier.
    pub id: EventId,
    /// Emission timestamp.
    pub timestamp: DateTime<Utc>,
    /// Wrapped event.
    pub event: Event,
}
