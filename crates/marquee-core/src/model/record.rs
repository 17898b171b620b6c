//! Durable job records and their delivery lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Quality label stamped on a record when the worker creates it.
pub const PENDING_QUALITY: &str = "Auto-Download";
/// Quality label stamped on a record when the reconciler promotes it.
pub const READY_QUALITY: &str = "HD (Auto)";

/// Delivery state of a job record; references exist only once ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeliveryState {
    /// Uploaded (or uploading) but not yet observed on the storage feed.
    Pending,
    /// Observed on the storage feed and deliverable.
    Ready {
        /// Storage-side reference usable to resend the payload.
        file_reference: String,
        /// Position of the payload within the storage location.
        message_locator: i64,
    },
}

impl DeliveryState {
    /// Persisted label for the state.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready { .. } => "ready",
        }
    }

    /// Whether the record still awaits reconciliation.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Rebuild a state from its persisted columns.
    ///
    /// # Errors
    ///
    /// Returns an error when the label is unknown or a ready state lacks one
    /// of its references.
    pub fn from_parts(
        label: &str,
        file_reference: Option<String>,
        message_locator: Option<i64>,
    ) -> CoreResult<Self> {
        match label {
            "pending" => Ok(Self::Pending),
            "ready" => {
                let file_reference = file_reference.ok_or(CoreError::IncompleteDeliveryState {
                    field: "file_reference",
                })?;
                let message_locator = message_locator.ok_or(CoreError::IncompleteDeliveryState {
                    field: "message_locator",
                })?;
                Ok(Self::Ready {
                    file_reference,
                    message_locator,
                })
            }
            other => Err(CoreError::UnknownDeliveryState {
                label: other.to_string(),
            }),
        }
    }
}

/// One fetch-and-deliver request as remembered by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Record identifier.
    pub id: Uuid,
    /// Job that produced the record, when known.
    pub job_id: Option<Uuid>,
    /// Display title used for lookups.
    pub title: String,
    /// Payload size in bytes.
    pub size_bytes: Option<u64>,
    /// Free-form quality label.
    pub quality: Option<String>,
    /// Delivery lifecycle state.
    pub delivery: DeliveryState,
    /// Number of requests recorded against the title.
    pub request_count: u32,
    /// Creation timestamp; reconciliation recency is judged on this.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Case-insensitive substring match on the title.
    #[must_use]
    pub fn title_matches(&self, query: &str) -> bool {
        self.title.to_lowercase().contains(&query.to_lowercase())
    }

    /// Apply a promotion in place.
    pub fn promote(&mut self, promotion: Promotion, now: DateTime<Utc>) {
        self.delivery = DeliveryState::Ready {
            file_reference: promotion.file_reference,
            message_locator: promotion.message_locator,
        };
        self.quality = Some(promotion.quality);
        self.updated_at = now;
    }
}

/// Fields supplied by a worker when it records a finished upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJobRecord {
    /// Job identifier carried end to end.
    pub job_id: Uuid,
    /// Display title.
    pub title: String,
    /// Uploaded size in bytes.
    pub size_bytes: u64,
    /// Quality label.
    pub quality: String,
}

impl NewJobRecord {
    /// Pending record for a freshly uploaded payload.
    #[must_use]
    pub fn pending(job_id: Uuid, title: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            job_id,
            title: title.into(),
            size_bytes,
            quality: PENDING_QUALITY.to_string(),
        }
    }
}

/// References attached to a pending record when its upload is observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    /// Storage-side payload reference.
    pub file_reference: String,
    /// Position within the storage location.
    pub message_locator: i64,
    /// Quality label to record.
    pub quality: String,
}

impl Promotion {
    /// Promotion carrying the standard ready quality label.
    #[must_use]
    pub fn new(file_reference: impl Into<String>, message_locator: i64) -> Self {
        Self {
            file_reference: file_reference.into(),
            message_locator,
            quality: READY_QUALITY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_record(title: &str) -> JobRecord {
        let now = Utc::now();
        JobRecord {
            id: Uuid::new_v4(),
            job_id: Some(Uuid::new_v4()),
            title: title.to_string(),
            size_bytes: Some(42),
            quality: Some(PENDING_QUALITY.to_string()),
            delivery: DeliveryState::Pending,
            request_count: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn delivery_state_round_trips_through_columns() -> CoreResult<()> {
        assert_eq!(
            DeliveryState::from_parts("pending", None, None)?,
            DeliveryState::Pending
        );
        assert_eq!(
            DeliveryState::from_parts("ready", Some("file-abc".into()), Some(7))?,
            DeliveryState::Ready {
                file_reference: "file-abc".into(),
                message_locator: 7,
            }
        );
        Ok(())
    }

    #[test]
    fn delivery_state_rejects_incomplete_ready_rows() {
        assert!(matches!(
            DeliveryState::from_parts("ready", None, Some(7)),
            Err(CoreError::IncompleteDeliveryState {
                field: "file_reference"
            })
        ));
        assert!(matches!(
            DeliveryState::from_parts("ready", Some("f".into()), None),
            Err(CoreError::IncompleteDeliveryState {
                field: "message_locator"
            })
        ));
        assert!(matches!(
            DeliveryState::from_parts("PENDING_BOT_MUST_READ_CHANNEL", None, None),
            Err(CoreError::UnknownDeliveryState { .. })
        ));
    }

    #[test]
    fn title_match_is_case_insensitive_substring() {
        let record = pending_record("Interstellar (2014) 1080p BluRay");
        assert!(record.title_matches("interstellar"));
        assert!(record.title_matches("BLURAY"));
        assert!(!record.title_matches("Inception"));
    }

    #[test]
    fn promote_attaches_references_and_quality() {
        let mut record = pending_record("Arrival");
        let later = record.created_at + chrono::Duration::seconds(5);
        record.promote(Promotion::new("doc-1", 91), later);

        assert_eq!(
            record.delivery,
            DeliveryState::Ready {
                file_reference: "doc-1".into(),
                message_locator: 91,
            }
        );
        assert_eq!(record.quality.as_deref(), Some(READY_QUALITY));
        assert_eq!(record.updated_at, later);
        assert!(!record.delivery.is_pending());
    }

    #[test]
    fn delivery_state_serializes_with_tag() -> Result<(), serde_json::Error> {
        let json = serde_json::to_value(DeliveryState::Pending)?;
        assert_eq!(json, serde_json::json!({"state": "pending"}));
        Ok(())
    }
}
