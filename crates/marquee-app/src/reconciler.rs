//! Reconciler: binds storage posts to the pending record that caused them.
//!
//! # Design
//! - Runs as its own task fed by the update router; it shares nothing with
//!   the dispatcher except the record store.
//! - `Recent` binds to the most recently created pending record. Two jobs
//!   pending at once can therefore swap attributions; that race is accepted.
//! - `Correlated` binds by the job tag in the caption and only falls back to
//!   recency when the caption carries no tag.
//! - A post with nothing to bind to is logged and left unlinked.

use std::sync::Arc;

use anyhow::Context;
use marquee_config::ReconcileStrategy;
use marquee_core::{ChatId, JobRecord, JobRecordStore, MediaKind, Promotion, StorageEvent};
use marquee_events::{Event, EventBus};
use marquee_telemetry::Metrics;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What happened to one storage event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// A pending record was promoted.
    Promoted(JobRecord),
    /// The event qualified but no pending record matched.
    Unlinked,
    /// The event did not qualify.
    Ignored,
}

impl Reconciliation {
    /// Metric label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Promoted(_) => "promoted",
            Self::Unlinked => "unlinked",
            Self::Ignored => "ignored",
        }
    }
}

/// Standing listener on the storage feed.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn JobRecordStore>,
    storage: ChatId,
    uploader_id: Option<i64>,
    strategy: ReconcileStrategy,
    events: EventBus,
    metrics: Metrics,
}

impl Reconciler {
    /// Build a reconciler for the `storage` location.
    #[must_use]
    pub fn new(
        store: Arc<dyn JobRecordStore>,
        storage: ChatId,
        uploader_id: Option<i64>,
        strategy: ReconcileStrategy,
        events: EventBus,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            storage,
            uploader_id,
            strategy,
            events,
            metrics,
        }
    }

    /// Media posted to the storage location by the authorized uploader.
    #[must_use]
    pub fn qualifies(&self, event: &StorageEvent) -> bool {
        let has_media = event
            .media
            .as_ref()
            .is_some_and(|media| matches!(media.kind, MediaKind::Video | MediaKind::Document));
        let sender_ok = self
            .uploader_id
            .is_none_or(|expected| event.sender_id == Some(expected));
        event.chat_id == self.storage && has_media && sender_ok
    }

    /// Process one event.
    ///
    /// # Errors
    ///
    /// Returns an error when the record store fails.
    pub async fn reconcile(&self, event: &StorageEvent) -> anyhow::Result<Reconciliation> {
        let Some(media) = event.media.as_ref().filter(|_| self.qualifies(event)) else {
            debug!(chat = %event.chat_id, message_locator = event.message_locator, "storage event ignored");
            self.metrics.inc_reconciliation(Reconciliation::Ignored.label());
            return Ok(Reconciliation::Ignored);
        };

        let promotion = Promotion::new(media.file_reference.clone(), event.message_locator);
        let promoted = match (self.strategy, event.job_tag()) {
            (ReconcileStrategy::Correlated, Some(job_id)) => self
                .store
                .promote_pending_for_job(job_id, promotion)
                .await
                .context("correlated promotion failed")?,
            _ => self
                .store
                .promote_latest_pending(promotion)
                .await
                .context("promotion failed")?,
        };

        let result = match promoted {
            Some(record) => {
                info!(
                    record_id = %record.id,
                    title = %record.title,
                    message_locator = event.message_locator,
                    "pending record promoted"
                );
                self.publish(Event::RecordReconciled {
                    record_id: record.id,
                    title: record.title.clone(),
                    message_locator: event.message_locator,
                });
                Reconciliation::Promoted(record)
            }
            None => {
                info!(message_locator = event.message_locator, "upload has no pending record");
                self.publish(Event::UploadUnlinked {
                    message_locator: event.message_locator,
                });
                Reconciliation::Unlinked
            }
        };
        self.metrics.inc_reconciliation(result.label());
        Ok(result)
    }

    /// Consume events from `feed` until it closes.
    #[must_use]
    pub fn spawn(self, mut feed: mpsc::Receiver<StorageEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = feed.recv().await {
                if let Err(err) = self.reconcile(&event).await {
                    warn!(message_locator = event.message_locator, error = %err, "reconciliation failed");
                    self.metrics.inc_reconciliation("error");
                }
            }
            debug!("storage feed closed");
        })
    }

    fn publish(&self, event: Event) {
        self.metrics.inc_event(event.kind());
        self.events.publish(event);
    }
}
