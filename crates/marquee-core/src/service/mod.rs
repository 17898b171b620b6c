//! Traits implemented by the adapters at each I/O edge.

use std::path::Path;

use anyhow::bail;
use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{
    Candidate, ChatId, ContentLocator, JobRecord, NewJobRecord, Promotion, Reply, UploadReceipt,
};

/// Text search over an external index of candidates.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Search for candidates; an empty list is a valid answer.
    async fn search(
        &self,
        query: &str,
        category: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<Candidate>>;

    /// Resolve a candidate into a transfer locator; `None` when unavailable.
    async fn resolve_locator(&self, candidate: &Candidate)
    -> anyhow::Result<Option<ContentLocator>>;
}

/// Durable store of job records.
#[async_trait]
pub trait JobRecordStore: Send + Sync {
    /// First ready record whose title contains `query`, case-insensitively.
    async fn find_ready_by_title(&self, query: &str) -> anyhow::Result<Option<JobRecord>>;

    /// Persist a new pending record.
    async fn create_pending(&self, record: NewJobRecord) -> anyhow::Result<JobRecord>;

    /// Promote the most recently created pending record in one atomic step.
    async fn promote_latest_pending(
        &self,
        promotion: Promotion,
    ) -> anyhow::Result<Option<JobRecord>>;

    /// Promote the pending record produced by `job_id`.
    async fn promote_pending_for_job(
        &self,
        job_id: Uuid,
        promotion: Promotion,
    ) -> anyhow::Result<Option<JobRecord>> {
        let _ = (job_id, promotion);
        bail!("correlated promotion not supported by this store");
    }

    /// Records still awaiting reconciliation, newest first.
    async fn list_pending(&self) -> anyhow::Result<Vec<JobRecord>>;
}

/// Outbound side of the user-facing chat transport.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a reply, returning the transport message id when known.
    async fn send_reply(&self, chat: ChatId, reply: &Reply) -> anyhow::Result<Option<i64>>;

    /// Replace the content of a previously sent reply.
    async fn edit_reply(&self, chat: ChatId, message_id: i64, reply: &Reply) -> anyhow::Result<()> {
        let _ = (chat, message_id, reply);
        bail!("reply editing not supported by this transport");
    }

    /// Acknowledge a button press so the client stops its progress indicator.
    async fn acknowledge_callback(&self, callback_id: &str) -> anyhow::Result<()> {
        let _ = callback_id;
        Ok(())
    }

    /// Forward a stored payload from the storage location.
    async fn forward_stored(
        &self,
        chat: ChatId,
        storage: ChatId,
        message_locator: i64,
    ) -> anyhow::Result<()>;

    /// Send a stored payload by its storage reference.
    async fn send_stored(
        &self,
        chat: ChatId,
        file_reference: &str,
        caption: Option<&str>,
    ) -> anyhow::Result<()>;
}

/// Materializes a payload on local disk.
#[async_trait]
pub trait PayloadFetcher: Send + Sync {
    /// Fetch the full payload into `destination`; returns only once complete.
    async fn fetch(&self, locator: &ContentLocator, destination: &Path) -> anyhow::Result<()>;
}

/// Authenticated, chunked uploads to the storage location.
#[async_trait]
pub trait StorageUploader: Send + Sync {
    /// Establish and verify the authenticated channel.
    async fn connect(&self) -> anyhow::Result<()>;

    /// Upload one file as a single logical unit.
    async fn upload(&self, file: &Path, caption: &str) -> anyhow::Result<UploadReceipt>;
}
