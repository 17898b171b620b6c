//! Fake adapters implementing the core I/O traits.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use marquee_core::{
    Candidate, ChatId, ContentLocator, PayloadFetcher, Reply, SearchProvider, StorageUploader,
    UploadReceipt,
};

/// Outbound transport call captured by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    /// `send_reply`.
    Reply {
        /// Destination chat.
        chat: ChatId,
        /// Reply payload.
        reply: Reply,
    },
    /// `edit_reply`.
    Edit {
        /// Destination chat.
        chat: ChatId,
        /// Edited message.
        message_id: i64,
        /// Replacement payload.
        reply: Reply,
    },
    /// `forward_stored`.
    Forward {
        /// Destination chat.
        chat: ChatId,
        /// Storage chat.
        storage: ChatId,
        /// Forwarded post.
        message_locator: i64,
    },
    /// `acknowledge_callback`.
    Ack {
        /// Acknowledged callback.
        callback_id: String,
    },
    /// `send_stored`.
    Stored {
        /// Destination chat.
        chat: ChatId,
        /// Resent payload reference.
        file_reference: String,
    },
}

/// Chat transport that records every call.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    next_message_id: AtomicI64,
    fail_forward: AtomicBool,
}

impl RecordingTransport {
    /// Create a transport whose calls all succeed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent forwards fail.
    pub fn fail_forwards(&self) {
        self.fail_forward.store(true, Ordering::SeqCst);
    }

    /// Calls recorded so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Sent> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Texts of replies and edits sent to `chat`, in order.
    #[must_use]
    pub fn texts_for(&self, chat: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Reply { chat: to, reply } | Sent::Edit { chat: to, reply, .. }
                    if to == chat =>
                {
                    Some(reply.text)
                }
                _ => None,
            })
            .collect()
    }

    fn record(&self, sent: Sent) {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sent);
    }
}

#[async_trait]
impl marquee_core::ChatTransport for RecordingTransport {
    async fn send_reply(&self, chat: ChatId, reply: &Reply) -> anyhow::Result<Option<i64>> {
        self.record(Sent::Reply {
            chat,
            reply: reply.clone(),
        });
        Ok(Some(self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1))
    }

    async fn edit_reply(&self, chat: ChatId, message_id: i64, reply: &Reply) -> anyhow::Result<()> {
        self.record(Sent::Edit {
            chat,
            message_id,
            reply: reply.clone(),
        });
        Ok(())
    }

    async fn acknowledge_callback(&self, callback_id: &str) -> anyhow::Result<()> {
        self.record(Sent::Ack {
            callback_id: callback_id.to_string(),
        });
        Ok(())
    }

    async fn forward_stored(
        &self,
        chat: ChatId,
        storage: ChatId,
        message_locator: i64,
    ) -> anyhow::Result<()> {
        if self.fail_forward.load(Ordering::SeqCst) {
            bail!("forward rejected");
        }
        self.record(Sent::Forward {
            chat,
            storage,
            message_locator,
        });
        Ok(())
    }

    async fn send_stored(
        &self,
        chat: ChatId,
        file_reference: &str,
        _caption: Option<&str>,
    ) -> anyhow::Result<()> {
        self.record(Sent::Stored {
            chat,
            file_reference: file_reference.to_string(),
        });
        Ok(())
    }
}

/// Search provider returning a fixed candidate list.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    candidates: Vec<Candidate>,
    locators: HashMap<String, Option<ContentLocator>>,
    fail_search: bool,
    search_delay: Duration,
    searches: AtomicUsize,
    resolved: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    /// Provider answering every search with `candidates`.
    ///
    /// Candidates resolve through the `magnet` field of their payload unless
    /// overridden with [`ScriptedProvider::with_locator`].
    #[must_use]
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates,
            ..Self::default()
        }
    }

    /// Provider whose searches always fail.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_search: true,
            ..Self::default()
        }
    }

    /// Override the locator resolved for `title`.
    #[must_use]
    pub fn with_locator(mut self, title: &str, locator: Option<ContentLocator>) -> Self {
        self.locators.insert(title.to_string(), locator);
        self
    }

    /// Delay every search by `delay` before answering.
    #[must_use]
    pub const fn with_search_delay(mut self, delay: Duration) -> Self {
        self.search_delay = delay;
        self
    }

    /// Number of searches performed.
    #[must_use]
    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    /// Titles passed to `resolve_locator`, in order.
    #[must_use]
    pub fn resolved_titles(&self) -> Vec<String> {
        self.resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SearchProvider for ScriptedProvider {
    async fn search(
        &self,
        _query: &str,
        _category: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<Candidate>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if !self.search_delay.is_zero() {
            tokio::time::sleep(self.search_delay).await;
        }
        if self.fail_search {
            bail!("provider unavailable");
        }
        Ok(self.candidates.iter().take(limit).cloned().collect())
    }

    async fn resolve_locator(
        &self,
        candidate: &Candidate,
    ) -> anyhow::Result<Option<ContentLocator>> {
        self.resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(candidate.title.clone());
        if let Some(locator) = self.locators.get(&candidate.title) {
            return Ok(locator.clone());
        }
        Ok(candidate
            .payload
            .get("magnet")
            .and_then(serde_json::Value::as_str)
            .map(|magnet| ContentLocator::Magnet(magnet.to_string())))
    }
}

/// Fetcher that materializes a fixed set of files.
#[derive(Debug, Default)]
pub struct FakeFetcher {
    files: Vec<(PathBuf, usize)>,
    fail: bool,
}

impl FakeFetcher {
    /// Fetcher writing `files` (relative path, size in bytes) into the destination.
    #[must_use]
    pub fn with_files(files: &[(&str, usize)]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(path, size)| (PathBuf::from(path), *size))
                .collect(),
            fail: false,
        }
    }

    /// Fetcher that always fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            files: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl PayloadFetcher for FakeFetcher {
    async fn fetch(&self, _locator: &ContentLocator, destination: &Path) -> anyhow::Result<()> {
        if self.fail {
            bail!("peer discovery timed out");
        }
        for (relative, size) in &self.files {
            let path = destination.join(relative);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            tokio::fs::write(&path, vec![0_u8; *size])
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        Ok(())
    }
}

/// Upload captured by [`FakeUploader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    /// Uploaded file path.
    pub path: PathBuf,
    /// Caption text.
    pub caption: String,
    /// Bytes read from the file.
    pub size_bytes: u64,
}

/// Storage uploader that records uploads and hands out sequential locators.
#[derive(Debug, Default)]
pub struct FakeUploader {
    fail_connect: bool,
    fail_upload: bool,
    next_locator: AtomicI64,
    uploads: Mutex<Vec<RecordedUpload>>,
}

impl FakeUploader {
    /// Uploader whose first receipt carries `first_locator`.
    #[must_use]
    pub fn starting_at(first_locator: i64) -> Self {
        Self {
            next_locator: AtomicI64::new(first_locator),
            ..Self::default()
        }
    }

    /// Uploader that cannot connect.
    #[must_use]
    pub fn refusing_connections() -> Self {
        Self {
            fail_connect: true,
            ..Self::default()
        }
    }

    /// Uploader that connects but rejects uploads.
    #[must_use]
    pub fn rejecting_uploads() -> Self {
        Self {
            fail_upload: true,
            ..Self::default()
        }
    }

    /// Uploads recorded so far.
    #[must_use]
    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl StorageUploader for FakeUploader {
    async fn connect(&self) -> anyhow::Result<()> {
        if self.fail_connect {
            bail!("unauthorized");
        }
        Ok(())
    }

    async fn upload(&self, file: &Path, caption: &str) -> anyhow::Result<UploadReceipt> {
        if self.fail_upload {
            bail!("Bad Request: file is too big");
        }
        let metadata = tokio::fs::metadata(file)
            .await
            .with_context(|| format!("failed to stat {}", file.display()))?;
        self.uploads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedUpload {
                path: file.to_path_buf(),
                caption: caption.to_string(),
                size_bytes: metadata.len(),
            });
        Ok(UploadReceipt {
            message_locator: self.next_locator.fetch_add(1, Ordering::SeqCst),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_core::ChatTransport;

    #[tokio::test]
    async fn fake_fetcher_writes_requested_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let fetcher = FakeFetcher::with_files(&[("Movie/movie.mkv", 16), ("readme.txt", 2)]);
        fetcher
            .fetch(&ContentLocator::Magnet("magnet:?xt=urn:btih:x".into()), dir.path())
            .await?;
        assert_eq!(
            tokio::fs::metadata(dir.path().join("Movie/movie.mkv"))
                .await?
                .len(),
            16
        );
        Ok(())
    }

    #[tokio::test]
    async fn recording_transport_fails_forwards_on_request() {
        let transport = RecordingTransport::new();
        transport.fail_forwards();
        assert!(
            transport
                .forward_stored(ChatId(1), ChatId(-100), 5)
                .await
                .is_err()
        );
        assert!(transport.sent().is_empty());
    }
}
