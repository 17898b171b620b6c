//! Chunked uploads to the storage chat.
//!
//! # Design
//! - The file is read in fixed 512 KiB chunks, strictly in order, and fed to a
//!   single streaming multipart request.
//! - Progress is logged at every 10% boundary crossed.
//! - `connect` validates the token with `getMe`, retrying a bounded number of
//!   times before giving up.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures_util::stream;
use marquee_core::{ChatId, StorageUploader, UploadReceipt};
use reqwest::Body;
use reqwest::multipart::{Form, Part};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use crate::api::Message;
use crate::client::BotClient;
use crate::error::{TelegramError, TelegramResult};

/// Size of each upload chunk.
pub const CHUNK_SIZE: usize = 512 * 1024;

const DEFAULT_CONNECT_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Uploader posting documents into the storage chat.
#[derive(Debug, Clone)]
pub struct BotUploader {
    client: BotClient,
    storage: ChatId,
    connect_attempts: u32,
    retry_delay: Duration,
}

impl BotUploader {
    /// Uploader for `storage` using the default connect retry policy.
    #[must_use]
    pub const fn new(client: BotClient, storage: ChatId) -> Self {
        Self {
            client,
            storage,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Override the connect retry policy.
    #[must_use]
    pub const fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.connect_attempts = if attempts == 0 { 1 } else { attempts };
        self.retry_delay = delay;
        self
    }

    async fn send_document(&self, file: &Path, caption: &str) -> TelegramResult<Message> {
        let handle = File::open(file)
            .await
            .map_err(|source| TelegramError::UploadSource {
                path: file.to_path_buf(),
                source,
            })?;
        let total = handle
            .metadata()
            .await
            .map_err(|source| TelegramError::UploadSource {
                path: file.to_path_buf(),
                source,
            })?
            .len();
        let file_name = file
            .file_name()
            .map_or_else(|| "payload".to_string(), |name| name.to_string_lossy().into_owned());

        let part = Part::stream_with_length(chunked_body(handle, total), total).file_name(file_name);
        let form = Form::new()
            .text("chat_id", self.storage.to_string())
            .text("caption", caption.to_string())
            .part("document", part);
        self.client.call_multipart("sendDocument", form).await
    }
}

#[async_trait]
impl StorageUploader for BotUploader {
    async fn connect(&self) -> anyhow::Result<()> {
        let mut attempt = 1;
        loop {
            match self.client.get_me().await {
                Ok(me) => {
                    info!(uploader_id = me.id, username = ?me.username, "uploader connected");
                    return Ok(());
                }
                Err(err) if attempt < self.connect_attempts => {
                    warn!(attempt, error = %err, "uploader connect failed; retrying");
                    attempt += 1;
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(err) => return Err(err).context("uploader identity check failed"),
            }
        }
    }

    async fn upload(&self, file: &Path, caption: &str) -> anyhow::Result<UploadReceipt> {
        let message = self
            .send_document(file, caption)
            .await
            .with_context(|| format!("failed to upload {}", file.display()))?;
        info!(
            storage = %self.storage,
            message_locator = message.message_id,
            "upload accepted by storage chat"
        );
        Ok(UploadReceipt {
            message_locator: message.message_id,
        })
    }
}

struct ChunkReader {
    file: File,
    sent: u64,
    total: u64,
    logged_decile: u64,
}

impl ChunkReader {
    async fn next_chunk(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        let mut buffer = vec![0_u8; CHUNK_SIZE];
        let mut filled = 0;
        while filled < CHUNK_SIZE {
            let read = self.file.read(&mut buffer[filled..]).await?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        if filled == 0 {
            return Ok(None);
        }
        buffer.truncate(filled);
        self.sent += filled as u64;
        self.report_progress();
        Ok(Some(buffer))
    }

    fn report_progress(&mut self) {
        let Some(decile) = progress_decile(self.sent, self.total) else {
            return;
        };
        if decile > self.logged_decile {
            self.logged_decile = decile;
            info!(
                percent = decile * 10,
                sent_bytes = self.sent,
                total_bytes = self.total,
                "upload progress"
            );
        }
    }
}

fn progress_decile(sent: u64, total: u64) -> Option<u64> {
    if total == 0 {
        return None;
    }
    Some((sent.min(total) * 10) / total)
}

fn chunked_body(file: File, total: u64) -> Body {
    let reader = ChunkReader {
        file,
        sent: 0,
        total,
        logged_decile: 0,
    };
    Body::wrap_stream(stream::try_unfold(reader, |mut reader| async move {
        Ok::<_, std::io::Error>(reader.next_chunk().await?.map(|chunk| (chunk, reader)))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn deciles_follow_bytes_sent() {
        assert_eq!(progress_decile(0, 100), Some(0));
        assert_eq!(progress_decile(9, 100), Some(0));
        assert_eq!(progress_decile(10, 100), Some(1));
        assert_eq!(progress_decile(100, 100), Some(10));
        assert_eq!(progress_decile(150, 100), Some(10));
        assert_eq!(progress_decile(1, 0), None);
    }

    #[tokio::test]
    async fn chunks_are_read_in_order_and_sized() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("payload.bin");
        let bytes: Vec<u8> = (0..(CHUNK_SIZE * 2 + 10))
            .map(|i| u8::try_from(i % 251).unwrap_or_default())
            .collect();
        tokio::fs::write(&path, &bytes).await?;

        let file = File::open(&path).await?;
        let mut reader = ChunkReader {
            file,
            sent: 0,
            total: bytes.len() as u64,
            logged_decile: 0,
        };
        let mut sizes = Vec::new();
        let mut joined = Vec::new();
        while let Some(chunk) = reader.next_chunk().await? {
            sizes.push(chunk.len());
            joined.extend_from_slice(&chunk);
        }
        assert_eq!(sizes, vec![CHUNK_SIZE, CHUNK_SIZE, 10]);
        assert_eq!(joined, bytes);
        assert_eq!(reader.logged_decile, 10);
        Ok(())
    }

    #[tokio::test]
    async fn upload_returns_storage_position() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/botU/sendDocument");
            then.status(200).json_body(json!({
                "ok": true,
                "result": { "message_id": 321, "chat": { "id": -100 } }
            }));
        });

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("movie.mkv");
        tokio::fs::write(&path, vec![1_u8; 2048]).await?;

        let uploader = BotUploader::new(BotClient::new(&server.base_url(), "U")?, ChatId(-100));
        let receipt = uploader.upload(&path, "🎬 Movie").await?;
        assert_eq!(receipt.message_locator, 321);
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn connect_gives_up_after_bounded_attempts() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/botU/getMe");
            then.status(401).json_body(json!({
                "ok": false,
                "error_code": 401,
                "description": "Unauthorized"
            }));
        });

        let uploader = BotUploader::new(BotClient::new(&server.base_url(), "U")?, ChatId(-100))
            .with_retry(2, Duration::from_millis(1));
        let err = uploader.connect().await.expect_err("connect should fail");
        assert_eq!(err.root_cause().to_string(), "Unauthorized");
        mock.assert_calls(2);
        Ok(())
    }
}
