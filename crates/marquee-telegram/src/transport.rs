//! `ChatTransport` over the Bot API.

use anyhow::Context;
use async_trait::async_trait;
use marquee_core::{ChatId, ChatTransport, Reply};

use crate::api::InlineKeyboardMarkup;
use crate::client::BotClient;

/// Front-end bot transport.
#[derive(Debug, Clone)]
pub struct TelegramTransport {
    client: BotClient,
}

impl TelegramTransport {
    /// Wrap a client.
    #[must_use]
    pub const fn new(client: BotClient) -> Self {
        Self { client }
    }

    /// Underlying client, shared with the update poller.
    #[must_use]
    pub const fn client(&self) -> &BotClient {
        &self.client
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_reply(&self, chat: ChatId, reply: &Reply) -> anyhow::Result<Option<i64>> {
        let message = self
            .client
            .send_message(
                chat.0,
                &reply.text,
                InlineKeyboardMarkup::from_grid(&reply.keyboard),
            )
            .await
            .with_context(|| format!("failed to send reply to {chat}"))?;
        Ok(Some(message.message_id))
    }

    async fn edit_reply(&self, chat: ChatId, message_id: i64, reply: &Reply) -> anyhow::Result<()> {
        self.client
            .edit_message_text(
                chat.0,
                message_id,
                &reply.text,
                InlineKeyboardMarkup::from_grid(&reply.keyboard),
            )
            .await
            .with_context(|| format!("failed to edit message {message_id} in {chat}"))
    }

    async fn acknowledge_callback(&self, callback_id: &str) -> anyhow::Result<()> {
        self.client
            .answer_callback_query(callback_id)
            .await
            .context("failed to acknowledge callback")
    }

    async fn forward_stored(
        &self,
        chat: ChatId,
        storage: ChatId,
        message_locator: i64,
    ) -> anyhow::Result<()> {
        self.client
            .forward_message(chat.0, storage.0, message_locator)
            .await
            .with_context(|| format!("failed to forward {storage}/{message_locator} to {chat}"))?;
        Ok(())
    }

    async fn send_stored(
        &self,
        chat: ChatId,
        file_reference: &str,
        caption: Option<&str>,
    ) -> anyhow::Result<()> {
        self.client
            .send_document_by_id(chat.0, file_reference, caption)
            .await
            .with_context(|| format!("failed to send stored file to {chat}"))?;
        Ok(())
    }
}
