//! Long-polling of inbound updates and their mapping onto domain inputs.

use marquee_core::{ChatId, MediaKind, StorageEvent, StoredMedia};

use crate::api::{FileMeta, Message, Update};
use crate::client::BotClient;
use crate::error::TelegramResult;

/// Default long-poll window in seconds.
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

/// Inbound event the service reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundUpdate {
    /// Free-text message from a user.
    Text {
        /// Originating chat.
        chat: ChatId,
        /// Message id of the text.
        message_id: i64,
        /// Message body.
        text: String,
    },
    /// Inline button press.
    Callback {
        /// Identifier used to acknowledge the press.
        callback_id: String,
        /// Chat holding the pressed message.
        chat: ChatId,
        /// Message carrying the keyboard, when still accessible.
        message_id: Option<i64>,
        /// Button payload.
        data: String,
    },
    /// Media posted to a chat; candidates for reconciliation.
    Storage(StorageEvent),
}

/// Offset-tracking `getUpdates` loop state.
#[derive(Debug)]
pub struct UpdatePoller {
    client: BotClient,
    offset: i64,
    timeout_secs: u64,
}

impl UpdatePoller {
    /// Poller starting from the oldest unconfirmed update.
    #[must_use]
    pub const fn new(client: BotClient, timeout_secs: u64) -> Self {
        Self {
            client,
            offset: 0,
            timeout_secs,
        }
    }

    /// Fetch the next batch, confirming everything returned.
    ///
    /// # Errors
    ///
    /// Returns an error when the poll fails; the offset is left unchanged.
    pub async fn next_batch(&mut self) -> TelegramResult<Vec<InboundUpdate>> {
        let updates = self
            .client
            .get_updates(self.offset, self.timeout_secs)
            .await?;
        if let Some(last) = updates.iter().map(|update| update.update_id).max() {
            self.offset = last + 1;
        }
        Ok(updates.into_iter().filter_map(map_update).collect())
    }
}

/// Map a raw update; updates the service does not handle yield `None`.
#[must_use]
pub fn map_update(update: Update) -> Option<InboundUpdate> {
    if let Some(query) = update.callback_query {
        let data = query.data?;
        let (chat, message_id) = query.message.as_ref().map_or_else(
            || (ChatId(query.from.id), None),
            |message| (ChatId(message.chat.id), Some(message.message_id)),
        );
        return Some(InboundUpdate::Callback {
            callback_id: query.id,
            chat,
            message_id,
            data,
        });
    }

    if let Some(post) = update.channel_post {
        return storage_event(post).map(InboundUpdate::Storage);
    }

    let message = update.message?;
    if let Some(text) = message.text {
        return Some(InboundUpdate::Text {
            chat: ChatId(message.chat.id),
            message_id: message.message_id,
            text,
        });
    }
    storage_event(message).map(InboundUpdate::Storage)
}

fn storage_event(message: Message) -> Option<StorageEvent> {
    let media = match (message.video, message.document) {
        (Some(video), _) => stored_media(video, MediaKind::Video),
        (None, Some(document)) => stored_media(document, MediaKind::Document),
        (None, None) => return None,
    };
    let sender_id = message
        .from
        .map(|user| user.id)
        .or_else(|| message.sender_chat.map(|chat| chat.id));
    Some(StorageEvent {
        chat_id: ChatId(message.chat.id),
        message_locator: message.message_id,
        sender_id,
        caption: message.caption,
        media: Some(media),
    })
}

fn stored_media(meta: FileMeta, kind: MediaKind) -> StoredMedia {
    StoredMedia {
        file_reference: meta.file_id,
        kind,
        file_name: meta.file_name,
        size_bytes: meta.file_size,
    }
}
