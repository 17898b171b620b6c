//! Bot API wire types (the subset this adapter reads and writes).

use marquee_core::Button;
use serde::{Deserialize, Serialize};

/// Envelope wrapping every Bot API response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the call succeeded.
    pub ok: bool,
    /// Method result when `ok`.
    pub result: Option<T>,
    /// Failure description when not `ok`.
    pub description: Option<String>,
    /// Failure code when not `ok`.
    pub error_code: Option<i64>,
}

/// Bot or user account.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    /// Account identifier.
    pub id: i64,
    /// Whether the account is a bot.
    #[serde(default)]
    pub is_bot: bool,
    /// Username without the leading `@`.
    pub username: Option<String>,
}

/// Chat reference embedded in messages.
#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    /// Chat identifier.
    pub id: i64,
}

/// File metadata attached to video and document messages.
#[derive(Debug, Clone, Deserialize)]
pub struct FileMeta {
    /// Identifier usable to resend the file.
    pub file_id: String,
    /// Original file name.
    pub file_name: Option<String>,
    /// Size in bytes.
    pub file_size: Option<u64>,
}

/// Message or channel post.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    /// Position within the chat.
    pub message_id: i64,
    /// Chat the message belongs to.
    pub chat: Chat,
    /// Sending account, absent for anonymous channel posts.
    pub from: Option<User>,
    /// Sending chat for posts made on behalf of a chat.
    pub sender_chat: Option<Chat>,
    /// Text body.
    pub text: Option<String>,
    /// Media caption.
    pub caption: Option<String>,
    /// Attached video.
    pub video: Option<FileMeta>,
    /// Attached document.
    pub document: Option<FileMeta>,
}

/// Inline button press.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    /// Query identifier used to acknowledge the press.
    pub id: String,
    /// Account that pressed the button.
    pub from: User,
    /// Message carrying the pressed button.
    pub message: Option<Message>,
    /// Callback payload of the button.
    pub data: Option<String>,
}

/// One item returned by `getUpdates`.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    /// Monotonic update identifier.
    pub update_id: i64,
    /// Private or group message.
    pub message: Option<Message>,
    /// Channel post.
    pub channel_post: Option<Message>,
    /// Inline button press.
    pub callback_query: Option<CallbackQuery>,
}

/// Inline keyboard attached to outbound messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    /// Button rows.
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

/// One inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    /// Visible label.
    pub text: String,
    /// Payload returned on press.
    pub callback_data: String,
}

impl InlineKeyboardMarkup {
    /// Convert a reply grid; `None` when the grid is empty.
    #[must_use]
    pub fn from_grid(grid: &[Vec<Button>]) -> Option<Self> {
        if grid.is_empty() {
            return None;
        }
        Some(Self {
            inline_keyboard: grid
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|button| InlineKeyboardButton {
                            text: button.label.clone(),
                            callback_data: button.callback.clone(),
                        })
                        .collect()
                })
                .collect(),
        })
    }
}
