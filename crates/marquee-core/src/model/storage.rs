//! Storage-location uploads and the events they produce.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ChatId;

const TITLE_MARK: &str = "🎬";
const SIZE_MARK: &str = "📏";
const JOB_MARK: &str = "🔖";
const BYTES_PER_MIB: f64 = 1_048_576.0;

/// Receipt returned by the storage location after an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Position of the uploaded payload within the storage location.
    pub message_locator: i64,
}

/// Caption attached to every upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCaption {
    /// Display title.
    pub title: String,
    /// Uploaded size in bytes.
    pub size_bytes: u64,
    /// Job identifier used for correlated reconciliation.
    pub job_id: Uuid,
}

impl UploadCaption {
    /// Size in mebibytes, as shown in captions.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn size_mib(&self) -> f64 {
        self.size_bytes as f64 / BYTES_PER_MIB
    }

    /// Render the caption text.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "{TITLE_MARK} {}\n{SIZE_MARK} Size: {:.2} MB\n{JOB_MARK} {}",
            self.title,
            self.size_mib(),
            self.job_id
        )
    }

    /// Extract the job identifier tag from a caption, if present.
    #[must_use]
    pub fn job_tag(caption: &str) -> Option<Uuid> {
        caption
            .lines()
            .filter_map(|line| line.trim().strip_prefix(JOB_MARK))
            .find_map(|rest| Uuid::parse_str(rest.trim()).ok())
    }
}

/// Kind of media attached to a storage post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Native video post.
    Video,
    /// Generic document post.
    Document,
}

/// Media metadata carried by a storage event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMedia {
    /// Reference usable to resend the payload.
    pub file_reference: String,
    /// Media kind.
    pub kind: MediaKind,
    /// Original file name when reported.
    pub file_name: Option<String>,
    /// Size in bytes when reported.
    pub size_bytes: Option<u64>,
}

/// Notification that something was posted to a storage location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEvent {
    /// Chat the post landed in.
    pub chat_id: ChatId,
    /// Position of the post within that chat.
    pub message_locator: i64,
    /// Identity that authored the post, when known.
    pub sender_id: Option<i64>,
    /// Caption text.
    pub caption: Option<String>,
    /// Attached media, if any.
    pub media: Option<StoredMedia>,
}

impl StorageEvent {
    /// Job identifier tag carried in the caption.
    #[must_use]
    pub fn job_tag(&self) -> Option<Uuid> {
        self.caption.as_deref().and_then(UploadCaption::job_tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_renders_title_size_and_tag() {
        let job_id = Uuid::new_v4();
        let caption = UploadCaption {
            title: "Arrival 2016 1080p".into(),
            size_bytes: 3 * 1_048_576 + 524_288,
            job_id,
        };
        let text = caption.render();
        assert_eq!(
            text,
            format!("🎬 Arrival 2016 1080p\n📏 Size: 3.50 MB\n🔖 {job_id}")
        );
        assert_eq!(UploadCaption::job_tag(&text), Some(job_id));
    }

    #[test]
    fn job_tag_is_absent_from_foreign_captions() {
        assert_eq!(UploadCaption::job_tag("🎬 Something\n📏 Size: 1.00 MB"), None);
        assert_eq!(UploadCaption::job_tag("🔖 not-a-uuid"), None);

        let event = StorageEvent {
            chat_id: ChatId(-100),
            message_locator: 4,
            sender_id: None,
            caption: None,
            media: None,
        };
        assert_eq!(event.job_tag(), None);
    }
}
