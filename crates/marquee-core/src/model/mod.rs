//! Core domain types shared across the workspace.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

mod job;
mod locator;
mod record;
mod storage;

pub use job::{ARG_JOB_ID, ARG_LOCATOR, ARG_REQUESTER, ARG_TITLE, WorkerOutcome, WorkerRequest};
pub use locator::ContentLocator;
pub use record::{
    DeliveryState, JobRecord, NewJobRecord, PENDING_QUALITY, Promotion, READY_QUALITY,
};
pub use storage::{MediaKind, StorageEvent, StoredMedia, UploadCaption, UploadReceipt};

/// Chat identity: a requester or a storage location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl Display for ChatId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// One search result from a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Release title.
    pub title: String,
    /// Human-readable size label.
    pub size: String,
    /// Seeder count reported by the provider.
    pub seeds: u32,
    /// Provider or tracker label.
    pub source: String,
    /// Opaque provider data needed to resolve a locator later.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Selectable button in a reply grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// Visible label.
    pub label: String,
    /// Opaque callback payload returned when pressed.
    pub callback: String,
}

impl Button {
    /// Build a button.
    #[must_use]
    pub fn new(label: impl Into<String>, callback: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callback: callback.into(),
        }
    }
}

/// Outbound text plus an optional button grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    /// Message body.
    pub text: String,
    /// Rows of buttons; empty when the reply has no grid.
    pub keyboard: Vec<Vec<Button>>,
}

impl Reply {
    /// Plain text reply without buttons.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Vec::new(),
        }
    }

    /// Reply with a button grid.
    #[must_use]
    pub fn with_keyboard(text: impl Into<String>, keyboard: Vec<Vec<Button>>) -> Self {
        Self {
            text: text.into(),
            keyboard,
        }
    }
}
