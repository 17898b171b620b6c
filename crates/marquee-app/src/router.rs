//! Routes inbound updates to the front-end or the storage feed.

use std::sync::Arc;

use marquee_core::StorageEvent;
use marquee_telegram::InboundUpdate;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::lookup::LookupFrontEnd;

/// Single consumer of inbound updates.
///
/// Each user update runs on its own task so a slow search or locator
/// resolution for one requester never delays another. Storage posts are
/// handed to the reconciler task in arrival order.
pub struct UpdateRouter {
    front: Arc<LookupFrontEnd>,
    storage_feed: mpsc::Sender<StorageEvent>,
    in_flight: JoinSet<()>,
}

impl UpdateRouter {
    /// Build a router feeding storage posts into `storage_feed`.
    #[must_use]
    pub fn new(front: LookupFrontEnd, storage_feed: mpsc::Sender<StorageEvent>) -> Self {
        Self {
            front: Arc::new(front),
            storage_feed,
            in_flight: JoinSet::new(),
        }
    }

    /// Handle one update without waiting for user-facing work to finish.
    ///
    /// Handler failures are logged and never stop the loop.
    pub async fn route(&mut self, update: InboundUpdate) {
        self.reap();
        match update {
            InboundUpdate::Text {
                chat,
                text,
                message_id: _,
            } => {
                let front = Arc::clone(&self.front);
                self.in_flight.spawn(async move {
                    if let Err(err) = front.handle_text(chat, &text).await {
                        warn!(chat = %chat, error = %err, "failed to handle message");
                    }
                });
            }
            InboundUpdate::Callback {
                callback_id,
                chat,
                message_id,
                data,
            } => {
                let front = Arc::clone(&self.front);
                self.in_flight.spawn(async move {
                    if let Err(err) = front
                        .handle_callback(chat, message_id, &callback_id, &data)
                        .await
                    {
                        warn!(chat = %chat, error = %err, "failed to handle button press");
                    }
                });
            }
            InboundUpdate::Storage(event) => {
                let message_locator = event.message_locator;
                if self.storage_feed.send(event).await.is_err() {
                    warn!(message_locator, "reconciler stopped; storage event dropped");
                }
            }
        }
    }

    /// Wait for every in-flight handler to finish.
    pub async fn drain(&mut self) {
        while let Some(joined) = self.in_flight.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "update handler panicked");
            }
        }
    }

    /// Number of handlers still running or not yet reaped.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Front-end shared with the handler tasks.
    #[must_use]
    pub fn front(&self) -> &LookupFrontEnd {
        &self.front
    }

    fn reap(&mut self) {
        while let Some(joined) = self.in_flight.try_join_next() {
            if let Err(err) = joined {
                warn!(error = %err, "update handler panicked");
            } else {
                debug!("update handler finished");
            }
        }
    }
}
