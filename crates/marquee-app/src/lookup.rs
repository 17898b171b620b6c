//! Lookup front-end: stored hits first, provider search on a miss.
//!
//! # Design
//! - A ready record whose title contains the query is served without
//!   searching. Pending records never count as hits.
//! - Provider failures are logged and shown as "no results".
//! - The result cache is owned here behind a short-lived lock. The lock is
//!   never held across network I/O, so requests from different requesters
//!   run concurrently.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use marquee_core::{
    Candidate, ChatId, ChatTransport, ContentLocator, DeliveryState, JobRecord, JobRecordStore,
    Reply, SearchProvider, WorkerRequest,
};
use marquee_telemetry::Metrics;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tracing::{debug, info, warn};

use crate::cache::ResultCache;
use crate::dispatcher::JobSubmitter;
use crate::pagination::{CallbackAction, PageView, render_page};

const QUALITY_PATTERN: &str = r"1080p|720p|480p|BluRay|WEBRip|H\.264|x265";

static QUALITY: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| {
    RegexBuilder::new(QUALITY_PATTERN)
        .case_insensitive(true)
        .build()
});

/// Display title used for locators pasted by the user.
pub const DIRECT_TITLE: &str = "User Link Download";

const WELCOME_TEXT: &str = "👋 Send me a title to search for it, or paste a magnet link to \
                            download it directly.";
const EXPIRED_TEXT: &str = "⚠️ Expired. Please search again.";
const RESOLVE_FAILED_TEXT: &str = "❌ Error fetching magnet.";
const DIRECT_TEXT: &str = "🧲 Magnet link detected. Starting download...";

/// Search parameters and the storage location used for hits.
#[derive(Debug, Clone)]
pub struct LookupSettings {
    /// Provider category.
    pub category: String,
    /// Provider result limit.
    pub limit: usize,
    /// Storage location that holds ready payloads.
    pub storage: ChatId,
}

/// Result of a lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// A ready record matched.
    Ready(JobRecord),
    /// The provider returned usable candidates.
    Results(Vec<Candidate>),
    /// Nothing matched.
    NoResults,
}

/// Keep candidates that have seeders and a recognised quality tag.
///
/// # Errors
///
/// Returns an error only if the built-in quality pattern fails to compile.
pub fn filter_candidates(candidates: Vec<Candidate>) -> anyhow::Result<Vec<Candidate>> {
    let quality = QUALITY.as_ref().map_err(Clone::clone)?;
    Ok(candidates
        .into_iter()
        .filter(|candidate| candidate.seeds > 0 && quality.is_match(&candidate.title))
        .collect())
}

/// Handles free-text queries and result selections for every requester.
pub struct LookupFrontEnd {
    cache: Mutex<ResultCache>,
    store: Arc<dyn JobRecordStore>,
    provider: Arc<dyn SearchProvider>,
    transport: Arc<dyn ChatTransport>,
    submitter: Arc<dyn JobSubmitter>,
    settings: LookupSettings,
    metrics: Metrics,
}

impl LookupFrontEnd {
    /// Wire the front-end to its collaborators with an empty cache.
    #[must_use]
    pub fn new(
        store: Arc<dyn JobRecordStore>,
        provider: Arc<dyn SearchProvider>,
        transport: Arc<dyn ChatTransport>,
        submitter: Arc<dyn JobSubmitter>,
        settings: LookupSettings,
        metrics: Metrics,
    ) -> Self {
        Self {
            cache: Mutex::new(ResultCache::new()),
            store,
            provider,
            transport,
            submitter,
            settings,
            metrics,
        }
    }

    /// Run `f` against the result cache while holding its lock.
    pub fn with_cache<R>(&self, f: impl FnOnce(&mut ResultCache) -> R) -> R {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut cache)
    }

    /// Resolve `query` against stored records, then the provider.
    ///
    /// Performs no writes.
    ///
    /// # Errors
    ///
    /// Returns an error when the record store cannot be queried.
    pub async fn lookup(&self, query: &str) -> anyhow::Result<LookupOutcome> {
        if let Some(record) = self
            .store
            .find_ready_by_title(query)
            .await
            .context("ready record lookup failed")?
        {
            self.metrics.inc_lookup("hit");
            return Ok(LookupOutcome::Ready(record));
        }

        let candidates = match self
            .provider
            .search(query, &self.settings.category, self.settings.limit)
            .await
        {
            Ok(candidates) => filter_candidates(candidates)?,
            Err(err) => {
                warn!(query, error = %err, "search provider failed");
                self.metrics.inc_lookup("provider_error");
                return Ok(LookupOutcome::NoResults);
            }
        };

        if candidates.is_empty() {
            self.metrics.inc_lookup("empty");
            Ok(LookupOutcome::NoResults)
        } else {
            self.metrics.inc_lookup("results");
            Ok(LookupOutcome::Results(candidates))
        }
    }

    /// Handle a free-text message from `chat`.
    ///
    /// # Errors
    ///
    /// Returns an error when the record store or the transport fails.
    pub async fn handle_text(&self, chat: ChatId, text: &str) -> anyhow::Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        if text.starts_with('/') {
            let command = text.split([' ', '@']).next().unwrap_or(text);
            if command == "/start" {
                self.reply(chat, Reply::text(WELCOME_TEXT)).await?;
            } else {
                debug!(chat = %chat, command = text, "ignoring command");
            }
            return Ok(());
        }

        if let Some(locator) = ContentLocator::parse_direct(text)? {
            self.reply(chat, Reply::text(DIRECT_TEXT)).await?;
            let job_id = self
                .submitter
                .submit(WorkerRequest::new(locator, chat, DIRECT_TITLE));
            info!(chat = %chat, job_id = %job_id, "direct locator dispatched");
            return Ok(());
        }

        self.reply(chat, Reply::text(format!("🔎 Searching for \"{text}\"...")))
            .await?;
        match self.lookup(text).await? {
            LookupOutcome::Ready(record) => self.deliver_ready(chat, &record).await,
            LookupOutcome::Results(candidates) => {
                self.with_cache(|cache| cache.start_session(chat, text.to_string(), candidates));
                self.show_page(chat, None, 0).await
            }
            LookupOutcome::NoResults => {
                self.reply(chat, Reply::text(format!("❌ No results found for \"{text}\".")))
                    .await
            }
        }
    }

    /// Handle a button press from `chat`.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport fails to deliver a reply.
    pub async fn handle_callback(
        &self,
        chat: ChatId,
        message_id: Option<i64>,
        callback_id: &str,
        data: &str,
    ) -> anyhow::Result<()> {
        if let Err(err) = self.transport.acknowledge_callback(callback_id).await {
            debug!(callback_id, error = %err, "failed to acknowledge callback");
        }
        match CallbackAction::parse(data) {
            Some(CallbackAction::Page(page)) => self.show_page(chat, message_id, page).await,
            Some(CallbackAction::Select(id)) => self.select(chat, message_id, &id).await,
            None => {
                debug!(chat = %chat, data, "ignoring unknown callback");
                Ok(())
            }
        }
    }

    async fn show_page(
        &self,
        chat: ChatId,
        message_id: Option<i64>,
        page: usize,
    ) -> anyhow::Result<()> {
        let view = self.with_cache(|cache| render_page(cache, chat, page));
        match view {
            PageView::Page(reply) => self.replace_or_send(chat, message_id, reply).await,
            PageView::Expired => self.reply(chat, Reply::text(EXPIRED_TEXT)).await,
        }
    }

    async fn select(&self, chat: ChatId, message_id: Option<i64>, id: &str) -> anyhow::Result<()> {
        let Some(candidate) = self.with_cache(|cache| cache.candidate(id).cloned()) else {
            debug!(chat = %chat, id, "selection expired");
            return self.reply(chat, Reply::text(EXPIRED_TEXT)).await;
        };

        let fetching = Reply::text(format!("⏳ Fetching locator for {}...", candidate.title));
        self.replace_or_send(chat, message_id, fetching).await?;

        let locator = match self.provider.resolve_locator(&candidate).await {
            Ok(Some(locator)) => locator,
            Ok(None) => {
                warn!(chat = %chat, title = %candidate.title, "candidate has no locator");
                return self.reply(chat, Reply::text(RESOLVE_FAILED_TEXT)).await;
            }
            Err(err) => {
                warn!(chat = %chat, title = %candidate.title, error = %err, "locator resolution failed");
                return self.reply(chat, Reply::text(RESOLVE_FAILED_TEXT)).await;
            }
        };

        self.reply(
            chat,
            Reply::text(format!(
                "🚀 Download started\n🎬 {}\n💿 {}",
                candidate.title, candidate.size
            )),
        )
        .await?;
        self.with_cache(|cache| cache.end_session(chat));
        let job_id = self
            .submitter
            .submit(WorkerRequest::new(locator, chat, candidate.title.as_str()));
        info!(chat = %chat, job_id = %job_id, title = %candidate.title, "selection dispatched");
        Ok(())
    }

    async fn deliver_ready(&self, chat: ChatId, record: &JobRecord) -> anyhow::Result<()> {
        let DeliveryState::Ready {
            file_reference,
            message_locator,
        } = &record.delivery
        else {
            return Ok(());
        };
        match self
            .transport
            .forward_stored(chat, self.settings.storage, *message_locator)
            .await
        {
            Ok(()) => Ok(()),
            Err(err) => {
                debug!(chat = %chat, error = %err, "forward failed, resending by reference");
                self.transport
                    .send_stored(chat, file_reference, Some(&record.title))
                    .await
            }
        }
    }

    async fn replace_or_send(
        &self,
        chat: ChatId,
        message_id: Option<i64>,
        reply: Reply,
    ) -> anyhow::Result<()> {
        if let Some(message_id) = message_id {
            match self.transport.edit_reply(chat, message_id, &reply).await {
                Ok(()) => return Ok(()),
                Err(err) => debug!(chat = %chat, error = %err, "edit failed, sending new reply"),
            }
        }
        self.reply(chat, reply).await
    }

    async fn reply(&self, chat: ChatId, reply: Reply) -> anyhow::Result<()> {
        self.transport
            .send_reply(chat, &reply)
            .await
            .map(|_| ())
            .context("failed to send reply")
    }
}
