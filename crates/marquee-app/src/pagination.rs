//! Page rendering over a cached search session, and callback parsing.
//!
//! # Design
//! - Fixed page size of 20 and a button grid of rows of 4 plus one
//!   navigation row.
//! - Each rendered row mints a fresh short id in the cache.
//! - An unknown requester or an out-of-range page is `Expired`, never an error.

use std::ops::Range;

use marquee_core::{Button, ChatId, Reply};

use crate::cache::ResultCache;

/// Candidates per page.
pub const PAGE_SIZE: usize = 20;
/// Selection buttons per grid row.
pub const BUTTONS_PER_ROW: usize = 4;

const SELECT_PREFIX: &str = "dl_";
const PAGE_PREFIX: &str = "page_";

/// Result of rendering a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageView {
    /// Rendered page.
    Page(Reply),
    /// No session, or the page is out of range.
    Expired,
}

/// Parsed button payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// Select the candidate registered under this id.
    Select(String),
    /// Show the page with this index.
    Page(usize),
}

impl CallbackAction {
    /// Parse a callback payload; unknown payloads yield `None`.
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        if let Some(id) = data.strip_prefix(SELECT_PREFIX) {
            return (!id.is_empty()).then(|| Self::Select(id.to_string()));
        }
        data.strip_prefix(PAGE_PREFIX)
            .and_then(|index| index.parse().ok())
            .map(Self::Page)
    }

    /// Payload string for the action.
    #[must_use]
    pub fn payload(&self) -> String {
        match self {
            Self::Select(id) => format!("{SELECT_PREFIX}{id}"),
            Self::Page(index) => format!("{PAGE_PREFIX}{index}"),
        }
    }
}

/// Number of pages for `total` candidates.
#[must_use]
pub const fn page_count(total: usize) -> usize {
    total.div_ceil(PAGE_SIZE)
}

/// Index range covered by `page`, or `None` when out of range.
#[must_use]
pub fn page_bounds(total: usize, page: usize) -> Option<Range<usize>> {
    if page >= page_count(total) {
        return None;
    }
    let start = page * PAGE_SIZE;
    Some(start..total.min(start + PAGE_SIZE))
}

/// Render `page` of the requester's session, registering an id per row.
pub fn render_page(cache: &mut ResultCache, requester: ChatId, page: usize) -> PageView {
    let Some(session) = cache.session(requester) else {
        return PageView::Expired;
    };
    let total = session.candidates.len();
    let Some(bounds) = page_bounds(total, page) else {
        return PageView::Expired;
    };
    let pages = page_count(total);
    let query = session.query.clone();
    let rows: Vec<_> = session.candidates[bounds.clone()].to_vec();

    let mut sections = vec![format!(
        "🔎 Results for \"{query}\"\nPage {} of {pages}\n",
        page + 1
    )];
    let mut buttons = Vec::with_capacity(rows.len());
    for (offset, candidate) in rows.into_iter().enumerate() {
        let number = bounds.start + offset + 1;
        sections.push(format!(
            "{number}. {}\n💿 {} | 🟢 S:{} | ⚙️ {}\n",
            candidate.title, candidate.size, candidate.seeds, candidate.source
        ));
        let id = cache.register(candidate);
        buttons.push(Button::new(
            format!("⬇️ {number}"),
            CallbackAction::Select(id).payload(),
        ));
    }

    let mut keyboard: Vec<Vec<Button>> = buttons
        .chunks(BUTTONS_PER_ROW)
        .map(<[Button]>::to_vec)
        .collect();
    let mut navigation = Vec::new();
    if page > 0 {
        navigation.push(Button::new("⬅️ Prev", CallbackAction::Page(page - 1).payload()));
    }
    if page + 1 < pages {
        navigation.push(Button::new("Next ➡️", CallbackAction::Page(page + 1).payload()));
    }
    if !navigation.is_empty() {
        keyboard.push(navigation);
    }

    PageView::Page(Reply::with_keyboard(sections.join("\n"), keyboard))
}
