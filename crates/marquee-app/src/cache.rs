//! Process-local result cache backing paginated selections.
//!
//! Two maps: short id → candidate, and requester → search session. Neither is
//! evicted; entries live until restart, overwrite, or an explicit `clear`.
//! Growth is unbounded for a long-lived process.

use std::collections::HashMap;

use marquee_core::{Candidate, ChatId};
use uuid::Uuid;

/// One requester's search, kept to regenerate pages.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSession {
    /// Query as typed.
    pub query: String,
    /// Filtered candidates in provider order.
    pub candidates: Vec<Candidate>,
}

/// Owned cache; the front-end holds it exclusively.
#[derive(Debug, Default)]
pub struct ResultCache {
    candidates: HashMap<String, Candidate>,
    sessions: HashMap<ChatId, SearchSession>,
}

impl ResultCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or replace) the session for `requester`.
    pub fn start_session(&mut self, requester: ChatId, query: String, candidates: Vec<Candidate>) {
        self.sessions
            .insert(requester, SearchSession { query, candidates });
    }

    /// Session for `requester`, if one is live.
    #[must_use]
    pub fn session(&self, requester: ChatId) -> Option<&SearchSession> {
        self.sessions.get(&requester)
    }

    /// End the session for `requester`.
    pub fn end_session(&mut self, requester: ChatId) {
        self.sessions.remove(&requester);
    }

    /// Store `candidate` under a freshly minted short id and return the id.
    ///
    /// A colliding id overwrites the older entry.
    pub fn register(&mut self, candidate: Candidate) -> String {
        let id = mint_id();
        self.candidates.insert(id.clone(), candidate);
        id
    }

    /// Candidate registered under `id`.
    #[must_use]
    pub fn candidate(&self, id: &str) -> Option<&Candidate> {
        self.candidates.get(id)
    }

    /// Number of registered candidate ids.
    #[must_use]
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.candidates.clear();
        self.sessions.clear();
    }
}

/// First hyphen-delimited segment of a v4 UUID (8 hex characters).
fn mint_id() -> String {
    let uuid = Uuid::new_v4().to_string();
    uuid.split('-').next().unwrap_or(&uuid).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_test_support::fixtures::candidate;

    #[test]
    fn new_search_replaces_previous_session() {
        let mut cache = ResultCache::new();
        let requester = ChatId(1);
        cache.start_session(requester, "dune".into(), vec![candidate("Dune 1080p", 3, 1)]);
        cache.start_session(requester, "heat".into(), vec![]);

        let session = cache.session(requester).expect("session");
        assert_eq!(session.query, "heat");
        assert!(session.candidates.is_empty());
        assert!(cache.session(ChatId(2)).is_none());
    }

    #[test]
    fn registered_ids_are_short_and_resolve() {
        let mut cache = ResultCache::new();
        let id = cache.register(candidate("Heat 720p", 9, 2));
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(cache.candidate(&id).map(|c| c.seeds), Some(9));
    }

    #[test]
    fn clear_expires_everything() {
        let mut cache = ResultCache::new();
        let id = cache.register(candidate("Heat 720p", 9, 2));
        cache.start_session(ChatId(1), "heat".into(), vec![]);
        cache.clear();
        assert!(cache.candidate(&id).is_none());
        assert!(cache.session(ChatId(1)).is_none());
        assert_eq!(cache.candidate_count(), 0);
    }
}
