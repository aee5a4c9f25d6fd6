//! src/history.rs
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use serde::Serialize;
use tracing::debug;

use crate::{
    backend::Backend,
    error::Result,
    model::ContactHistoryEntry,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "card", rename_all = "snake_case")]
pub enum HistoryToggle {
    Collapsed,
    Expanded { email: String, entries: Vec<ContactHistoryEntry> },
}

/// Per-email send history, fetched on first expansion and kept for the
/// whole session. Entries are never refreshed or evicted.
pub struct ContactHistoryCache {
    backend:  Arc<dyn Backend>,
    memo:     Mutex<HashMap<String, Vec<ContactHistoryEntry>>>,
    expanded: Mutex<Option<String>>,
}

impl ContactHistoryCache {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend, memo: Mutex::default(), expanded: Mutex::default() }
    }

    pub fn cached(&self, email: &str) -> Option<Vec<ContactHistoryEntry>> {
        self.memo.lock().unwrap_or_else(|p| p.into_inner()).get(email).cloned()
    }

    pub fn expanded(&self) -> Option<String> {
        self.expanded.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn set_expanded(&self, email: Option<String>) {
        *self.expanded.lock().unwrap_or_else(|p| p.into_inner()) = email;
    }

    /// Memoized fetch. A failure leaves the slot empty so the next call retries.
    pub async fn fetch_if_absent(&self, email: &str) -> Result<Vec<ContactHistoryEntry>> {
        if let Some(hit) = self.cached(email) {
            return Ok(hit);
        }

        let entries = self.backend.fetch_history(email).await?;
        debug!(email, n = entries.len(), "history cached");
        self.memo
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(email.to_string(), entries.clone());
        Ok(entries)
    }

    /// Expands `email`'s card, collapsing any other, or collapses it if it is
    /// already open. The card opens even when the fetch fails; the error is
    /// returned for reporting.
    pub async fn toggle(&self, email: &str) -> Result<HistoryToggle> {
        if self.expanded().as_deref() == Some(email) {
            self.set_expanded(None);
            return Ok(HistoryToggle::Collapsed);
        }

        let fetched = self.fetch_if_absent(email).await;
        self.set_expanded(Some(email.to_string()));

        let entries = fetched?;
        Ok(HistoryToggle::Expanded { email: email.to_string(), entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend::InMemoryBackend, error::AudienceError};
    use chrono::{TimeZone, Utc};

    fn entry(day: u32) -> ContactHistoryEntry {
        ContactHistoryEntry { date: Utc.with_ymd_and_hms(2024, 2, day, 9, 0, 0).unwrap() }
    }

    fn cache() -> (Arc<InMemoryBackend>, ContactHistoryCache) {
        let backend = Arc::new(InMemoryBackend::new());
        (backend.clone(), ContactHistoryCache::new(backend))
    }

    #[tokio::test]
    async fn second_fetch_is_served_from_memo() {
        let (backend, cache) = cache();
        backend.seed_history("a@x.com", vec![entry(2), entry(1)]);

        let first  = cache.fetch_if_absent("a@x.com").await.unwrap();
        backend.seed_history("a@x.com", vec![entry(3)]);
        let second = cache.fetch_if_absent("a@x.com").await.unwrap();

        assert_eq!(first, vec![entry(2), entry(1)]);
        assert_eq!(second, first);
        assert_eq!(backend.history_calls(), 1);
    }

    #[tokio::test]
    async fn failed_fetch_is_retried_next_time() {
        let (backend, cache) = cache();
        backend.seed_history("a@x.com", vec![entry(1)]);
        backend.set_offline(true);

        assert!(matches!(cache.fetch_if_absent("a@x.com").await, Err(AudienceError::Sync(_))));
        assert!(cache.cached("a@x.com").is_none());

        backend.set_offline(false);
        assert_eq!(cache.fetch_if_absent("a@x.com").await.unwrap(), vec![entry(1)]);
        assert_eq!(backend.history_calls(), 2);
    }

    #[tokio::test]
    async fn only_one_card_is_expanded() {
        let (_backend, cache) = cache();

        cache.toggle("a@x.com").await.unwrap();
        assert_eq!(cache.expanded().as_deref(), Some("a@x.com"));

        cache.toggle("b@x.com").await.unwrap();
        assert_eq!(cache.expanded().as_deref(), Some("b@x.com"));

        assert_eq!(cache.toggle("b@x.com").await.unwrap(), HistoryToggle::Collapsed);
        assert_eq!(cache.expanded(), None);
    }

    #[tokio::test]
    async fn card_opens_even_if_fetch_fails() {
        let (backend, cache) = cache();
        backend.set_offline(true);

        assert!(cache.toggle("a@x.com").await.is_err());
        assert_eq!(cache.expanded().as_deref(), Some("a@x.com"));
    }
}
