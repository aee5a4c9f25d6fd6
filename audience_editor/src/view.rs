//! src/view.rs
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Client, ContactRecency, StatusFilter};

pub const PAGE_SIZE: usize = 12;

/// Operator-controlled view inputs. `page` starts at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub search: String,
    pub filter: StatusFilter,
    pub page:   usize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self { search: String::new(), filter: StatusFilter::None, page: 1 }
    }
}

impl ViewState {
    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
        self.page = 1;
    }

    pub fn set_filter(&mut self, filter: StatusFilter) {
        self.filter = filter;
        self.page = 1;
    }

    pub fn reset_page(&mut self) { self.page = 1; }

    pub fn next_page(&mut self, total_pages: usize) {
        self.page = (self.page + 1).min(total_pages.max(1));
    }

    pub fn prev_page(&mut self) {
        self.page = self.page.saturating_sub(1).max(1);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudiencePage {
    pub visible:        Vec<Client>,
    pub page:           usize,
    pub total_pages:    usize,
    pub total_filtered: usize,
}

/// A visible client with its recency label, as shown on a card.
#[derive(Debug, Clone, Serialize)]
pub struct Card {
    #[serde(flatten)]
    pub client:  Client,
    pub recency: ContactRecency,
    pub label:   String,
}

impl AudiencePage {
    pub fn cards(&self, now: DateTime<Utc>) -> Vec<Card> {
        self.visible
            .iter()
            .map(|c| {
                let recency = ContactRecency::of(c.last_sent, now);
                Card { client: c.clone(), recency, label: recency.to_string() }
            })
            .collect()
    }
}

pub fn total_pages(filtered: usize) -> usize {
    ((filtered + PAGE_SIZE - 1) / PAGE_SIZE).max(1)
}

/// Filters, searches and pages the roster.
///
/// Roster entries that are also staged are left out. Pure: same inputs,
/// same page.
pub fn project(roster: &[Client], staging: &[Client], state: &ViewState) -> AudiencePage {
    let staged: HashSet<&str> = staging.iter().map(|c| c.email.as_str()).collect();
    let needle = state.search.to_lowercase();

    let filtered: Vec<&Client> = roster
        .iter()
        .filter(|c| !staged.contains(c.email.as_str()))
        .filter(|c| state.filter.keeps(c))
        .filter(|c| c.email.to_lowercase().contains(&needle))
        .collect();

    let total_filtered = filtered.len();
    let total_pages    = total_pages(total_filtered);
    let page           = state.page.clamp(1, total_pages);

    let visible = filtered
        .into_iter()
        .skip((page - 1) * PAGE_SIZE)
        .take(PAGE_SIZE)
        .cloned()
        .collect();

    AudiencePage { visible, page, total_pages, total_filtered }
}
