//! src/stats.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    backend::Backend,
    error::Result,
    model::{Group, GroupStats, StatusFilter},
};

/// One entry of the "latest sends" list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentSend {
    pub email: String,
    pub at:    Option<DateTime<Utc>>,
}

/// Dashboard panel for the active group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsPanel {
    pub group:       Group,
    pub total:       u32,
    pub contacted:   u32,
    pub uncontacted: u32,
    pub sent:        u32,
    /// Newest first; never-mailed clients last.
    pub recent:      Vec<RecentSend>,
}

impl StatsPanel {
    pub fn new(group: Group, stats: GroupStats) -> Self {
        let mut recent: Vec<RecentSend> = stats
            .last_sends
            .into_iter()
            .map(|(email, at)| RecentSend { email, at })
            .collect();
        // None sorts below any timestamp
        recent.sort_by(|a, b| b.at.cmp(&a.at));

        Self {
            group,
            total:       stats.total,
            contacted:   stats.total.saturating_sub(stats.uncontacted),
            uncontacted: stats.uncontacted,
            sent:        stats.sent,
            recent,
        }
    }
}

/// Clickable counters on the panel; each one narrows the roster view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsCard {
    Total,
    Contacted,
    Uncontacted,
}

impl StatsCard {
    pub fn filter(self) -> StatusFilter {
        match self {
            StatsCard::Total       => StatusFilter::None,
            StatsCard::Contacted   => StatusFilter::Contacted,
            StatsCard::Uncontacted => StatusFilter::Uncontacted,
        }
    }
}

/// Stats for `group`, or `None` in staging-only mode where no fetch is made.
pub async fn group_stats(backend: &dyn Backend, group: Group) -> Result<Option<StatsPanel>> {
    if group.is_staging_only() {
        return Ok(None);
    }
    let stats = backend.group_stats(group).await?;
    Ok(Some(StatsPanel::new(group, stats)))
}
