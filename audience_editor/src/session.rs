//! src/session.rs
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast, watch};
use tracing::info;

use crate::{
    backend::Backend,
    error::Result,
    events::{AudienceEvent, EventBus},
    history::{ContactHistoryCache, HistoryToggle},
    model::{Client, Group, StatusFilter},
    notify::{Confirm, Notifier},
    ranking::{contact_ranking, ContactRanking},
    roster::{ReloadOutcome, RemoveOutcome, RosterStore},
    selector,
    staging::{MirrorOutcome, StagingAdd, StagingStore},
    stats::{self, StatsCard, StatsPanel},
    transfer::{DragState, TransferCoordinator, TransferReport},
    view::{self, AudiencePage, ViewState},
};

/// One operator's editing session.
///
/// Owns the active group (the only writer of it) and every store. Each
/// method is one UI event; outcomes are also queued as notices.
pub struct AudienceSession {
    backend:  Arc<dyn Backend>,
    group:    watch::Sender<Group>,
    roster:   Arc<RosterStore>,
    staging:  Arc<StagingStore>,
    transfer: TransferCoordinator,
    history:  ContactHistoryCache,
    view:     Mutex<ViewState>,
    notices:  Notifier,
    events:   EventBus,
}

impl AudienceSession {
    /// Builds an empty session. Call [`select_group`](Self::select_group) to
    /// load the first roster.
    pub fn new(backend: Arc<dyn Backend>, initial: Group) -> Self {
        let (group, active) = watch::channel(initial);
        let events = EventBus::default();

        let roster  = Arc::new(RosterStore::new(backend.clone(), active.clone(), events.clone()));
        let staging = Arc::new(StagingStore::new(backend.clone(), active, events.clone()));
        let transfer = TransferCoordinator::new(roster.clone(), staging.clone(), events.clone());
        let history  = ContactHistoryCache::new(backend.clone());

        Self {
            backend,
            group,
            roster,
            staging,
            transfer,
            history,
            view: Mutex::new(ViewState::default()),
            notices: Notifier::new(),
            events,
        }
    }

    fn view_state(&self) -> MutexGuard<'_, ViewState> {
        self.view.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn reported<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.notices.report(e);
        }
        result
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AudienceEvent> { self.events.subscribe() }
    pub fn notices(&self) -> &Notifier { &self.notices }
    pub fn roster(&self) -> &RosterStore { &self.roster }
    pub fn staging(&self) -> &StagingStore { &self.staging }

    // ── group ──────────────────────────────────────────────────────────

    pub fn active_group(&self) -> Group { *self.group.borrow() }

    /// Switches the active group and reloads the roster for it.
    pub async fn select_group(&self, group: Group) -> Result<ReloadOutcome> {
        self.group.send_replace(group);
        self.events.publish(AudienceEvent::GroupChanged { group });
        info!(%group, "group selected");

        let outcome = self.reported(self.roster.reload(group).await)?;
        if matches!(outcome, ReloadOutcome::Applied { .. } | ReloadOutcome::StagingOnly) {
            self.view_state().reset_page();
        }
        Ok(outcome)
    }

    // ── roster ─────────────────────────────────────────────────────────

    pub async fn add_to_roster(&self, email: &str) -> Result<Client> {
        let client = self.reported(self.roster.add(email).await)?;
        self.notices.success(format!("{email} added to {}", self.active_group()));
        Ok(client)
    }

    pub async fn remove_from_roster(&self, email: &str, confirm: &dyn Confirm) -> Result<RemoveOutcome> {
        let outcome = self.reported(self.roster.remove(email, confirm).await)?;
        match outcome {
            RemoveOutcome::Removed    => self.notices.success(format!("{email} removed")),
            RemoveOutcome::NotPresent => self.notices.warn(format!("{email} is not in the roster")),
            RemoveOutcome::Cancelled  => {}
        }
        Ok(outcome)
    }

    // ── staging ────────────────────────────────────────────────────────

    pub async fn add_to_staging(&self, email: &str, mirror: &dyn Confirm) -> Result<StagingAdd> {
        let added = self.reported(self.staging.add(email, mirror).await)?;
        self.notices.success(format!("{email} staged"));
        match &added.mirror {
            MirrorOutcome::Skipped       => {}
            MirrorOutcome::Saved         => self.notices.success(format!("{email} saved to the database")),
            MirrorOutcome::AlreadyStored => self.notices.info(format!("{email} already exists in the database")),
            MirrorOutcome::Failed(why)   => self.notices.warn(format!("could not save {email}: {why}")),
        }
        Ok(added)
    }

    pub fn remove_from_staging(&self, email: &str) -> bool {
        let removed = self.staging.remove(email);
        if removed {
            self.notices.info(format!("{email} removed from staging"));
        }
        removed
    }

    // ── drag & drop ────────────────────────────────────────────────────

    pub fn begin_drag(&self, email: &str) -> Result<String> {
        self.reported(self.transfer.begin_drag(email))
    }

    pub fn cancel_drag(&self) { self.transfer.cancel() }

    pub fn drag_state(&self) -> DragState { self.transfer.state() }

    pub fn drop_on_staging(&self, payload: &str) -> Result<TransferReport> {
        let report = self.reported(self.transfer.drop_on_staging(payload))?;
        if report.staged {
            self.notices.success(format!("{} moved to staging", report.email));
        } else {
            self.notices.warn(format!("{} was already staged", report.email));
        }
        Ok(report)
    }

    // ── view ───────────────────────────────────────────────────────────

    pub fn view_settings(&self) -> ViewState { self.view_state().clone() }

    pub fn set_search(&self, search: &str) { self.view_state().set_search(search) }

    pub fn set_filter(&self, filter: StatusFilter) { self.view_state().set_filter(filter) }

    /// Current page; the stored page number is pulled back into range.
    pub fn view(&self) -> AudiencePage {
        let roster  = self.roster.clients();
        let staging = self.staging.current();
        let mut st  = self.view_state();
        let page    = view::project(&roster, &staging, &st);
        st.page = page.page;
        page
    }

    pub fn next_page(&self) -> AudiencePage {
        let total = self.view().total_pages;
        self.view_state().next_page(total);
        self.view()
    }

    pub fn prev_page(&self) -> AudiencePage {
        self.view_state().prev_page();
        self.view()
    }

    // ── audience ───────────────────────────────────────────────────────

    pub fn effective_audience(&self) -> Vec<Client> {
        selector::effective_audience(
            self.active_group(),
            &self.roster.clients(),
            &self.staging.current(),
        )
    }

    pub fn recipients(&self) -> Result<Vec<String>> {
        self.reported(selector::recipients(&self.effective_audience()))
    }

    // ── history / ranking ──────────────────────────────────────────────

    pub async fn toggle_history(&self, email: &str) -> Result<HistoryToggle> {
        self.reported(self.history.toggle(email).await)
    }

    pub fn expanded_card(&self) -> Option<String> { self.history.expanded() }

    pub async fn ranking(&self) -> Result<ContactRanking> {
        self.reported(contact_ranking(self.backend.as_ref()).await)
    }

    /// Stats panel for the active group; `None` in staging-only mode.
    pub async fn stats(&self) -> Result<Option<StatsPanel>> {
        self.reported(stats::group_stats(self.backend.as_ref(), self.active_group()).await)
    }

    /// A click on a stats card narrows the roster view.
    pub fn select_stats_card(&self, card: StatsCard) -> AudiencePage {
        self.set_filter(card.filter());
        self.view()
    }
}
