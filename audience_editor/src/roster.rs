//! src/roster.rs
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::{
    backend::{Backend, BackendError},
    error::{AudienceError, ListKind, Result},
    events::{AudienceEvent, EventBus},
    model::{validate_email, Client, Group},
    notify::Confirm,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReloadOutcome {
    /// The response was applied; the list now holds `len` clients.
    Applied { len: usize },
    /// `none` was selected: no fetch, the held list is emptied.
    StagingOnly,
    /// A newer reload was issued while this one was in flight.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveOutcome {
    Removed,
    Cancelled,
    NotPresent,
}

/// What `current()` hands out.
#[derive(Debug, Clone, Serialize)]
pub struct RosterSnapshot {
    pub group:   Group,
    /// Group the held list was fetched for, if any fetch has landed.
    pub loaded:  Option<Group>,
    pub clients: Vec<Client>,
}

#[derive(Default)]
struct RosterState {
    loaded:  Option<Group>,
    clients: Vec<Client>,
    /// Token of the latest reload issued.
    issued:  u64,
}

impl RosterState {
    fn contains(&self, email: &str) -> bool { self.clients.iter().any(|c| c.email == email) }
}

/// Persisted, group-scoped roster. Never holds its lock across a backend call.
pub struct RosterStore {
    backend: Arc<dyn Backend>,
    active:  watch::Receiver<Group>,
    events:  EventBus,
    state:   Mutex<RosterState>,
}

impl RosterStore {
    pub fn new(backend: Arc<dyn Backend>, active: watch::Receiver<Group>, events: EventBus) -> Self {
        Self { backend, active, events, state: Mutex::new(RosterState::default()) }
    }

    fn lock(&self) -> MutexGuard<'_, RosterState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    // ── reload ─────────────────────────────────────────────────────────

    /// Replaces the list with the backend's roster for `group`.
    ///
    /// Each call takes a fresh token; a response is applied only if its token
    /// is still the latest, so slow responses for an older group are dropped.
    /// On failure the previous list stays in place. Selecting `none` empties
    /// the list without a fetch, so nothing of the old group stays actionable.
    pub async fn reload(&self, group: Group) -> Result<ReloadOutcome> {
        let token = {
            let mut st = self.lock();
            st.issued += 1;
            if group.is_staging_only() {
                st.clients.clear();
                st.loaded = None;
            }
            st.issued
        };

        if group.is_staging_only() {
            debug!(token, "staging-only group, roster cleared without fetch");
            self.events.publish(AudienceEvent::RosterChanged { len: 0 });
            return Ok(ReloadOutcome::StagingOnly);
        }

        let fetched = self.backend.list_clients(group).await;

        let len = {
            let mut st = self.lock();
            if st.issued != token {
                debug!(%group, token, latest = st.issued, "discarding stale roster response");
                return Ok(ReloadOutcome::Superseded);
            }
            let raw = fetched.map_err(AudienceError::from)?;

            let mut clients: Vec<Client> = Vec::with_capacity(raw.len());
            for c in raw.into_iter().map(Client::from) {
                if !clients.iter().any(|k| k.email == c.email) {
                    clients.push(c);
                }
            }
            st.clients = clients;
            st.loaded  = Some(group);
            st.clients.len()
        };

        info!(%group, len, "roster reloaded");
        self.events.publish(AudienceEvent::RosterReloaded { group, len });
        Ok(ReloadOutcome::Applied { len })
    }

    // ── add / remove ───────────────────────────────────────────────────

    /// Creates `email` in the active group and appends the stored record.
    ///
    /// Nothing is appended until the backend accepts it. Uniqueness is checked
    /// again against the list as it stands when the response lands.
    pub async fn add(&self, email: &str) -> Result<Client> {
        validate_email(email)?;

        let group = *self.active.borrow();
        if group.is_staging_only() {
            return Err(AudienceError::NoGroup);
        }
        let known = self.lock().contains(email);
        if known {
            return Err(AudienceError::duplicate(email, ListKind::Roster));
        }

        let created = match self.backend.create_client(group, email).await {
            Ok(c)                       => c,
            Err(BackendError::Conflict) => return Err(AudienceError::duplicate(email, ListKind::Roster)),
            Err(e)                      => return Err(e.into()),
        };
        let client = Client { email: email.to_string(), last_sent: None, ..created };

        let len = {
            let mut st = self.lock();
            if st.loaded != Some(group) {
                // the operator switched groups meanwhile; the next reload shows it
                debug!(%group, email, "roster switched during add, not appending");
                return Ok(client);
            }
            if st.contains(email) {
                return Err(AudienceError::duplicate(email, ListKind::Roster));
            }
            st.clients.push(client.clone());
            st.clients.len()
        };

        self.events.publish(AudienceEvent::RosterChanged { len });
        Ok(client)
    }

    /// Deletes `email` from the backend after the operator confirms.
    ///
    /// The local entry goes only once the backend delete succeeded.
    pub async fn remove(&self, email: &str, confirm: &dyn Confirm) -> Result<RemoveOutcome> {
        let group = {
            let st = self.lock();
            match st.loaded {
                Some(g) if st.contains(email) => g,
                _                             => return Ok(RemoveOutcome::NotPresent),
            }
        };

        if !confirm.confirm(&format!("Remove {email} from {group}?")) {
            return Ok(RemoveOutcome::Cancelled);
        }

        self.backend.delete_client(group, email).await?;

        let len = {
            let mut st = self.lock();
            if st.loaded == Some(group) {
                st.clients.retain(|c| c.email != email);
            }
            st.clients.len()
        };

        self.events.publish(AudienceEvent::RosterChanged { len });
        Ok(RemoveOutcome::Removed)
    }

    /// Drops `email` from the local list only. Used when a client is moved
    /// to the staging list; the backend record is kept.
    pub(crate) fn remove_local_only(&self, email: &str) -> bool {
        let (removed, len) = {
            let mut st = self.lock();
            let before = st.clients.len();
            st.clients.retain(|c| c.email != email);
            (st.clients.len() != before, st.clients.len())
        };
        if removed {
            self.events.publish(AudienceEvent::RosterChanged { len });
        }
        removed
    }

    // ── reads ──────────────────────────────────────────────────────────

    pub fn current(&self) -> RosterSnapshot {
        let st = self.lock();
        RosterSnapshot {
            group:   *self.active.borrow(),
            loaded:  st.loaded,
            clients: st.clients.clone(),
        }
    }

    pub fn clients(&self) -> Vec<Client> { self.lock().clients.clone() }

    pub fn find(&self, email: &str) -> Option<Client> {
        self.lock().clients.iter().find(|c| c.email == email).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend::InMemoryBackend, model::RawClient};
    use chrono::{TimeZone, Utc};

    fn store(group: Group) -> (Arc<InMemoryBackend>, watch::Sender<Group>, RosterStore) {
        let backend = Arc::new(InMemoryBackend::new());
        let (tx, rx) = watch::channel(group);
        let roster = RosterStore::new(backend.clone(), rx, EventBus::default());
        (backend, tx, roster)
    }

    fn emails(r: &RosterStore) -> Vec<String> {
        r.clients().into_iter().map(|c| c.email).collect()
    }

    #[tokio::test]
    async fn reload_normalizes_bare_emails() {
        let (backend, _tx, roster) = store(Group::New);
        let sent = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        backend.seed(Group::New, vec![
            RawClient::Bare("a@x.com".into()),
            RawClient::Record(Client { last_sent: Some(sent), ..Client::new("b@x.com") }),
        ]);

        let out = roster.reload(Group::New).await.unwrap();

        assert_eq!(out, ReloadOutcome::Applied { len: 2 });
        assert_eq!(roster.find("a@x.com").unwrap().last_sent, None);
        assert_eq!(roster.find("b@x.com").unwrap().last_sent, Some(sent));
    }

    #[tokio::test]
    async fn staging_only_reload_empties_list_and_skips_backend() {
        let (backend, _tx, roster) = store(Group::New);
        backend.seed(Group::New, vec![RawClient::Bare("a@x.com".into())]);
        roster.reload(Group::New).await.unwrap();

        backend.set_offline(true);
        let out = roster.reload(Group::None).await.unwrap();

        assert_eq!(out, ReloadOutcome::StagingOnly);
        assert!(roster.clients().is_empty());
        assert_eq!(roster.current().loaded, None);
    }

    #[tokio::test]
    async fn remove_after_switch_to_none_leaves_backend_alone() {
        let (backend, tx, roster) = store(Group::New);
        backend.seed(Group::New, vec![RawClient::Bare("a@x.com".into())]);
        roster.reload(Group::New).await.unwrap();

        tx.send(Group::None).unwrap();
        roster.reload(Group::None).await.unwrap();

        assert_eq!(roster.remove("a@x.com", &true).await.unwrap(), RemoveOutcome::NotPresent);
        assert_eq!(backend.emails(Group::New), vec!["a@x.com"]);
    }

    #[tokio::test]
    async fn failed_reload_leaves_prior_list() {
        let (backend, _tx, roster) = store(Group::New);
        backend.seed(Group::New, vec![RawClient::Bare("a@x.com".into())]);
        roster.reload(Group::New).await.unwrap();

        backend.set_offline(true);
        let err = roster.reload(Group::Returning).await.unwrap_err();

        assert!(matches!(err, AudienceError::Sync(_)));
        assert_eq!(emails(&roster), vec!["a@x.com"]);
        assert_eq!(roster.current().loaded, Some(Group::New));
    }

    #[tokio::test]
    async fn group_switch_replaces_instead_of_merging() {
        let (backend, _tx, roster) = store(Group::New);
        backend.seed(Group::New, vec![RawClient::Bare("a@x.com".into())]);
        backend.seed(Group::Returning, vec![RawClient::Bare("r@x.com".into())]);

        roster.reload(Group::New).await.unwrap();
        roster.reload(Group::Returning).await.unwrap();
        assert_eq!(emails(&roster), vec!["r@x.com"]);

        roster.reload(Group::New).await.unwrap();
        assert_eq!(emails(&roster), vec!["a@x.com"]);
    }

    #[tokio::test]
    async fn add_validates_before_any_call() {
        let (backend, _tx, roster) = store(Group::New);
        roster.reload(Group::New).await.unwrap();

        let err = roster.add("not-an-email").await.unwrap_err();

        assert_eq!(err, AudienceError::Validation("not-an-email".into()));
        assert!(roster.clients().is_empty());
        assert!(backend.emails(Group::New).is_empty());
    }

    #[tokio::test]
    async fn add_appends_server_record_with_no_last_sent() {
        let (backend, _tx, roster) = store(Group::New);
        roster.reload(Group::New).await.unwrap();

        let c = roster.add("n@x.com").await.unwrap();

        assert_eq!(c.last_sent, None);
        assert_eq!(emails(&roster), vec!["n@x.com"]);
        assert_eq!(backend.emails(Group::New), vec!["n@x.com"]);
    }

    #[tokio::test]
    async fn add_rejects_local_and_server_duplicates() {
        let (backend, _tx, roster) = store(Group::New);
        backend.seed(Group::New, vec![RawClient::Bare("a@x.com".into())]);
        roster.reload(Group::New).await.unwrap();

        let local = roster.add("a@x.com").await.unwrap_err();
        assert_eq!(local, AudienceError::duplicate("a@x.com", ListKind::Roster));

        // present server-side but not in the held list
        backend.seed(Group::New, vec![
            RawClient::Bare("a@x.com".into()),
            RawClient::Bare("s@x.com".into()),
        ]);
        let remote = roster.add("s@x.com").await.unwrap_err();
        assert_eq!(remote.severity(), crate::error::Severity::Warn);
        assert_eq!(emails(&roster), vec!["a@x.com"]);
    }

    #[tokio::test]
    async fn add_needs_a_backed_group() {
        let (_backend, tx, roster) = store(Group::New);
        tx.send(Group::None).unwrap();

        assert_eq!(roster.add("a@x.com").await.unwrap_err(), AudienceError::NoGroup);
    }

    #[tokio::test]
    async fn remove_respects_confirmation() {
        let (backend, _tx, roster) = store(Group::New);
        backend.seed(Group::New, vec![RawClient::Bare("a@x.com".into())]);
        roster.reload(Group::New).await.unwrap();

        assert_eq!(roster.remove("a@x.com", &false).await.unwrap(), RemoveOutcome::Cancelled);
        assert_eq!(emails(&roster), vec!["a@x.com"]);

        let asked = |prompt: &str| prompt.contains("a@x.com");
        assert_eq!(roster.remove("a@x.com", &asked).await.unwrap(), RemoveOutcome::Removed);
        assert!(roster.clients().is_empty());
        assert!(backend.emails(Group::New).is_empty());
    }

    #[tokio::test]
    async fn failed_remove_keeps_entry() {
        let (backend, _tx, roster) = store(Group::New);
        backend.seed(Group::New, vec![RawClient::Bare("a@x.com".into())]);
        roster.reload(Group::New).await.unwrap();
        backend.set_offline(true);

        let err = roster.remove("a@x.com", &true).await.unwrap_err();

        assert!(matches!(err, AudienceError::Sync(_)));
        assert_eq!(emails(&roster), vec!["a@x.com"]);
    }

    #[tokio::test]
    async fn local_removal_keeps_backend_record() {
        let (backend, _tx, roster) = store(Group::New);
        backend.seed(Group::New, vec![RawClient::Bare("a@x.com".into())]);
        roster.reload(Group::New).await.unwrap();

        assert!(roster.remove_local_only("a@x.com"));
        assert!(!roster.remove_local_only("a@x.com"));
        assert!(roster.clients().is_empty());
        assert_eq!(backend.emails(Group::New), vec!["a@x.com"]);
    }
}
