//! src/backend/memory.rs
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use hyper::StatusCode;

use super::{Backend, BackendError};
use crate::model::{Client, ContactHistoryEntry, Group, GroupStats, RawClient};

/// Process-local backend. Used by the test suites and for offline runs.
#[derive(Default)]
pub struct InMemoryBackend {
    rosters:       Mutex<HashMap<Group, Vec<RawClient>>>,
    history:       Mutex<HashMap<String, Vec<ContactHistoryEntry>>>,
    offline:       AtomicBool,
    history_calls: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self { Self::default() }

    pub fn seed(&self, group: Group, entries: Vec<RawClient>) {
        self.rosters.lock().unwrap_or_else(|p| p.into_inner()).insert(group, entries);
    }

    pub fn seed_history(&self, email: &str, entries: Vec<ContactHistoryEntry>) {
        self.history
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(email.to_string(), entries);
    }

    /// While offline every call fails with 503.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn history_calls(&self) -> usize { self.history_calls.load(Ordering::SeqCst) }

    pub fn emails(&self, group: Group) -> Vec<String> {
        self.rosters
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&group)
            .map(|entries| entries.iter().cloned().map(|r| Client::from(r).email).collect())
            .unwrap_or_default()
    }

    fn check_online(&self) -> Result<(), BackendError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(BackendError::Status(StatusCode::SERVICE_UNAVAILABLE));
        }
        Ok(())
    }
}

fn email_of(raw: &RawClient) -> &str {
    match raw {
        RawClient::Bare(email)  => email,
        RawClient::Record(c)    => &c.email,
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn list_clients(&self, group: Group) -> Result<Vec<RawClient>, BackendError> {
        self.check_online()?;
        let rosters = self.rosters.lock().unwrap_or_else(|p| p.into_inner());
        Ok(rosters.get(&group).cloned().unwrap_or_default())
    }

    async fn create_client(&self, group: Group, email: &str) -> Result<Client, BackendError> {
        self.check_online()?;
        let mut rosters = self.rosters.lock().unwrap_or_else(|p| p.into_inner());
        let entries = rosters.entry(group).or_default();
        if entries.iter().any(|r| email_of(r) == email) {
            return Err(BackendError::Conflict);
        }
        let created = Client { times_contacted: Some(0), ..Client::new(email) };
        entries.push(RawClient::Record(created.clone()));
        Ok(created)
    }

    async fn delete_client(&self, group: Group, email: &str) -> Result<(), BackendError> {
        self.check_online()?;
        let mut rosters = self.rosters.lock().unwrap_or_else(|p| p.into_inner());
        let entries = rosters.entry(group).or_default();
        let before = entries.len();
        entries.retain(|r| email_of(r) != email);
        if entries.len() == before {
            return Err(BackendError::Status(StatusCode::NOT_FOUND));
        }
        Ok(())
    }

    async fn fetch_history(&self, email: &str) -> Result<Vec<ContactHistoryEntry>, BackendError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        let history = self.history.lock().unwrap_or_else(|p| p.into_inner());
        Ok(history.get(email).cloned().unwrap_or_default())
    }

    /// Derived from the seeded roster: bare entries count as never mailed.
    async fn group_stats(&self, group: Group) -> Result<GroupStats, BackendError> {
        self.check_online()?;
        let rosters = self.rosters.lock().unwrap_or_else(|p| p.into_inner());
        let clients: Vec<Client> = rosters
            .get(&group)
            .map(|entries| entries.iter().cloned().map(Client::from).collect())
            .unwrap_or_default();

        Ok(GroupStats {
            total:       clients.len() as u32,
            uncontacted: clients.iter().filter(|c| !c.contacted()).count() as u32,
            sent:        clients.iter().filter_map(|c| c.times_contacted).sum(),
            last_sends:  clients.into_iter().map(|c| (c.email, c.last_sent)).collect(),
        })
    }
}
