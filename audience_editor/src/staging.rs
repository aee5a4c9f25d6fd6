//! src/staging.rs
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{
    backend::{Backend, BackendError},
    error::{AudienceError, ListKind, Result},
    events::{AudienceEvent, EventBus},
    model::{validate_email, Client, Group},
    notify::Confirm,
};

/// What happened to the optional copy into the persisted roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mirror", content = "reason", rename_all = "snake_case")]
pub enum MirrorOutcome {
    /// Declined, or no backed group is active.
    Skipped,
    Saved,
    AlreadyStored,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct StagingAdd {
    pub client: Client,
    pub mirror: MirrorOutcome,
}

/// Session-local manual list. Never loaded from the backend.
pub struct StagingStore {
    backend: Arc<dyn Backend>,
    active:  watch::Receiver<Group>,
    events:  EventBus,
    clients: Mutex<Vec<Client>>,
}

impl StagingStore {
    pub fn new(backend: Arc<dyn Backend>, active: watch::Receiver<Group>, events: EventBus) -> Self {
        Self { backend, active, events, clients: Mutex::new(Vec::new()) }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Client>> {
        self.clients.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Inserts unless the email is already staged. Returns the new length.
    fn insert(&self, client: Client) -> Result<usize> {
        let len = {
            let mut list = self.lock();
            if list.iter().any(|c| c.email == client.email) {
                return Err(AudienceError::duplicate(client.email, ListKind::Staging));
            }
            list.push(client);
            list.len()
        };
        self.events.publish(AudienceEvent::StagingChanged { len });
        Ok(len)
    }

    /// Stages `email`, then optionally copies it into the active backed group.
    ///
    /// The local add stands whatever the copy does; mirror failures are
    /// reported in the returned outcome, never as an error.
    pub async fn add(&self, email: &str, mirror: &dyn Confirm) -> Result<StagingAdd> {
        validate_email(email)?;

        let client = Client::new(email);
        self.insert(client.clone())?;

        let group = *self.active.borrow();
        if group.is_staging_only() || !mirror.confirm(&format!("Also save {email} to {group}?")) {
            return Ok(StagingAdd { client, mirror: MirrorOutcome::Skipped });
        }

        let mirror = match self.backend.create_client(group, email).await {
            Ok(_)                       => MirrorOutcome::Saved,
            Err(BackendError::Conflict) => MirrorOutcome::AlreadyStored,
            Err(e) => {
                warn!(%group, email, error = %e, "mirroring staged client failed");
                MirrorOutcome::Failed(e.to_string())
            }
        };
        info!(%group, email, ?mirror, "staged client mirrored");

        Ok(StagingAdd { client, mirror })
    }

    pub fn remove(&self, email: &str) -> bool {
        let (removed, len) = {
            let mut list = self.lock();
            let before = list.len();
            list.retain(|c| c.email != email);
            (list.len() != before, list.len())
        };
        if removed {
            self.events.publish(AudienceEvent::StagingChanged { len });
        }
        removed
    }

    /// Idempotent insert of a client moved in from the roster. `lastSent`
    /// travels with the record.
    pub(crate) fn receive_transfer(&self, client: Client) -> Result<()> {
        self.insert(client).map(|_| ())
    }

    pub fn current(&self) -> Vec<Client> { self.lock().clone() }

    pub fn contains(&self, email: &str) -> bool { self.lock().iter().any(|c| c.email == email) }
}
