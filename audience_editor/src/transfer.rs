//! src/transfer.rs
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    error::{AudienceError, Result},
    events::{AudienceEvent, EventBus},
    model::{validate_email, Client},
    roster::RosterStore,
    staging::StagingStore,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DragState {
    Idle,
    /// A roster card is being dragged; `payload` is its serialized record.
    DragActive { payload: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub email: String,
    /// False when the email was already staged.
    pub staged: bool,
    /// False when the roster no longer held the email.
    pub removed_from_roster: bool,
}

/// The only path that touches both collections in one step.
pub struct TransferCoordinator {
    roster:  Arc<RosterStore>,
    staging: Arc<StagingStore>,
    events:  EventBus,
    state:   Mutex<DragState>,
}

impl TransferCoordinator {
    pub fn new(roster: Arc<RosterStore>, staging: Arc<StagingStore>, events: EventBus) -> Self {
        Self { roster, staging, events, state: Mutex::new(DragState::Idle) }
    }

    fn lock(&self) -> MutexGuard<'_, DragState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn state(&self) -> DragState { self.lock().clone() }

    /// Picks up a roster card and returns the text payload carried by the drag.
    pub fn begin_drag(&self, email: &str) -> Result<String> {
        let client = self
            .roster
            .find(email)
            .ok_or_else(|| AudienceError::Transfer(format!("{email} is not in the roster")))?;
        let payload = serde_json::to_string(&client)
            .map_err(|e| AudienceError::Transfer(e.to_string()))?;

        *self.lock() = DragState::DragActive { payload: payload.clone() };
        debug!(email, "drag started");
        Ok(payload)
    }

    pub fn cancel(&self) {
        *self.lock() = DragState::Idle;
        debug!("drag cancelled");
    }

    /// Completes a drop over the staging area.
    ///
    /// Only valid while a drag is active; the drag ends either way. Stages the
    /// client, then drops it from the roster list. The roster removal happens
    /// even when the client was already staged, so the move always takes it
    /// out of the roster.
    pub fn drop_on_staging(&self, payload: &str) -> Result<TransferReport> {
        let previous = std::mem::replace(&mut *self.lock(), DragState::Idle);
        let carried = match previous {
            DragState::DragActive { payload } => payload,
            DragState::Idle => return Err(AudienceError::Transfer("no drag in progress".into())),
        };
        if carried != payload {
            debug!("drop payload differs from the one handed out at drag start");
        }

        let client = parse_payload(payload)?;
        let email  = client.email.clone();

        let staged = match self.staging.receive_transfer(client) {
            Ok(()) => true,
            Err(AudienceError::Duplicate { .. }) => {
                warn!(email = %email, "dropped client was already staged");
                false
            }
            Err(e) => return Err(e),
        };
        let removed_from_roster = self.roster.remove_local_only(&email);

        info!(email = %email, staged, removed_from_roster, "client moved to staging");
        self.events.publish(AudienceEvent::TransferCompleted { email: email.clone() });

        Ok(TransferReport { email, staged, removed_from_roster })
    }
}

fn parse_payload(payload: &str) -> Result<Client> {
    if payload.trim().is_empty() {
        return Err(AudienceError::Transfer("empty payload".into()));
    }
    let client: Client =
        serde_json::from_str(payload).map_err(|e| AudienceError::Transfer(e.to_string()))?;
    if client.email.trim().is_empty() {
        return Err(AudienceError::Transfer("payload has no email".into()));
    }
    validate_email(&client.email)
        .map_err(|_| AudienceError::Transfer(format!("payload email is malformed: {}", client.email)))?;
    Ok(client)
}
