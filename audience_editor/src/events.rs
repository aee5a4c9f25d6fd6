//! src/events.rs
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::model::Group;

/// State changes other parts of the editor can react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AudienceEvent {
    GroupChanged { group: Group },
    RosterReloaded { group: Group, len: usize },
    RosterChanged { len: usize },
    StagingChanged { len: usize },
    TransferCompleted { email: String },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AudienceEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: AudienceEvent) {
        // no subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AudienceEvent> { self.tx.subscribe() }
}

impl Default for EventBus {
    fn default() -> Self { Self::new(64) }
}

/// Traces every event until the bus closes.
pub async fn log_events(mut rx: broadcast::Receiver<AudienceEvent>) {
    loop {
        match rx.recv().await {
            Ok(event)                => debug!(?event, "audience event"),
            Err(RecvError::Lagged(n)) => warn!(skipped = n, "event log lagging"),
            Err(RecvError::Closed)   => break,
        }
    }
}
