//! src/selector.rs
use crate::{
    error::{AudienceError, Result},
    model::{Client, Group},
};

/// Recipient set handed to the sender: staging in `none` mode, roster otherwise.
pub fn effective_audience(group: Group, roster: &[Client], staging: &[Client]) -> Vec<Client> {
    if group.is_staging_only() {
        staging.to_vec()
    } else {
        roster.to_vec()
    }
}

/// Emails for the sender. An empty audience is refused so the transport is
/// never called with nobody to send to.
pub fn recipients(audience: &[Client]) -> Result<Vec<String>> {
    if audience.is_empty() {
        return Err(AudienceError::NoRecipients);
    }
    Ok(audience.iter().map(|c| c.email.clone()).collect())
}
