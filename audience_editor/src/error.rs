//! src/error.rs
use serde::Serialize;
use thiserror::Error;

use crate::backend::BackendError;

/// Which of the two collections an outcome refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Roster,
    Staging,
}

impl std::fmt::Display for ListKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListKind::Roster  => f.write_str("roster"),
            ListKind::Staging => f.write_str("staging list"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// Every failure the editor reports. None of them end the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudienceError {
    #[error("`{0}` is not a valid email address")]
    Validation(String),

    #[error("{email} is already in the {list}")]
    Duplicate { email: String, list: ListKind },

    #[error("backend sync failed: {0}")]
    Sync(String),

    #[error("could not read dragged client: {0}")]
    Transfer(String),

    #[error("no roster group is selected")]
    NoGroup,

    #[error("no recipients in the current audience")]
    NoRecipients,
}

impl AudienceError {
    pub fn duplicate(email: impl Into<String>, list: ListKind) -> Self {
        Self::Duplicate { email: email.into(), list }
    }

    pub fn severity(&self) -> Severity {
        match self {
            AudienceError::Duplicate { .. } | AudienceError::NoGroup => Severity::Warn,
            _                               => Severity::Error,
        }
    }
}

impl From<BackendError> for AudienceError {
    fn from(e: BackendError) -> Self { AudienceError::Sync(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, AudienceError>;
