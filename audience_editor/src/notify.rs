//! src/notify.rs
use std::{collections::VecDeque, sync::Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{AudienceError, Severity};

const CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Info,
    Warn,
    Error,
}

impl From<Severity> for Level {
    fn from(s: Severity) -> Self {
        match s {
            Severity::Info  => Level::Info,
            Severity::Warn  => Level::Warn,
            Severity::Error => Level::Error,
        }
    }
}

/// One operator-facing message.
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub level:   Level,
    pub message: String,
    pub at:      DateTime<Utc>,
}

/// Bounded queue of notices; the oldest is dropped once full.
#[derive(Default)]
pub struct Notifier {
    queue: Mutex<VecDeque<Notice>>,
}

impl Notifier {
    pub fn new() -> Self { Self::default() }

    pub fn push(&self, level: Level, message: impl Into<String>) {
        let message = message.into();
        match level {
            Level::Success | Level::Info => info!(notice = %message),
            Level::Warn                  => warn!(notice = %message),
            Level::Error                 => error!(notice = %message),
        }

        let mut q = self.queue.lock().unwrap_or_else(|p| p.into_inner());
        if q.len() == CAPACITY {
            q.pop_front();
        }
        q.push_back(Notice { level, message, at: Utc::now() });
    }

    pub fn success(&self, message: impl Into<String>) { self.push(Level::Success, message) }
    pub fn info(&self, message: impl Into<String>)    { self.push(Level::Info, message) }
    pub fn warn(&self, message: impl Into<String>)    { self.push(Level::Warn, message) }

    pub fn report(&self, err: &AudienceError) {
        self.push(err.severity().into(), err.to_string());
    }

    /// Takes every pending notice, oldest first.
    pub fn drain(&self) -> Vec<Notice> {
        self.queue
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .drain(..)
            .collect()
    }
}

// ── confirmation prompts ───────────────────────────────────────────────

/// An explicit, cancelable yes/no step put to the operator.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// A decision the operator already made, e.g. a `confirm=true` query flag.
impl Confirm for bool {
    fn confirm(&self, _prompt: &str) -> bool { *self }
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &str) -> bool { self(prompt) }
}
