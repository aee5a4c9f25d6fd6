//! src/model.rs
use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{self, AudienceError};

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static email pattern"));

/// Checks the `local@domain.tld` shape. No network involved.
pub fn validate_email(email: &str) -> error::Result<()> {
    if EMAIL.is_match(email) {
        Ok(())
    } else {
        Err(AudienceError::Validation(email.to_string()))
    }
}

// ── Client ─────────────────────────────────────────────────────────────

/// One recipient. Identity is the email string exactly as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub email: String,

    #[serde(rename = "lastSent", default)]
    pub last_sent: Option<DateTime<Utc>>,

    #[serde(rename = "vecesContactado", default, skip_serializing_if = "Option::is_none")]
    pub times_contacted: Option<u32>,

    #[serde(rename = "inactivo", default, skip_serializing_if = "Option::is_none")]
    pub inactive: Option<bool>,
}

impl Client {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email:           email.into(),
            last_sent:       None,
            times_contacted: None,
            inactive:        None,
        }
    }

    pub fn contacted(&self) -> bool { self.last_sent.is_some() }
}

/// Roster entries as the backend returns them: either a bare email or a record.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawClient {
    Bare(String),
    Record(Client),
}

impl From<RawClient> for Client {
    fn from(raw: RawClient) -> Self {
        match raw {
            RawClient::Bare(email) => Client::new(email),
            RawClient::Record(c)   => c,
        }
    }
}

// ── Group ──────────────────────────────────────────────────────────────

/// Audience segment. `None` selects staging-only mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Group {
    #[serde(rename = "nuevos", alias = "new")]
    New,
    #[serde(rename = "viejos", alias = "returning")]
    Returning,
    #[serde(rename = "compras_recientes", alias = "recent-purchase")]
    RecentPurchase,
    #[serde(rename = "ninguno", alias = "none")]
    None,
}

impl Group {
    /// Every group that is backed by a persisted roster.
    pub const BACKED: [Group; 3] = [Group::New, Group::Returning, Group::RecentPurchase];

    /// Key used by the backend in its paths.
    pub fn as_str(self) -> &'static str {
        match self {
            Group::New            => "nuevos",
            Group::Returning      => "viejos",
            Group::RecentPurchase => "compras_recientes",
            Group::None           => "ninguno",
        }
    }

    pub fn is_staging_only(self) -> bool { self == Group::None }
}

impl Default for Group { fn default() -> Self { Group::New } }

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown group `{0}`")]
pub struct UnknownGroup(pub String);

impl FromStr for Group {
    type Err = UnknownGroup;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "nuevos" | "new"                          => Ok(Group::New),
            "viejos" | "returning"                    => Ok(Group::Returning),
            "compras_recientes" | "recent-purchase"   => Ok(Group::RecentPurchase),
            "ninguno" | "none"                        => Ok(Group::None),
            other                                     => Err(UnknownGroup(other.to_string())),
        }
    }
}

// ── history / filters ──────────────────────────────────────────────────

/// A single prior send to one email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactHistoryEntry {
    #[serde(rename(serialize = "date", deserialize = "fecha"), alias = "date")]
    pub date: DateTime<Utc>,
}

/// Per-group counters as the backend's stats endpoint reports them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GroupStats {
    #[serde(rename = "totalClientes", alias = "total", default)]
    pub total: u32,

    #[serde(rename = "sinContacto", alias = "uncontacted", default)]
    pub uncontacted: u32,

    /// Emails sent to the group overall.
    #[serde(rename = "enviados", alias = "sent", default)]
    pub sent: u32,

    /// Last send per email; `null` when the client was never mailed.
    #[serde(rename = "últimosEnvios", alias = "lastSends", default)]
    pub last_sends: BTreeMap<String, Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    None,
    #[serde(alias = "contactados")]
    Contacted,
    #[serde(alias = "sinContacto")]
    Uncontacted,
}

impl StatusFilter {
    pub fn keeps(self, client: &Client) -> bool {
        match self {
            StatusFilter::None        => true,
            StatusFilter::Contacted   => client.contacted(),
            StatusFilter::Uncontacted => !client.contacted(),
        }
    }
}

// ── recency label ──────────────────────────────────────────────────────

/// How long ago a client was last mailed, in whole days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "days", rename_all = "snake_case")]
pub enum ContactRecency {
    Never,
    Today,
    DaysAgo(i64),
}

impl ContactRecency {
    pub fn of(last_sent: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        match last_sent {
            None => ContactRecency::Never,
            Some(ts) => match now.signed_duration_since(ts).num_days() {
                d if d <= 0 => ContactRecency::Today,
                d           => ContactRecency::DaysAgo(d),
            },
        }
    }
}

impl fmt::Display for ContactRecency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactRecency::Never      => f.write_str("never contacted"),
            ContactRecency::Today      => f.write_str("today"),
            ContactRecency::DaysAgo(1) => f.write_str("1 day ago"),
            ContactRecency::DaysAgo(d) => write!(f, "{d} days ago"),
        }
    }
}
