//! Domain types for the Tideway state store.
//!
//! The App aggregate and the records it owns. All types are serializable
//! to/from JSON for storage in redb tables.

use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::info;

// ── App ───────────────────────────────────────────────────────────

/// Persisted record of one deployed application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct App {
    pub name: String,
    /// Runtime template used at provisioning time. Immutable after creation.
    pub framework: String,
    pub state: AppState,
    /// Unique by `instance_id`; the first entry is the primary unit.
    pub units: Vec<Unit>,
    /// Team names with access. Treated as a set.
    pub teams: Vec<String>,
    pub env: HashMap<String, EnvVar>,
    /// Append-only.
    pub logs: Vec<LogEntry>,
    /// Optimistic-concurrency counter, bumped by every successful update.
    #[serde(default)]
    pub version: u64,
}

/// Coarse lifecycle label.
///
/// Only `Pending` is owned by the control plane. Anything else is written by
/// the provisioning backend and carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum AppState {
    #[default]
    Pending,
    Other(String),
}

/// A timestamped message in an app's log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    /// Unix timestamp (seconds).
    pub date: u64,
    pub message: String,
}

impl App {
    pub fn new(name: &str, framework: &str) -> Self {
        Self {
            name: name.to_string(),
            framework: framework.to_string(),
            ..Self::default()
        }
    }

    /// The unit remote commands and teardown target.
    pub fn primary_unit(&self) -> Option<&Unit> {
        self.units.first()
    }

    /// Append a message to the in-memory log. The caller persists.
    pub fn append_log(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(app = %self.name, "{message}");
        self.logs.push(LogEntry {
            date: epoch_secs(),
            message,
        });
    }

    pub fn has_team(&self, team: &str) -> bool {
        self.teams.iter().any(|t| t == team)
    }
}

impl From<String> for AppState {
    fn from(value: String) -> Self {
        if value == AppState::PENDING {
            AppState::Pending
        } else {
            AppState::Other(value)
        }
    }
}

impl From<AppState> for String {
    fn from(state: AppState) -> Self {
        match state {
            AppState::Pending => AppState::PENDING.to_string(),
            AppState::Other(s) => s,
        }
    }
}

impl AppState {
    pub const PENDING: &'static str = "PENDING";

    pub fn as_str(&self) -> &str {
        match self {
            AppState::Pending => Self::PENDING,
            AppState::Other(s) => s,
        }
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Unit ──────────────────────────────────────────────────────────

/// One compute instance backing an App. Identity is `instance_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Unit {
    pub instance_id: String,
    pub ip: String,
    pub agent_state: String,
    pub instance_state: String,
    /// Underlying machine resource, the target of teardown.
    pub machine: u32,
}

// ── Env ───────────────────────────────────────────────────────────

/// An environment variable exposed to an App.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
    /// Whether the value may be displayed in plaintext.
    pub public: bool,
    /// Set when the value was injected by a bound service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
}

impl fmt::Display for EnvVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.public {
            write!(f, "{}={}", self.name, self.value)
        } else {
            write!(f, "{}=***  (private variable)", self.name)
        }
    }
}

// ── Teams ─────────────────────────────────────────────────────────

/// A platform user, identified by e-mail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct User {
    pub email: String,
}

/// A named group of users that can be granted access to apps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Team {
    pub name: String,
    /// Member e-mails.
    pub users: Vec<String>,
}

impl User {
    pub fn new(email: &str) -> Self {
        Self {
            email: email.to_string(),
        }
    }
}

impl Team {
    pub fn new(name: &str, users: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            users: users.iter().map(|u| u.to_string()).collect(),
        }
    }

    pub fn contains_user(&self, user: &User) -> bool {
        self.users.iter().any(|u| *u == user.email)
    }
}

/// Seconds since the unix epoch.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
