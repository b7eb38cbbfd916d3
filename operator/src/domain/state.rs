//! Lifecycle phase, unit status and the state persisted between hooks.

use std::fmt;

use chrono::{DateTime, Utc};
use parca_relations::{Relation, S3Credentials, StoreConfig};
use serde::{Deserialize, Serialize};

// ── Phase ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    #[default]
    Uninstalled,
    Installing,
    Installed,
    Running,
    Reconfiguring,
    Stopping,
    Removed,
}

impl Phase {
    /// Phases only observed while a transition is in flight.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Installing | Self::Reconfiguring | Self::Stopping)
    }

    /// Whether the daemon binary and files are on the host.
    #[must_use]
    pub fn is_installed(self) -> bool {
        matches!(self, Self::Installed | Self::Running)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninstalled => "uninstalled",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Running => "running",
            Self::Reconfiguring => "reconfiguring",
            Self::Stopping => "stopping",
            Self::Removed => "removed",
        };
        f.write_str(s)
    }
}

// ── Install stages ───────────────────────────────────────────────────────────

/// Install stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStage {
    Dependencies,
    Binary,
    User,
    Config,
    Port,
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Dependencies => "dependencies",
            Self::Binary => "binary",
            Self::User => "user",
            Self::Config => "config",
            Self::Port => "port",
        };
        f.write_str(s)
    }
}

// ── Status ───────────────────────────────────────────────────────────────────

/// Workload status reported to the hosting framework.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "lowercase")]
pub enum UnitStatus {
    #[default]
    Unknown,
    Maintenance(String),
    Active,
    Blocked(String),
}

impl UnitStatus {
    pub fn maintenance(message: impl Into<String>) -> Self {
        Self::Maintenance(message.into())
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self::Blocked(reason.into())
    }

    /// Name accepted by `status-set`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Maintenance(_) => "maintenance",
            Self::Active => "active",
            Self::Blocked(_) => "blocked",
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Maintenance(m) | Self::Blocked(m) => m,
            Self::Unknown | Self::Active => "",
        }
    }

    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            "" => f.write_str(self.name()),
            msg => write!(f, "{}: {msg}", self.name()),
        }
    }
}

// ── Inputs ───────────────────────────────────────────────────────────────────

/// Everything received from related applications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Inputs {
    /// Latest snapshot of every relation seen, by id.
    pub relations: Vec<Relation>,
    pub store: Option<StoreConfig>,
    pub s3: Option<S3Credentials>,
}

impl Inputs {
    /// Insert or replace the snapshot with the same relation id.
    pub fn upsert_relation(&mut self, relation: Relation) {
        match self.relations.iter_mut().find(|r| r.id == relation.id) {
            Some(existing) => *existing = relation,
            None => {
                self.relations.push(relation);
                self.relations.sort_by_key(|r| r.id);
            }
        }
    }

    pub fn remove_relation(&mut self, relation_id: u32) {
        self.relations.retain(|r| r.id != relation_id);
    }

    pub fn relations_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Relation> {
        self.relations.iter().filter(move |r| r.name == name)
    }
}

// ── Unit state ───────────────────────────────────────────────────────────────

/// State persisted between hook invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitState {
    pub phase: Phase,
    pub status: UnitStatus,
    #[serde(default)]
    pub inputs: Inputs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_at: Option<DateTime<Utc>>,
}

impl UnitState {
    /// Roll back to `phase` and block with `reason`.
    #[must_use]
    pub fn blocked(mut self, phase: Phase, reason: impl Into<String>) -> Self {
        self.phase = phase;
        self.status = UnitStatus::blocked(reason);
        self
    }
}
