//! Hook names and the domain events they translate into.

use std::fmt;
use std::str::FromStr;

use parca_relations::{S3Credentials, StoreConfig};

use crate::domain::error::ContractViolation;

// ── Endpoints ────────────────────────────────────────────────────────────────

/// Relation endpoints declared by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    ExternalStore,
    StoreProvider,
    Profiling,
    SelfProfiling,
    Metrics,
    S3,
    GrafanaDashboard,
}

impl Endpoint {
    pub const ALL: [Self; 7] = [
        Self::ExternalStore,
        Self::StoreProvider,
        Self::Profiling,
        Self::SelfProfiling,
        Self::Metrics,
        Self::S3,
        Self::GrafanaDashboard,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ExternalStore => "external-parca-store-endpoint",
            Self::StoreProvider => parca_relations::store::DEFAULT_RELATION_NAME,
            Self::Profiling => parca_relations::scrape::PROFILING_RELATION_NAME,
            Self::SelfProfiling => parca_relations::scrape::SELF_PROFILING_RELATION_NAME,
            Self::Metrics => parca_relations::scrape::METRICS_RELATION_NAME,
            Self::S3 => parca_relations::s3::DEFAULT_RELATION_NAME,
            Self::GrafanaDashboard => parca_relations::grafana::DEFAULT_RELATION_NAME,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationHookKind {
    Joined,
    Changed,
    Departed,
    Broken,
}

impl RelationHookKind {
    pub const ALL: [Self; 4] = [Self::Joined, Self::Changed, Self::Departed, Self::Broken];

    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Joined => "relation-joined",
            Self::Changed => "relation-changed",
            Self::Departed => "relation-departed",
            Self::Broken => "relation-broken",
        }
    }
}

// ── Hooks ────────────────────────────────────────────────────────────────────

/// A lifecycle event delivered by the hosting framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Install,
    Start,
    Stop,
    Remove,
    ConfigChanged,
    UpgradeCharm,
    UpdateStatus,
    Relation {
        endpoint: Endpoint,
        kind: RelationHookKind,
    },
}

/// Hooks that are not tied to a relation endpoint.
const LIFECYCLE_HOOKS: &[(&str, Hook)] = &[
    ("install", Hook::Install),
    ("start", Hook::Start),
    ("stop", Hook::Stop),
    ("remove", Hook::Remove),
    ("config-changed", Hook::ConfigChanged),
    ("upgrade-charm", Hook::UpgradeCharm),
    ("update-status", Hook::UpdateStatus),
];

impl Hook {
    /// Every hook the operator handles.
    #[must_use]
    pub fn all() -> Vec<Self> {
        let relation_hooks = Endpoint::ALL.into_iter().flat_map(|endpoint| {
            RelationHookKind::ALL
                .into_iter()
                .map(move |kind| Self::Relation { endpoint, kind })
        });
        LIFECYCLE_HOOKS
            .iter()
            .map(|(_, hook)| *hook)
            .chain(relation_hooks)
            .collect()
    }

    #[must_use]
    pub fn is_relation(self) -> bool {
        matches!(self, Self::Relation { .. })
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relation { endpoint, kind } => write!(f, "{}-{}", endpoint.name(), kind.suffix()),
            other => {
                let name = LIFECYCLE_HOOKS
                    .iter()
                    .find(|(_, hook)| hook == other)
                    .map_or("unknown", |(name, _)| name);
                f.write_str(name)
            }
        }
    }
}

impl FromStr for Hook {
    type Err = ContractViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((_, hook)) = LIFECYCLE_HOOKS.iter().find(|(name, _)| *name == s) {
            return Ok(*hook);
        }
        for endpoint in Endpoint::ALL {
            let Some(rest) = s
                .strip_prefix(endpoint.name())
                .and_then(|r| r.strip_prefix('-'))
            else {
                continue;
            };
            if let Some(kind) = RelationHookKind::ALL.into_iter().find(|k| k.suffix() == rest) {
                return Ok(Self::Relation { endpoint, kind });
            }
        }
        Err(ContractViolation::UnknownHook(s.to_string()))
    }
}

// ── Domain events ────────────────────────────────────────────────────────────

/// What the lifecycle controller acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Install,
    Start,
    Stop,
    Remove,
    ConfigChanged,
    Upgrade,
    UpdateStatus,
    StoreEndpointsChanged {
        relation_id: u32,
        store_config: StoreConfig,
    },
    RemoveStore {
        relation_id: u32,
    },
    ProfilingTargetsChanged,
    S3CredentialsChanged(S3Credentials),
    S3CredentialsGone,
    /// Publish provider data on one relation, or on all when `None`.
    PublishProviderData {
        relation_id: Option<u32>,
    },
}

impl Event {
    /// Identifier used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Remove => "remove",
            Self::ConfigChanged => "config-changed",
            Self::Upgrade => "upgrade",
            Self::UpdateStatus => "update-status",
            Self::StoreEndpointsChanged { .. } => "store-endpoints-changed",
            Self::RemoveStore { .. } => "remove-store",
            Self::ProfilingTargetsChanged => "profiling-targets-changed",
            Self::S3CredentialsChanged(_) => "s3-credentials-changed",
            Self::S3CredentialsGone => "s3-credentials-gone",
            Self::PublishProviderData { .. } => "publish-provider-data",
        }
    }
}
