//! Operator settings and the typed application config derived from them.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::error::ContractViolation;

// ── Constants ────────────────────────────────────────────────────────────────

pub const DEFAULT_BIN_PATH: &str = "/usr/bin/parca";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/parca/parca.yaml";
pub const DEFAULT_PROFILE_PATH: &str = "/var/lib/parca";
pub const DEFAULT_UNIT_DIR: &str = "/etc/systemd/system";

pub const DEFAULT_MEMORY_LIMIT_MIB: u64 = 4096;
pub const DEFAULT_SCRAPE_INTERVAL_SECS: u64 = 5;

/// Port the daemon serves its API and UI on.
pub const PARCA_PORT: u16 = 7070;

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level document stored in `/etc/parca-operator/config.yaml`.
///
/// The application keys sit at the top level, mirroring the hosting
/// framework's option names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OperatorConfig {
    #[serde(rename = "enable-persistence", skip_serializing_if = "Option::is_none")]
    pub enable_persistence: Option<bool>,

    /// Recognised only so it can be rejected.
    #[serde(rename = "storage-persist", skip_serializing_if = "Option::is_none")]
    pub storage_persist: Option<bool>,

    #[serde(rename = "memory-storage-limit")]
    pub memory_storage_limit: u64,

    #[serde(rename = "juju-scrape-interval")]
    pub scrape_interval: u64,

    pub paths: Paths,

    #[serde(with = "serde_yaml::with::singleton_map")]
    pub binary: BinarySource,

    #[serde(rename = "store-endpoint")]
    pub store_endpoint: StoreEndpointSettings,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            enable_persistence: None,
            storage_persist: None,
            memory_storage_limit: DEFAULT_MEMORY_LIMIT_MIB,
            scrape_interval: DEFAULT_SCRAPE_INTERVAL_SECS,
            paths: Paths::default(),
            binary: BinarySource::default(),
            store_endpoint: StoreEndpointSettings::default(),
        }
    }
}

/// Filesystem locations the operator writes to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Paths {
    pub bin: PathBuf,
    pub config: PathBuf,
    pub profiles: PathBuf,
    pub units: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            bin: PathBuf::from(DEFAULT_BIN_PATH),
            config: PathBuf::from(DEFAULT_CONFIG_PATH),
            profiles: PathBuf::from(DEFAULT_PROFILE_PATH),
            units: PathBuf::from(DEFAULT_UNIT_DIR),
        }
    }
}

impl Paths {
    /// Directory holding the daemon config file.
    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.config
            .parent()
            .map_or_else(|| PathBuf::from("/etc/parca"), PathBuf::from)
    }

    /// The config directory, if `remove` may delete it.
    ///
    /// A top-level directory, or one that contains or sits inside the
    /// profile directory, is shared with something else and is left alone.
    #[must_use]
    pub fn removable_config_dir(&self) -> Option<PathBuf> {
        let dir = self.config.parent()?;
        if dir.components().count() < 3 {
            return None;
        }
        if self.profiles.starts_with(dir) || dir.starts_with(&self.profiles) {
            return None;
        }
        Some(dir.to_path_buf())
    }

    #[must_use]
    pub fn unit_file(&self, service: &str) -> PathBuf {
        self.units.join(format!("{service}.service"))
    }
}

/// Where the daemon binary comes from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BinarySource {
    /// A file already on the host, e.g. an attached resource.
    Resource(PathBuf),
    /// A release tarball containing a `parca` executable.
    Release { url: String, sha256: String },
}

impl Default for BinarySource {
    fn default() -> Self {
        Self::Resource(PathBuf::from("parca"))
    }
}

/// How the store endpoint is advertised to related applications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreEndpointSettings {
    pub insecure: bool,
    #[serde(rename = "external-url", skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
}

impl Default for StoreEndpointSettings {
    fn default() -> Self {
        Self {
            insecure: true,
            external_url: None,
        }
    }
}

// ── Typed application config ─────────────────────────────────────────────────

/// How the daemon stores profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    InMemory { limit_mib: u64 },
    Persistent,
}

/// Validated snapshot of the user-facing settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplicationConfig {
    pub storage: StorageMode,
    pub scrape_interval_secs: u64,
}

impl ApplicationConfig {
    #[must_use]
    pub fn in_memory(limit_mib: u64) -> Self {
        Self {
            storage: StorageMode::InMemory { limit_mib },
            scrape_interval_secs: DEFAULT_SCRAPE_INTERVAL_SECS,
        }
    }

    #[must_use]
    pub fn persistent() -> Self {
        Self {
            storage: StorageMode::Persistent,
            scrape_interval_secs: DEFAULT_SCRAPE_INTERVAL_SECS,
        }
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self::in_memory(DEFAULT_MEMORY_LIMIT_MIB)
    }
}

impl OperatorConfig {
    /// Validate the raw document into an [`ApplicationConfig`].
    ///
    /// # Errors
    ///
    /// Returns a [`ContractViolation`] if the legacy `storage-persist` key is
    /// present, or if the memory limit is zero while persistence is off.
    pub fn application_config(&self) -> Result<ApplicationConfig, ContractViolation> {
        match (self.storage_persist, self.enable_persistence) {
            (Some(_), Some(_)) => return Err(ContractViolation::MixedStorageSchema),
            (Some(_), None) => return Err(ContractViolation::LegacyStorageKey),
            _ => {}
        }

        let storage = if self.enable_persistence.unwrap_or(false) {
            StorageMode::Persistent
        } else {
            if self.memory_storage_limit == 0 {
                return Err(ContractViolation::ZeroMemoryLimit);
            }
            StorageMode::InMemory {
                limit_mib: self.memory_storage_limit,
            }
        };

        Ok(ApplicationConfig {
            storage,
            scrape_interval_secs: self.scrape_interval,
        })
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
