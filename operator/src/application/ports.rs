//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and the relation contracts,
//! never from `crate::infra`, `crate::commands`, or `crate::output`.

use std::path::Path;
use std::process::Output;

use anyhow::Result;
use parca_relations::{Databag, ScrapeMetadata};

use crate::domain::{BinarySource, OperatorConfig, UnitState, UnitStatus};

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: std::time::Duration,
    ) -> Result<Output>;
}

// ── Host Port Traits ──────────────────────────────────────────────────────────

/// System package installation.
#[allow(async_fn_in_trait)]
pub trait PackageManager {
    /// Install packages, refreshing the package index first.
    async fn install_packages(&self, packages: &[String]) -> Result<()>;
}

/// Places the daemon executable on the host.
#[allow(async_fn_in_trait)]
pub trait BinaryInstaller {
    /// Copy or download the binary described by `source` to `dest`, mode 0755.
    async fn place_binary(&self, source: &BinarySource, dest: &Path) -> Result<()>;
}

/// Process supervision for named services.
#[allow(async_fn_in_trait)]
pub trait ServiceSupervisor {
    /// Re-read unit files after they change.
    async fn daemon_reload(&self) -> Result<()>;
    /// Enable and start a service.
    async fn resume(&self, service: &str) -> Result<()>;
    /// Restart a service.
    async fn restart(&self, service: &str) -> Result<()>;
    /// Stop and disable a service.
    async fn stop(&self, service: &str) -> Result<()>;
    /// Whether the service is currently active.
    async fn is_running(&self, service: &str) -> Result<bool>;
}

/// System user management.
#[allow(async_fn_in_trait)]
pub trait UserAccounts {
    /// Create a system user with `home` as its home directory. Idempotent.
    async fn create_system_user(&self, name: &str, home: &Path) -> Result<()>;
    /// Delete a user. Deleting a missing user succeeds.
    async fn remove_user(&self, name: &str) -> Result<()>;
    /// Hand ownership of `path` (recursively) to `user`.
    async fn chown(&self, path: &Path, user: &str) -> Result<()>;
}

/// Filesystem writes the controller performs directly. Sync trait.
pub trait HostFs {
    fn exists(&self, path: &Path) -> bool;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    /// Replace the file at `path` with `contents`.
    fn write(&self, path: &Path, contents: &str) -> Result<()>;
    /// Remove a file; a missing file is not an error.
    fn remove_file(&self, path: &Path) -> Result<()>;
    /// Remove a directory if it is empty; a missing or non-empty directory
    /// is left as it is.
    fn remove_empty_dir(&self, path: &Path) -> Result<()>;
}

/// Facts about the host and the installed daemon.
#[allow(async_fn_in_trait)]
pub trait HostInfo {
    /// Running kernel release, as `uname -r` prints it.
    async fn kernel_release(&self) -> Result<String>;
    /// Fully qualified host name.
    async fn fqdn(&self) -> Result<String>;
    /// Raw output of `<bin> --version`.
    async fn daemon_version_output(&self, bin: &Path) -> Result<String>;
}

// ── Hosting Framework Ports ───────────────────────────────────────────────────

/// Workload status and version published to the hosting framework.
#[allow(async_fn_in_trait)]
pub trait StatusSink {
    async fn set_status(&self, status: &UnitStatus) -> Result<()>;
    async fn set_workload_version(&self, version: &str) -> Result<()>;
    /// Open `port`/`protocol` on the unit's firewall.
    async fn open_port(&self, port: u16, protocol: &str) -> Result<()>;
}

/// Local side of relation databags.
#[allow(async_fn_in_trait)]
pub trait RelationDataSink {
    /// Write application data on a relation. Only the leader may do this.
    async fn set_app_data(&self, relation_id: u32, data: &Databag) -> Result<()>;
    /// Write this unit's data on a relation.
    async fn set_unit_data(&self, relation_id: u32, data: &Databag) -> Result<()>;
    async fn is_leader(&self) -> Result<bool>;
    /// Address bound to `endpoint`, if the framework knows one.
    async fn bind_address(&self, endpoint: &str) -> Result<Option<String>>;
    /// Unit name (`parca/0`).
    fn unit_name(&self) -> String;
    /// Model and application this unit belongs to.
    fn topology(&self) -> ScrapeMetadata;
}

/// Composite trait: everything the lifecycle controller touches.
pub trait Host:
    PackageManager
    + BinaryInstaller
    + ServiceSupervisor
    + UserAccounts
    + HostFs
    + HostInfo
    + StatusSink
    + RelationDataSink
{
}

/// Blanket implementation: any type implementing all sub-traits is a `Host`.
impl<T> Host for T where
    T: PackageManager
        + BinaryInstaller
        + ServiceSupervisor
        + UserAccounts
        + HostFs
        + HostInfo
        + StatusSink
        + RelationDataSink
{
}

// ── State and Config Ports ────────────────────────────────────────────────────

/// Unit state persistence between hook invocations.
#[allow(async_fn_in_trait)]
pub trait StateStore {
    /// Load the persisted state, returning `None` if none exists yet.
    async fn load(&self) -> Result<Option<UnitState>>;
    /// Persist the given state.
    async fn save(&self, state: &UnitState) -> Result<()>;
}

/// Loads operator settings.
pub trait ConfigStore {
    /// Load settings, returning defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    fn load(&self) -> Result<OperatorConfig>;
}
