//! Infrastructure implementation of the `StateStore` port.
//!
//! `JsonStateStore` provides async load/save using `tokio::task::spawn_blocking`
//! with atomic write (temp file + rename) so an interrupted hook never leaves
//! a truncated state file behind.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::StateStore;
use crate::domain::UnitState;

pub const STATE_PATH_ENV: &str = "PARCA_OPERATOR_STATE";
pub const DEFAULT_STATE_PATH: &str = "/var/lib/parca-operator/state.json";

/// Unit state persisted as pretty-printed JSON.
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    /// Store at `$PARCA_OPERATOR_STATE`, or the default path.
    #[must_use]
    pub fn from_env() -> Self {
        let path = std::env::var_os(STATE_PATH_ENV)
            .map_or_else(|| PathBuf::from(DEFAULT_STATE_PATH), PathBuf::from);
        Self::with_path(path)
    }

    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_sync(path: &Path) -> Result<Option<UnitState>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading state file {}", path.display()))?;
        let state = serde_json::from_str(&content)
            .with_context(|| format!("parsing state file {}", path.display()))?;
        Ok(Some(state))
    }

    fn save_sync(path: &Path, state: &UnitState) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(state).context("serializing state")?;

        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, &content)
            .with_context(|| format!("writing temp file {}", temp_path.display()))?;

        // Relation data may carry bearer tokens and S3 keys.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("setting permissions on {}", temp_path.display()))?;
        }

        std::fs::rename(&temp_path, path)
            .with_context(|| format!("finalizing state file {}", path.display()))?;
        Ok(())
    }
}

impl StateStore for JsonStateStore {
    async fn load(&self) -> Result<Option<UnitState>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || Self::load_sync(&path))
            .await
            .context("state load task panicked")?
    }

    async fn save(&self, state: &UnitState) -> Result<()> {
        let path = self.path.clone();
        let state = state.clone();
        tokio::task::spawn_blocking(move || Self::save_sync(&path, &state))
            .await
            .context("state save task panicked")?
    }
}
