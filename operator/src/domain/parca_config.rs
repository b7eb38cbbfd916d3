//! Parca configuration document and command line.
//!
//! Everything here is recomputed from scratch on every configure cycle, so
//! each function is a pure mapping from settings to output.

use std::path::Path;

use parca_relations::{METRICS_PATH_KEY, S3Credentials, ScrapeJob, StoreConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::domain::config::{ApplicationConfig, Paths, StorageMode};
use crate::domain::error::ContractViolation;

pub const BYTES_PER_MIB: u64 = 1_048_576;

/// Address the `juju-introspect` sidecar listens on.
pub const INTROSPECT_ADDRESS: &str = "127.0.0.1:6000";

// ── Config document ──────────────────────────────────────────────────────────

/// The document written to `parca.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedConfig {
    pub object_storage: ObjectStorage,
    pub scrape_configs: Vec<ScrapeJob>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStorage {
    pub bucket: Bucket,
}

/// Object storage bucket, serialised as `{type: ..., config: {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Bucket {
    Filesystem {
        directory: String,
    },
    S3 {
        bucket: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        region: Option<String>,
        access_key: String,
        secret_key: String,
        insecure: bool,
    },
}

impl Bucket {
    #[must_use]
    pub fn filesystem(profile_path: &Path) -> Self {
        Self::Filesystem {
            directory: profile_path.display().to_string(),
        }
    }
}

impl From<&S3Credentials> for Bucket {
    fn from(creds: &S3Credentials) -> Self {
        Self::S3 {
            bucket: creds.bucket.clone(),
            endpoint: creds.endpoint.clone(),
            region: creds.region.clone(),
            access_key: creds.access_key.clone(),
            secret_key: creds.secret_key.clone(),
            insecure: creds.insecure,
        }
    }
}

impl RenderedConfig {
    /// Serialise to YAML. Identical configs yield identical bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if a scrape job holds a value YAML cannot represent.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Build the config document with filesystem storage under `profile_path`.
///
/// `metrics_path` is dropped from every job; job order is preserved.
#[must_use]
pub fn render_config(profile_path: &Path, scrape_jobs: Vec<ScrapeJob>) -> RenderedConfig {
    render_config_with_storage(Bucket::filesystem(profile_path), scrape_jobs)
}

#[must_use]
pub fn render_config_with_storage(bucket: Bucket, scrape_jobs: Vec<ScrapeJob>) -> RenderedConfig {
    let scrape_configs = scrape_jobs
        .into_iter()
        .map(|mut job| {
            job.shift_remove(METRICS_PATH_KEY);
            job
        })
        .collect();
    RenderedConfig {
        object_storage: ObjectStorage { bucket },
        scrape_configs,
    }
}

/// Scrape job for the local `juju-introspect` sidecar.
#[must_use]
pub fn introspect_scrape_job(interval_secs: u64) -> ScrapeJob {
    let mut job = ScrapeJob::new();
    job.insert("job_name".into(), json!("juju-introspect"));
    job.insert("scrape_interval".into(), json!(format!("{interval_secs}s")));
    job.insert(
        "static_configs".into(),
        json!([{ "targets": [INTROSPECT_ADDRESS] }]),
    );
    job.insert("profiling_config".into(), introspect_profiling_config());
    job
}

fn introspect_profiling_config() -> Value {
    json!({
        "pprof_config": {
            "memory": { "enabled": true, "path": "/debug/pprof/heap" },
            "block": { "enabled": false },
            "goroutine": { "enabled": true, "path": "/debug/pprof/goroutine" },
            "mutex": { "enabled": false },
            "process_cpu": { "enabled": true, "delta": true, "path": "/debug/pprof/profile" },
        }
    })
}

// ── Command line ─────────────────────────────────────────────────────────────

/// Build the daemon command line.
///
/// Store flags are emitted only for present, non-empty fields; when any is
/// emitted the daemon runs in scraper-only mode.
///
/// # Errors
///
/// Returns [`ContractViolation::MemoryLimitOverflow`] if the memory limit in
/// bytes does not fit in a `u64`.
pub fn render_command_line(
    app_config: &ApplicationConfig,
    paths: &Paths,
    store_config: Option<&StoreConfig>,
) -> Result<String, ContractViolation> {
    let mut cmd = vec![
        paths.bin.display().to_string(),
        format!("--config-path={}", paths.config.display()),
    ];

    match app_config.storage {
        StorageMode::Persistent => {
            cmd.push("--storage-in-memory=false".into());
            cmd.push("--storage-persist".into());
            cmd.push(format!("--storage-path={}", paths.profiles.display()));
        }
        StorageMode::InMemory { limit_mib } => {
            let bytes = limit_mib
                .checked_mul(BYTES_PER_MIB)
                .ok_or(ContractViolation::MemoryLimitOverflow { mib: limit_mib })?;
            cmd.push("--storage-in-memory=true".into());
            cmd.push(format!("--storage-active-memory={bytes}"));
        }
    }

    if let Some(store) = store_config {
        let flags = [
            ("--store-address", &store.address),
            ("--bearer-token", &store.bearer_token),
            ("--insecure", &store.insecure),
        ];
        let before = cmd.len();
        for (flag, value) in flags {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                cmd.push(format!("{flag}={v}"));
            }
        }
        if cmd.len() > before {
            cmd.push("--mode=scraper-only".into());
        }
    }

    Ok(cmd.join(" "))
}

// ── Version ──────────────────────────────────────────────────────────────────

/// Extract the version from `parca --version` output.
///
/// Output looks like `parca, version 0.12.0 (commit: <sha>)`. Development
/// builds carry `-next` in the version and get `+<short sha>` appended.
///
/// # Errors
///
/// Returns [`ContractViolation::MalformedVersion`] if the output has fewer
/// tokens than the version (or, for `-next` builds, the commit) needs.
pub fn parse_daemon_version(output: &str) -> Result<String, ContractViolation> {
    let tokens: Vec<&str> = output.trim_end().split(' ').collect();
    let malformed = |needed| ContractViolation::MalformedVersion {
        output: output.to_string(),
        needed,
        found: tokens.len(),
    };

    let version = *tokens.get(2).ok_or_else(|| malformed(3))?;
    if !version.contains("-next") {
        return Ok(version.to_string());
    }
    let commit = tokens.get(4).ok_or_else(|| malformed(5))?;
    let short: String = commit.chars().take(6).collect();
    Ok(format!("{version}+{short}"))
}

// ── Digest ───────────────────────────────────────────────────────────────────

/// SHA-256 over the written config document and unit file, hex-encoded.
#[must_use]
pub fn config_digest(config_yaml: &str, unit_file: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(config_yaml.as_bytes());
    hasher.update([0u8]);
    hasher.update(unit_file.as_bytes());
    hex_encode(&hasher.finalize())
}

/// Lowercase hex encoding of a digest.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(char::from(HEX[usize::from(b >> 4)]));
        out.push(char::from(HEX[usize::from(b & 0xf)]));
    }
    out
}

// ── Unit tests ───────────────────────────────────────────────────────────────
