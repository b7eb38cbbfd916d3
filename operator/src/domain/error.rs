//! Typed domain error enums.
//!
//! Contract violations are caller mistakes and propagate out of the
//! controller. The failure structs describe external operations that went
//! wrong; the controller turns them into a blocked status.

use thiserror::Error;

use crate::domain::state::InstallStage;

// ── Contract violations ───────────────────────────────────────────────────────

/// Malformed input from the caller or the hosting framework.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContractViolation {
    #[error(
        "unexpected 'parca --version' output (need at least {needed} tokens, got {found}): {output:?}"
    )]
    MalformedVersion {
        output: String,
        needed: usize,
        found: usize,
    },

    #[error(
        "configuration sets both 'storage-persist' and 'enable-persistence'; keep only 'enable-persistence'"
    )]
    MixedStorageSchema,

    #[error("'storage-persist' is not supported; rename it to 'enable-persistence'")]
    LegacyStorageKey,

    #[error("memory-storage-limit must be greater than zero")]
    ZeroMemoryLimit,

    #[error("memory-storage-limit of {mib} MiB does not fit in a byte count")]
    MemoryLimitOverflow { mib: u64 },

    #[error("unknown hook '{0}'")]
    UnknownHook(String),

    #[error("hook '{0}' needs a relation snapshot (--relation-file)")]
    MissingRelation(String),
}

// ── External failures ─────────────────────────────────────────────────────────

/// An install stage failed; later stages were not attempted.
#[derive(Debug, Error)]
#[error("install stage '{stage}' failed: {message}")]
pub struct InstallFailure {
    pub stage: InstallStage,
    pub message: String,
}

/// Rendering or writing the daemon configuration failed.
#[derive(Debug, Error)]
#[error("failed to write parca configuration: {message}")]
pub struct ConfigWriteFailure {
    pub message: String,
}

/// A process supervisor or hook tool operation failed.
#[derive(Debug, Error)]
#[error("failed to {action}: {message}")]
pub struct ServiceFailure {
    pub action: String,
    pub message: String,
}

impl ServiceFailure {
    pub fn new(action: impl Into<String>, err: &anyhow::Error) -> Self {
        Self {
            action: action.into(),
            message: format!("{err:#}"),
        }
    }
}

impl ConfigWriteFailure {
    pub fn new(err: &anyhow::Error) -> Self {
        Self {
            message: format!("{err:#}"),
        }
    }
}
