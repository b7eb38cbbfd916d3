//! Application layer: port trait definitions and use-case orchestration.
//!
//! This module depends only on `crate::domain` and the relation contracts,
//! never on `crate::infra`, `crate::commands`, or `crate::output`.

pub mod ports;
pub mod services;

pub use ports::{
    BinaryInstaller, CommandRunner, ConfigStore, Host, HostFs, HostInfo, PackageManager,
    RelationDataSink, ServiceSupervisor, StateStore, StatusSink, UserAccounts,
};
