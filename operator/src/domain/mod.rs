//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod dashboards;
pub mod error;
pub mod event;
pub mod parca_config;
pub mod state;
pub mod unit;

pub use config::{ApplicationConfig, BinarySource, OperatorConfig, Paths, StorageMode};
pub use error::{ConfigWriteFailure, ContractViolation, InstallFailure, ServiceFailure};
pub use event::{Endpoint, Event, Hook, RelationHookKind};
pub use parca_config::{
    Bucket, RenderedConfig, parse_daemon_version, render_command_line, render_config,
};
pub use state::{InstallStage, Inputs, Phase, UnitState, UnitStatus};
