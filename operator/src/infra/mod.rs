//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, hook
//! tools, package and service management, binary placement, filesystem
//! access and state persistence.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod binary;
pub mod command_runner;
pub mod config;
pub mod fs;
pub mod hook_tools;
pub mod host;
pub mod state;
