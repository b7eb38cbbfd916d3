//! Command implementations

pub mod hook;
pub mod render;
pub mod status;
pub mod version;
