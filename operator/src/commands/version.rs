//! `version` command.

use anyhow::Result;
use serde::Serialize;

use crate::app::AppContext;
use crate::output::json;

#[derive(Serialize)]
struct VersionOutput {
    name: &'static str,
    version: &'static str,
}

const VERSION: VersionOutput = VersionOutput {
    name: env!("CARGO_PKG_NAME"),
    version: env!("CARGO_PKG_VERSION"),
};

/// Print the operator version.
///
/// # Errors
///
/// Returns an error if JSON output cannot be serialized.
pub fn run(app: &AppContext) -> Result<()> {
    if app.is_json() {
        return json::print(&VERSION);
    }
    println!("{} {}", VERSION.name, VERSION.version);
    Ok(())
}
