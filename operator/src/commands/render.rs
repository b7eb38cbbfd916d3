//! `render` command: print what the next configure cycle would write.

use anyhow::Result;
use serde::Serialize;

use crate::app::AppContext;
use crate::application::ports::{ConfigStore, StateStore};
use crate::application::services::lifecycle::render_artifacts;
use crate::domain::RenderedConfig;
use crate::output::json;

#[derive(Serialize)]
struct RenderOutput<'a> {
    config: &'a RenderedConfig,
    command_line: &'a str,
}

/// Run the render command against the persisted relation inputs.
///
/// # Errors
///
/// Returns an error if settings or state cannot be loaded, or the settings
/// are rejected.
pub async fn run(app: &AppContext) -> Result<()> {
    let settings = app.config_store.load()?;
    let inputs = app
        .state_store
        .load()
        .await?
        .map(|state| state.inputs)
        .unwrap_or_default();
    let artifacts = render_artifacts(&settings, &inputs)?;

    if app.is_json() {
        return json::print(&RenderOutput {
            config: &artifacts.config,
            command_line: &artifacts.command_line,
        });
    }
    print!("{}", artifacts.config.to_yaml()?);
    println!("---");
    println!("# {}", artifacts.command_line);
    Ok(())
}
