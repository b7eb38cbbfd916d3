//! `status` command: show the persisted unit state.

use anyhow::Result;

use crate::app::AppContext;
use crate::application::ports::StateStore;
use crate::output::json;

/// Run the status command.
///
/// # Errors
///
/// Returns an error if the state file exists but cannot be read.
pub async fn run(app: &AppContext) -> Result<()> {
    let state = app.state_store.load().await?;

    if app.is_json() {
        return json::print(&state.unwrap_or_default());
    }

    let out = &app.output;
    let Some(state) = state else {
        out.warn("no unit state recorded yet");
        return Ok(());
    };

    out.header("parca");
    out.kv("phase  ", &state.phase.to_string());
    out.status(&state.status);
    if let Some(version) = &state.workload_version {
        out.kv("version", version);
    }
    if let Some(digest) = &state.config_digest {
        out.kv("config ", &digest[..12.min(digest.len())]);
    }
    if let Some(at) = state.last_event_at {
        out.kv("updated", &at.to_rfc3339());
    }
    for relation in &state.inputs.relations {
        out.kv("related", &format!("{} ({}:{})", relation.app, relation.name, relation.id));
    }
    Ok(())
}
