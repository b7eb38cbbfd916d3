//! `hook` command: handle one lifecycle event and persist the result.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use parca_relations::Relation;

use crate::app::AppContext;
use crate::application::ports::{ConfigStore, StateStore};
use crate::application::services::dispatch::handle_hook;
use crate::domain::{Hook, UnitState};
use crate::output::json;

#[derive(Args)]
pub struct HookArgs {
    /// Hook name, e.g. `install` or `profiling-endpoint-relation-changed`
    #[arg(env = "JUJU_HOOK_NAME")]
    pub name: String,

    /// JSON snapshot of the relation the hook fired for
    #[arg(long)]
    pub relation_file: Option<PathBuf>,
}

/// Run the hook command.
///
/// A blocked unit is a normal outcome and returns `Ok`.
///
/// # Errors
///
/// Returns an error if the hook name or relation snapshot is invalid, the
/// settings are rejected, or state cannot be loaded or saved.
pub async fn run(app: &AppContext, args: HookArgs) -> Result<()> {
    let hook: Hook = args.name.parse()?;
    let relation = args
        .relation_file
        .as_deref()
        .map(read_relation)
        .transpose()?;

    let settings = app.config_store.load()?;
    let state = app.state_store.load().await?.unwrap_or_default();
    let host = app.host()?;

    let state = handle_hook(&host, &settings, state, hook, relation).await?;
    app.state_store.save(&state).await?;

    if app.is_json() {
        return json::print(&state);
    }
    print_summary(app, hook, &state);
    Ok(())
}

/// Read a relation snapshot written by the hook wrapper.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a relation.
pub fn read_relation(path: &Path) -> Result<Relation> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read relation file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("cannot parse relation file {}", path.display()))
}

fn print_summary(app: &AppContext, hook: Hook, state: &UnitState) {
    let out = &app.output;
    out.header(&hook.to_string());
    out.kv("phase", &state.phase.to_string());
    out.status(&state.status);
}
