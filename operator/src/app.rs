//! Application context: unified state passed to every command handler.

use anyhow::Result;

use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::YamlConfigStore;
use crate::infra::hook_tools::JujuContext;
use crate::infra::host::MachineHost;
use crate::infra::state::JsonStateStore;
use crate::output::OutputContext;

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    pub no_color: bool,
    pub quiet: bool,
    pub json: bool,
}

/// Constructed once in `Cli::run()` and passed as `&AppContext` to all
/// command handlers.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    pub mode: OutputMode,
    /// Operator settings (`$PARCA_OPERATOR_CONFIG`).
    pub config_store: YamlConfigStore,
    /// Persisted unit state (`$PARCA_OPERATOR_STATE`).
    pub state_store: JsonStateStore,
}

impl AppContext {
    #[must_use]
    pub fn new(flags: &OutputFlags) -> Self {
        let mode = if flags.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };
        Self {
            output: OutputContext::new(flags.no_color, flags.quiet),
            mode,
            config_store: YamlConfigStore::from_env(),
            state_store: JsonStateStore::from_env(),
        }
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// The machine this hook runs on.
    ///
    /// # Errors
    ///
    /// Returns an error when not running inside a hook environment.
    pub fn host(&self) -> Result<MachineHost<TokioCommandRunner>> {
        Ok(MachineHost::new(
            TokioCommandRunner::default(),
            JujuContext::from_env()?,
        ))
    }
}
