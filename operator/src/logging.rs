//! Tracing setup. Hook output is captured by the hosting framework's debug
//! log, so everything goes to stderr and stdout stays free for summaries.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "PARCA_OPERATOR_LOG";

/// Install the global subscriber. Later calls are no-ops.
pub fn init(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
