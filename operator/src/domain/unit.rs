//! systemd unit files for the daemon and its sidecar.

use std::fmt::Write as _;

pub const PARCA_SERVICE: &str = "parca";
pub const INTROSPECT_SERVICE: &str = "juju-introspect";

/// System user the daemon runs as.
pub const PARCA_USER: &str = "parca";

const INTROSPECT_BIN: &str = "/usr/bin/juju-introspect";

/// What goes into a `[Unit]`/`[Service]`/`[Install]` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSpec {
    pub description: String,
    pub exec_start: String,
    pub user: Option<String>,
    pub after: Vec<String>,
    pub restart: &'static str,
}

impl UnitSpec {
    /// Daemon unit running `command_line` as the `parca` user.
    #[must_use]
    pub fn parca(command_line: &str) -> Self {
        Self {
            description: "Parca Continuous Profiling".into(),
            exec_start: command_line.to_string(),
            user: Some(PARCA_USER.into()),
            after: vec!["network-online.target".into()],
            restart: "always",
        }
    }

    /// Sidecar exposing the machine agent's profiles on the loopback.
    #[must_use]
    pub fn introspect(listen: &str) -> Self {
        Self {
            description: "Juju introspection endpoint".into(),
            exec_start: format!("{INTROSPECT_BIN} --listen={listen}"),
            user: None,
            after: vec!["network.target".into()],
            restart: "on-failure",
        }
    }
}

/// Render a unit file. Output is stable for a given spec.
#[must_use]
pub fn render_unit(spec: &UnitSpec) -> String {
    let mut out = String::from("[Unit]\n");
    let _ = writeln!(out, "Description={}", spec.description);
    for target in &spec.after {
        let _ = writeln!(out, "After={target}");
        let _ = writeln!(out, "Wants={target}");
    }

    out.push_str("\n[Service]\n");
    let _ = writeln!(out, "ExecStart={}", spec.exec_start);
    if let Some(user) = &spec.user {
        let _ = writeln!(out, "User={user}");
        let _ = writeln!(out, "Group={user}");
    }
    let _ = writeln!(out, "Restart={}", spec.restart);
    out.push_str("RestartSec=5\n");

    out.push_str("\n[Install]\nWantedBy=multi-user.target\n");
    out
}
