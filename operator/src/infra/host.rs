//! `MachineHost`: the production `Host`, routing every system action
//! through a `CommandRunner`.
//!
//! Package, service, user and host-info ports live here. Hook tools are in
//! `hook_tools.rs`, binary placement in `binary.rs`, file writes in `fs.rs`.

use std::path::Path;

use anyhow::{Context, Result};

use crate::application::ports::{
    CommandRunner, HostInfo, PackageManager, ServiceSupervisor, UserAccounts,
};
use crate::infra::command_runner::{PACKAGE_INSTALL_TIMEOUT, ensure_success, run_checked};
use crate::infra::hook_tools::JujuContext;

/// A machine unit, driven through host commands.
pub struct MachineHost<R: CommandRunner> {
    runner: R,
    pub(crate) juju: JujuContext,
}

impl<R: CommandRunner> MachineHost<R> {
    pub fn new(runner: R, juju: JujuContext) -> Self {
        Self { runner, juju }
    }

    pub(crate) fn runner(&self) -> &R {
        &self.runner
    }

    async fn stdout_of(&self, program: &str, args: &[&str]) -> Result<String> {
        let output = run_checked(&self.runner, program, args).await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn user_exists(&self, name: &str) -> Result<bool> {
        let output = self.runner.run("id", &["-u", name]).await?;
        Ok(output.status.success())
    }
}

impl<R: CommandRunner> PackageManager for MachineHost<R> {
    async fn install_packages(&self, packages: &[String]) -> Result<()> {
        let update = ["DEBIAN_FRONTEND=noninteractive", "apt-get", "update", "-q"];
        let output = self
            .runner
            .run_with_timeout("env", &update, PACKAGE_INSTALL_TIMEOUT)
            .await
            .context("refreshing package index")?;
        ensure_success("env", &update, output)?;

        let mut install = vec![
            "DEBIAN_FRONTEND=noninteractive",
            "apt-get",
            "install",
            "-y",
            "-q",
            "--no-install-recommends",
        ];
        install.extend(packages.iter().map(String::as_str));
        let output = self
            .runner
            .run_with_timeout("env", &install, PACKAGE_INSTALL_TIMEOUT)
            .await
            .with_context(|| format!("installing {}", packages.join(", ")))?;
        ensure_success("env", &install, output)?;
        tracing::info!(packages = ?packages, "installed packages");
        Ok(())
    }
}

impl<R: CommandRunner> ServiceSupervisor for MachineHost<R> {
    async fn daemon_reload(&self) -> Result<()> {
        run_checked(&self.runner, "systemctl", &["daemon-reload"]).await?;
        Ok(())
    }

    async fn resume(&self, service: &str) -> Result<()> {
        run_checked(&self.runner, "systemctl", &["enable", "--now", service]).await?;
        Ok(())
    }

    async fn restart(&self, service: &str) -> Result<()> {
        run_checked(&self.runner, "systemctl", &["restart", service]).await?;
        Ok(())
    }

    async fn stop(&self, service: &str) -> Result<()> {
        run_checked(&self.runner, "systemctl", &["disable", "--now", service]).await?;
        Ok(())
    }

    async fn is_running(&self, service: &str) -> Result<bool> {
        let output = self
            .runner
            .run("systemctl", &["is-active", "--quiet", service])
            .await
            .with_context(|| format!("querying {service}"))?;
        Ok(output.status.success())
    }
}

impl<R: CommandRunner> UserAccounts for MachineHost<R> {
    async fn create_system_user(&self, name: &str, home: &Path) -> Result<()> {
        if self.user_exists(name).await? {
            tracing::debug!(user = name, "user already exists");
            return Ok(());
        }
        let home = home.display().to_string();
        run_checked(
            &self.runner,
            "useradd",
            &[
                "--system",
                "--user-group",
                "--no-create-home",
                "--home-dir",
                &home,
                "--shell",
                "/usr/sbin/nologin",
                name,
            ],
        )
        .await?;
        Ok(())
    }

    async fn remove_user(&self, name: &str) -> Result<()> {
        if !self.user_exists(name).await? {
            return Ok(());
        }
        run_checked(&self.runner, "userdel", &[name]).await?;
        Ok(())
    }

    async fn chown(&self, path: &Path, user: &str) -> Result<()> {
        let owner = format!("{user}:{user}");
        let path = path.display().to_string();
        run_checked(&self.runner, "chown", &["-R", &owner, &path]).await?;
        Ok(())
    }
}

impl<R: CommandRunner> HostInfo for MachineHost<R> {
    async fn kernel_release(&self) -> Result<String> {
        self.stdout_of("uname", &["-r"]).await
    }

    async fn fqdn(&self) -> Result<String> {
        self.stdout_of("hostname", &["-f"]).await
    }

    async fn daemon_version_output(&self, bin: &Path) -> Result<String> {
        let program = bin.display().to_string();
        let output = run_checked(&self.runner, &program, &["--version"]).await?;
        let text = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(String::from_utf8_lossy(&text).trim().to_string())
    }
}
