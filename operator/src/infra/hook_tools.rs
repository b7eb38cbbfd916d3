//! Hosting framework hook tools: `status-set`, `relation-set`, `open-port`
//! and friends, plus the environment every hook runs in.

use anyhow::{Context, Result};
use parca_relations::{Databag, ScrapeMetadata};

use crate::application::ports::{CommandRunner, RelationDataSink, StatusSink};
use crate::domain::UnitStatus;
use crate::infra::command_runner::run_checked;
use crate::infra::host::MachineHost;

const CHARM_NAME: &str = "parca";

/// Identity of the unit, read from the hook environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JujuContext {
    pub unit_name: String,
    pub model: String,
    pub model_uuid: String,
}

impl JujuContext {
    /// Read `JUJU_UNIT_NAME`, `JUJU_MODEL_NAME` and `JUJU_MODEL_UUID`.
    ///
    /// # Errors
    ///
    /// Returns an error if `JUJU_UNIT_NAME` is unset.
    pub fn from_env() -> Result<Self> {
        let unit_name =
            std::env::var("JUJU_UNIT_NAME").context("JUJU_UNIT_NAME is not set; not in a hook")?;
        Ok(Self {
            unit_name,
            model: std::env::var("JUJU_MODEL_NAME").unwrap_or_default(),
            model_uuid: std::env::var("JUJU_MODEL_UUID").unwrap_or_default(),
        })
    }

    /// Application part of the unit name (`parca` for `parca/0`).
    #[must_use]
    pub fn application(&self) -> &str {
        self.unit_name
            .split_once('/')
            .map_or(self.unit_name.as_str(), |(app, _)| app)
    }
}

/// `key=value` arguments for `relation-set`. An empty value unsets the key.
#[must_use]
pub fn relation_set_args(relation_id: u32, app: bool, data: &Databag) -> Vec<String> {
    let mut args = vec!["-r".to_string(), relation_id.to_string()];
    if app {
        args.push("--app".into());
    }
    args.extend(data.iter().map(|(k, v)| format!("{k}={v}")));
    args
}

impl<R: CommandRunner> MachineHost<R> {
    async fn relation_set(&self, relation_id: u32, app: bool, data: &Databag) -> Result<()> {
        let args = relation_set_args(relation_id, app, data);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_checked(self.runner(), "relation-set", &args)
            .await
            .with_context(|| format!("writing relation {relation_id} data"))?;
        Ok(())
    }
}

impl<R: CommandRunner> StatusSink for MachineHost<R> {
    async fn set_status(&self, status: &UnitStatus) -> Result<()> {
        run_checked(
            self.runner(),
            "status-set",
            &[status.name(), status.message()],
        )
        .await?;
        Ok(())
    }

    async fn set_workload_version(&self, version: &str) -> Result<()> {
        run_checked(self.runner(), "application-version-set", &[version]).await?;
        Ok(())
    }

    async fn open_port(&self, port: u16, protocol: &str) -> Result<()> {
        let spec = format!("{port}/{protocol}");
        run_checked(self.runner(), "open-port", &[&spec]).await?;
        Ok(())
    }
}

impl<R: CommandRunner> RelationDataSink for MachineHost<R> {
    async fn set_app_data(&self, relation_id: u32, data: &Databag) -> Result<()> {
        self.relation_set(relation_id, true, data).await
    }

    async fn set_unit_data(&self, relation_id: u32, data: &Databag) -> Result<()> {
        self.relation_set(relation_id, false, data).await
    }

    async fn is_leader(&self) -> Result<bool> {
        let output = run_checked(self.runner(), "is-leader", &["--format=json"]).await?;
        let text = String::from_utf8_lossy(&output.stdout);
        serde_json::from_str(text.trim()).context("parsing is-leader output")
    }

    async fn bind_address(&self, endpoint: &str) -> Result<Option<String>> {
        let output = self
            .runner()
            .run("network-get", &[endpoint, "--bind-address"])
            .await?;
        if !output.status.success() {
            tracing::debug!(endpoint, "no bind address for endpoint");
            return Ok(None);
        }
        let address = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!address.is_empty()).then_some(address))
    }

    fn unit_name(&self) -> String {
        self.juju.unit_name.clone()
    }

    fn topology(&self) -> ScrapeMetadata {
        ScrapeMetadata {
            model: self.juju.model.clone(),
            model_uuid: self.juju.model_uuid.clone(),
            application: self.juju.application().to_string(),
            charm_name: CHARM_NAME.to_string(),
        }
    }
}
