//! Lifecycle controller: install, start, configure, stop, remove, upgrade.
//!
//! Every transition takes the current [`UnitState`] and returns the next one.
//! Port failures end the transition with a blocked status and the phase the
//! transition started from; only contract violations are returned as `Err`.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::future::Future;

use anyhow::{Context, Result};
use parca_relations::grafana::DEFAULT_RELATION_NAME as DASHBOARD_RELATION_NAME;
use parca_relations::scrape::{METRICS_RELATION_NAME, SELF_PROFILING_RELATION_NAME};
use parca_relations::store::DEFAULT_RELATION_NAME as STORE_RELATION_NAME;
use parca_relations::{
    GrafanaDashboardProvider, ProfilingEndpointConsumer, Relation, ScrapeEndpointProvider,
    ScrapeJob, StoreEndpointProvider,
};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::application::ports::Host;
use crate::domain::config::PARCA_PORT;
use crate::domain::dashboards;
use crate::domain::parca_config::{
    Bucket, INTROSPECT_ADDRESS, RenderedConfig, config_digest, introspect_scrape_job,
    parse_daemon_version, render_command_line, render_config, render_config_with_storage,
};
use crate::domain::unit::{INTROSPECT_SERVICE, PARCA_SERVICE, PARCA_USER, UnitSpec, render_unit};
use crate::domain::{
    ApplicationConfig, ConfigWriteFailure, ContractViolation, InstallFailure, InstallStage, Inputs,
    OperatorConfig, Phase, ServiceFailure, UnitState, UnitStatus,
};

pub const NOT_RUNNING_REASON: &str = "parca service is not running";

/// Base packages needed to symbolize profiles; the kernel headers package is
/// added per host.
const BASE_PACKAGES: &[&str] = &["llvm", "binutils", "elfutils"];

/// Endpoints on which this unit publishes data.
const PROVIDER_ENDPOINTS: &[&str] = &[
    STORE_RELATION_NAME,
    SELF_PROFILING_RELATION_NAME,
    METRICS_RELATION_NAME,
    DASHBOARD_RELATION_NAME,
];

// ── Rendering ─────────────────────────────────────────────────────────────────

/// Config document and command line for the current settings and inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifacts {
    pub config: RenderedConfig,
    pub command_line: String,
}

/// Render everything the daemon needs from settings and relation inputs.
///
/// # Errors
///
/// Returns a [`ContractViolation`] if the settings are invalid.
pub fn render_artifacts(
    settings: &OperatorConfig,
    inputs: &Inputs,
) -> Result<Artifacts, ContractViolation> {
    let app = settings.application_config()?;
    let command_line = render_command_line(&app, &settings.paths, inputs.store.as_ref())?;
    let jobs = merged_scrape_jobs(&app, inputs);
    let config = match &inputs.s3 {
        Some(creds) => render_config_with_storage(Bucket::from(creds), jobs),
        None => render_config(&settings.paths.profiles, jobs),
    };
    Ok(Artifacts {
        config,
        command_line,
    })
}

/// The sidecar job first, then jobs from every profiling relation.
fn merged_scrape_jobs(app: &ApplicationConfig, inputs: &Inputs) -> Vec<ScrapeJob> {
    let consumer = ProfilingEndpointConsumer::default();
    let mut jobs = vec![introspect_scrape_job(app.scrape_interval_secs)];
    for relation in inputs.relations_named(consumer.endpoint()) {
        match consumer.relation_jobs(relation) {
            Ok(relation_jobs) => jobs.extend(relation_jobs),
            Err(e) => warn!(relation_id = relation.id, error = %e, "skipping profiling relation"),
        }
    }
    jobs
}

#[must_use]
pub fn dependency_packages(kernel_release: &str) -> Vec<String> {
    BASE_PACKAGES
        .iter()
        .map(ToString::to_string)
        .chain(std::iter::once(format!("linux-headers-{kernel_release}")))
        .collect()
}

// ── Transitions ───────────────────────────────────────────────────────────────

/// Install the daemon: dependencies, binary, user, config, port.
///
/// # Errors
///
/// Returns a [`ContractViolation`] if the settings are invalid or the
/// installed binary reports a malformed version.
pub async fn install(
    host: &impl Host,
    settings: &OperatorConfig,
    state: UnitState,
) -> Result<UnitState, ContractViolation> {
    let from = state.phase;
    if !matches!(from, Phase::Uninstalled | Phase::Removed) {
        warn!(event = "install", phase = %from, "already installed, ignoring");
        return Ok(state);
    }
    let artifacts = render_artifacts(settings, &state.inputs)?;

    report(host, &UnitStatus::maintenance("installing parca")).await;
    let mut state = UnitState {
        phase: Phase::Installing,
        ..state
    };
    info!(event = "install", phase = %state.phase, "installing parca");

    let digest = match install_stages(host, settings, &artifacts).await {
        Ok(digest) => digest,
        Err(failure) => {
            error!(event = "install", stage = %failure.stage, error = %failure.message, "install failed");
            return Ok(state.blocked(from, failure.to_string()));
        }
    };

    state.phase = Phase::Installed;
    state.status = UnitStatus::maintenance("parca installed");
    state.config_digest = Some(digest);
    refresh_version(host, settings, &mut state).await?;
    info!(event = "install", phase = %state.phase, "parca installed");
    Ok(state)
}

async fn install_stages(
    host: &impl Host,
    settings: &OperatorConfig,
    artifacts: &Artifacts,
) -> Result<String, InstallFailure> {
    stage(InstallStage::Dependencies, install_dependencies(host, settings)).await?;
    stage(
        InstallStage::Binary,
        host.place_binary(&settings.binary, &settings.paths.bin),
    )
    .await?;
    stage(
        InstallStage::User,
        host.create_system_user(PARCA_USER, &settings.paths.profiles),
    )
    .await?;
    let digest = stage(InstallStage::Config, async {
        host.create_dir_all(&settings.paths.profiles)?;
        host.chown(&settings.paths.profiles, PARCA_USER).await?;
        write_artifacts(host, settings, artifacts).await
    })
    .await?;
    stage(InstallStage::Port, host.open_port(PARCA_PORT, "tcp")).await?;
    Ok(digest)
}

async fn stage<T>(
    stage: InstallStage,
    work: impl Future<Output = Result<T>>,
) -> Result<T, InstallFailure> {
    debug!(event = "install", %stage, "running install stage");
    work.await.map_err(|e| InstallFailure {
        stage,
        message: format!("{e:#}"),
    })
}

async fn install_dependencies(host: &impl Host, settings: &OperatorConfig) -> Result<()> {
    let kernel = host
        .kernel_release()
        .await
        .context("reading kernel release")?;
    host.install_packages(&dependency_packages(&kernel)).await?;
    write_introspect_unit(host, settings)
}

/// Enable and start the daemon and its sidecar.
///
/// # Errors
///
/// This transition has no contract checks; the `Result` keeps the dispatch
/// signature uniform.
pub async fn start(
    host: &impl Host,
    _settings: &OperatorConfig,
    state: UnitState,
) -> Result<UnitState, ContractViolation> {
    let from = state.phase;
    if !from.is_installed() {
        warn!(event = "start", phase = %from, "parca is not installed, ignoring");
        return Ok(state);
    }
    report(host, &UnitStatus::maintenance("starting parca")).await;

    let started = async {
        attempt("start parca", host.resume(PARCA_SERVICE)).await?;
        attempt("start juju-introspect", host.resume(INTROSPECT_SERVICE)).await?;
        attempt("open port", host.open_port(PARCA_PORT, "tcp")).await
    }
    .await;
    if let Err(failure) = started {
        error!(event = "start", error = %failure, "start failed");
        return Ok(state.blocked(from, failure.to_string()));
    }

    info!(event = "start", phase = %Phase::Running, "parca started");
    Ok(UnitState {
        phase: Phase::Running,
        status: UnitStatus::Active,
        ..state
    })
}

/// Rewrite the daemon's files from the current inputs.
///
/// When the daemon is running it is restarted; when it is only installed
/// the restart is left to `start`. Before install, inputs are kept and
/// nothing is written.
///
/// # Errors
///
/// Returns a [`ContractViolation`] if the settings are invalid.
pub async fn configure(
    host: &impl Host,
    settings: &OperatorConfig,
    state: UnitState,
) -> Result<UnitState, ContractViolation> {
    let from = state.phase;
    if !from.is_installed() {
        debug!(event = "configure", phase = %from, "not installed yet, configuration deferred");
        return Ok(state);
    }
    let artifacts = render_artifacts(settings, &state.inputs)?;

    let mut state = state;
    if from == Phase::Running {
        state.phase = Phase::Reconfiguring;
    }
    info!(event = "configure", phase = %state.phase, "writing parca configuration");

    let digest = match write_artifacts(host, settings, &artifacts).await {
        Ok(digest) => digest,
        Err(e) => {
            let failure = ConfigWriteFailure::new(&e);
            error!(event = "configure", error = %failure, "configuration failed");
            return Ok(state.blocked(from, failure.to_string()));
        }
    };
    state.config_digest = Some(digest);

    if from == Phase::Running {
        if let Err(failure) = attempt("restart parca", host.restart(PARCA_SERVICE)).await {
            error!(event = "configure", error = %failure, "restart failed");
            return Ok(state.blocked(from, failure.to_string()));
        }
    }

    state.phase = from;
    state.status = settled_status(from);
    Ok(state)
}

/// Stop and disable the daemon and its sidecar.
///
/// # Errors
///
/// This transition has no contract checks; the `Result` keeps the dispatch
/// signature uniform.
pub async fn stop(
    host: &impl Host,
    _settings: &OperatorConfig,
    state: UnitState,
) -> Result<UnitState, ContractViolation> {
    let from = state.phase;
    if from != Phase::Running {
        warn!(event = "stop", phase = %from, "parca is not running, ignoring");
        return Ok(state);
    }
    report(host, &UnitStatus::maintenance("stopping parca")).await;
    let state = UnitState {
        phase: Phase::Stopping,
        ..state
    };
    info!(event = "stop", phase = %state.phase, "stopping parca");

    let stopped = async {
        attempt("stop parca", host.stop(PARCA_SERVICE)).await?;
        attempt("stop juju-introspect", host.stop(INTROSPECT_SERVICE)).await
    }
    .await;
    if let Err(failure) = stopped {
        error!(event = "stop", error = %failure, "stop failed");
        return Ok(state.blocked(from, failure.to_string()));
    }

    Ok(UnitState {
        phase: Phase::Installed,
        status: UnitStatus::maintenance("parca stopped"),
        ..state
    })
}

/// Remove the daemon, its files and its user. Profiles are kept.
///
/// # Errors
///
/// This transition has no contract checks; the `Result` keeps the dispatch
/// signature uniform.
pub async fn remove(
    host: &impl Host,
    settings: &OperatorConfig,
    state: UnitState,
) -> Result<UnitState, ContractViolation> {
    let from = state.phase;
    if from == Phase::Removed {
        warn!(event = "remove", phase = %from, "already removed, ignoring");
        return Ok(state);
    }
    report(host, &UnitStatus::maintenance("removing parca")).await;
    let state = UnitState {
        phase: Phase::Stopping,
        ..state
    };
    info!(event = "remove", phase = %state.phase, "removing parca");

    if let Err(e) = remove_workload(host, settings).await {
        let failure = ServiceFailure::new("remove parca", &e);
        error!(event = "remove", error = %failure, "remove failed");
        return Ok(state.blocked(from, failure.to_string()));
    }

    Ok(UnitState {
        phase: Phase::Removed,
        status: UnitStatus::maintenance("parca removed"),
        workload_version: None,
        config_digest: None,
        ..state
    })
}

async fn remove_workload(host: &impl Host, settings: &OperatorConfig) -> Result<()> {
    for service in [PARCA_SERVICE, INTROSPECT_SERVICE] {
        if host.is_running(service).await? {
            host.stop(service).await?;
        }
    }
    let paths = &settings.paths;
    host.remove_file(&paths.bin)?;
    host.remove_file(&paths.unit_file(PARCA_SERVICE))?;
    host.remove_file(&paths.unit_file(INTROSPECT_SERVICE))?;
    host.remove_file(&paths.config)?;
    if let Some(dir) = paths.removable_config_dir() {
        host.remove_empty_dir(&dir)?;
    }
    host.daemon_reload().await?;
    host.remove_user(PARCA_USER).await
}

/// Replace the binary and rewrite files, restarting a running daemon.
///
/// # Errors
///
/// Returns a [`ContractViolation`] if the settings are invalid or the new
/// binary reports a malformed version.
pub async fn upgrade(
    host: &impl Host,
    settings: &OperatorConfig,
    state: UnitState,
) -> Result<UnitState, ContractViolation> {
    let from = state.phase;
    if !from.is_installed() {
        warn!(event = "upgrade", phase = %from, "parca is not installed, ignoring");
        return Ok(state);
    }
    let artifacts = render_artifacts(settings, &state.inputs)?;
    report(host, &UnitStatus::maintenance("upgrading parca")).await;
    info!(event = "upgrade", phase = %from, "upgrading parca");

    if let Err(failure) = stage(
        InstallStage::Binary,
        host.place_binary(&settings.binary, &settings.paths.bin),
    )
    .await
    {
        error!(event = "upgrade", stage = %failure.stage, error = %failure.message, "upgrade failed");
        return Ok(state.blocked(from, failure.to_string()));
    }

    let written = async {
        write_introspect_unit(host, settings)?;
        write_artifacts(host, settings, &artifacts).await
    }
    .await;
    let mut state = match written {
        Ok(digest) => UnitState {
            config_digest: Some(digest),
            ..state
        },
        Err(e) => {
            let failure = ConfigWriteFailure::new(&e);
            error!(event = "upgrade", error = %failure, "upgrade failed");
            return Ok(state.blocked(from, failure.to_string()));
        }
    };

    if from == Phase::Running {
        if let Err(failure) = attempt("restart parca", host.restart(PARCA_SERVICE)).await {
            error!(event = "upgrade", error = %failure, "restart failed");
            return Ok(state.blocked(from, failure.to_string()));
        }
    }

    state.status = settled_status(from);
    refresh_version(host, settings, &mut state).await?;
    Ok(state)
}

/// Refresh the workload version and check the daemon is still up.
///
/// # Errors
///
/// Returns a [`ContractViolation`] if the binary reports a malformed version.
pub async fn update_status(
    host: &impl Host,
    settings: &OperatorConfig,
    state: UnitState,
) -> Result<UnitState, ContractViolation> {
    let from = state.phase;
    if !from.is_installed() {
        debug!(event = "update-status", phase = %from, "nothing installed to check");
        return Ok(state);
    }
    let mut state = state;
    refresh_version(host, settings, &mut state).await?;
    if from != Phase::Running {
        return Ok(state);
    }

    match host.is_running(PARCA_SERVICE).await {
        Ok(true) if state.status == UnitStatus::blocked(NOT_RUNNING_REASON) => {
            info!(event = "update-status", "parca is running again");
            state.status = UnitStatus::Active;
            Ok(state)
        }
        Ok(true) => Ok(state),
        Ok(false) => {
            warn!(event = "update-status", "parca service is not running");
            Ok(state.blocked(from, NOT_RUNNING_REASON))
        }
        Err(e) => {
            let failure = ServiceFailure::new("query parca service", &e);
            Ok(state.blocked(from, failure.to_string()))
        }
    }
}

/// Publish this unit's data on provider relations: one relation, or all of
/// them when `relation_id` is `None`.
///
/// # Errors
///
/// This transition has no contract checks; the `Result` keeps the dispatch
/// signature uniform.
pub async fn publish_provider_data(
    host: &impl Host,
    settings: &OperatorConfig,
    state: UnitState,
    relation_id: Option<u32>,
) -> Result<UnitState, ContractViolation> {
    let targets: Vec<&Relation> = state
        .inputs
        .relations
        .iter()
        .filter(|r| relation_id.is_none_or(|id| r.id == id))
        .filter(|r| PROVIDER_ENDPOINTS.contains(&r.name.as_str()))
        .collect();
    if targets.is_empty() {
        return Ok(state);
    }

    if let Err(e) = publish(host, settings, &targets).await {
        let failure = ServiceFailure::new("publish relation data", &e);
        error!(event = "publish-provider-data", error = %failure, "publishing failed");
        let phase = state.phase;
        return Ok(state.blocked(phase, failure.to_string()));
    }
    Ok(state)
}

async fn publish(host: &impl Host, settings: &OperatorConfig, relations: &[&Relation]) -> Result<()> {
    let leader = host.is_leader().await.context("checking leadership")?;
    let fqdn = host.fqdn().await.context("resolving host name")?;
    let unit_name = host.unit_name();
    let topology = host.topology();

    for relation in relations {
        if relation.name == DASHBOARD_RELATION_NAME {
            if leader {
                let provider = GrafanaDashboardProvider::new(dashboards::bundled());
                host.set_app_data(relation.id, &provider.app_data(&topology, &unit_name)?)
                    .await?;
                debug!(relation_id = relation.id, "published grafana dashboards");
            }
            continue;
        }
        let bind = host.bind_address(&relation.name).await?;
        if relation.name == STORE_RELATION_NAME {
            if leader {
                let data = store_provider(settings).relation_data(bind.as_deref(), &fqdn);
                host.set_app_data(relation.id, &data).await?;
            }
            continue;
        }

        let provider = if relation.name == METRICS_RELATION_NAME {
            ScrapeEndpointProvider::metrics(self_scrape_jobs())
        } else {
            ScrapeEndpointProvider::profiling(relation.name.clone(), self_scrape_jobs())
        };
        if leader {
            host.set_app_data(relation.id, &provider.app_data(&topology)?)
                .await?;
        }
        let address = bind.unwrap_or_else(|| fqdn.clone());
        host.set_unit_data(relation.id, &provider.unit_data(&address, &unit_name))
            .await?;
        debug!(relation_id = relation.id, endpoint = %relation.name, "published scrape endpoint");
    }
    Ok(())
}

fn store_provider(settings: &OperatorConfig) -> StoreEndpointProvider {
    let provider = StoreEndpointProvider::new(PARCA_PORT).insecure(settings.store_endpoint.insecure);
    match &settings.store_endpoint.external_url {
        Some(url) => provider.external_url(url.clone()),
        None => provider,
    }
}

/// The daemon's own endpoint, on every unit.
fn self_scrape_jobs() -> Vec<ScrapeJob> {
    let mut job = ScrapeJob::new();
    job.insert(
        "static_configs".into(),
        json!([{ "targets": [format!("*:{PARCA_PORT}")] }]),
    );
    vec![job]
}

// ── Helpers ───────────────────────────────────────────────────────────────────

async fn write_artifacts(
    host: &impl Host,
    settings: &OperatorConfig,
    artifacts: &Artifacts,
) -> Result<String> {
    let yaml = artifacts
        .config
        .to_yaml()
        .context("rendering parca configuration")?;
    let unit = render_unit(&UnitSpec::parca(&artifacts.command_line));
    let paths = &settings.paths;
    host.create_dir_all(&paths.config_dir())?;
    host.write(&paths.config, &yaml)?;
    host.write(&paths.unit_file(PARCA_SERVICE), &unit)?;
    host.daemon_reload().await?;
    Ok(config_digest(&yaml, &unit))
}

fn write_introspect_unit(host: &impl Host, settings: &OperatorConfig) -> Result<()> {
    let unit = render_unit(&UnitSpec::introspect(INTROSPECT_ADDRESS));
    host.write(&settings.paths.unit_file(INTROSPECT_SERVICE), &unit)
}

async fn attempt<T>(
    action: &str,
    work: impl Future<Output = Result<T>>,
) -> Result<T, ServiceFailure> {
    work.await.map_err(|e| ServiceFailure::new(action, &e))
}

fn settled_status(phase: Phase) -> UnitStatus {
    if phase == Phase::Running {
        UnitStatus::Active
    } else {
        UnitStatus::maintenance("parca installed")
    }
}

/// Publish the workload version. An unreadable binary is only logged.
async fn refresh_version(
    host: &impl Host,
    settings: &OperatorConfig,
    state: &mut UnitState,
) -> Result<(), ContractViolation> {
    let output = match host.daemon_version_output(&settings.paths.bin).await {
        Ok(output) => output,
        Err(e) => {
            warn!(error = %format!("{e:#}"), "cannot read parca version");
            return Ok(());
        }
    };
    let version = parse_daemon_version(&output)?;
    if let Err(e) = host.set_workload_version(&version).await {
        warn!(error = %format!("{e:#}"), "cannot publish workload version");
    }
    state.workload_version = Some(version);
    Ok(())
}

/// Best-effort intermediate status.
async fn report(host: &impl Host, status: &UnitStatus) {
    if let Err(e) = host.set_status(status).await {
        warn!(%status, error = %format!("{e:#}"), "cannot publish status");
    }
}
