//! Unit tests for the lifecycle transitions, driven against `FakeHost`.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::Path;

use parca_operator::application::ports::HostFs;
use parca_relations::Relation;
use parca_relations::grafana::{DASHBOARDS_KEY, DEFAULT_RELATION_NAME as DASHBOARD_RELATION_NAME};
use parca_relations::scrape::{METRICS_RELATION_NAME, SELF_PROFILING_RELATION_NAME};
use parca_relations::store::{ADDRESS_KEY, DEFAULT_RELATION_NAME as STORE_RELATION_NAME};
use parca_operator::application::services::lifecycle::{
    self, NOT_RUNNING_REASON, publish_provider_data,
};
use parca_operator::domain::{ContractViolation, OperatorConfig, Phase, UnitState, UnitStatus};

use crate::mocks::{Failure, FakeHost};

const CONFIG_FILE: &str = "/etc/parca/parca.yaml";
const PARCA_UNIT: &str = "/etc/systemd/system/parca.service";
const INTROSPECT_UNIT: &str = "/etc/systemd/system/juju-introspect.service";

async fn installed(host: &FakeHost) -> UnitState {
    let state = lifecycle::install(host, &OperatorConfig::default(), UnitState::default())
        .await
        .unwrap();
    assert_eq!(state.phase, Phase::Installed, "install failed: {}", state.status);
    state
}

async fn running(host: &FakeHost) -> UnitState {
    let state = installed(host).await;
    let state = lifecycle::start(host, &OperatorConfig::default(), state)
        .await
        .unwrap();
    assert_eq!(state.phase, Phase::Running);
    state
}

// ── install ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_install_runs_stages_in_order() {
    let host = FakeHost::default();
    let state = installed(&host).await;

    let calls = host.calls();
    let position = |prefix: &str| {
        calls
            .iter()
            .position(|c| c.starts_with(prefix))
            .unwrap_or_else(|| panic!("missing call {prefix}: {calls:?}"))
    };
    let packages = position("install_packages");
    let binary = position("place_binary /usr/bin/parca");
    let user = position("create_user parca");
    let config = position(&format!("write {CONFIG_FILE}"));
    let port = position("open_port 7070/tcp");
    assert!(packages < binary && binary < user && user < config && config < port);

    assert_eq!(
        calls[packages],
        "install_packages llvm binutils elfutils linux-headers-6.8.0-45-generic"
    );
    assert!(host.called("chown parca /var/lib/parca"));
    assert_eq!(state.status, UnitStatus::maintenance("parca installed"));
    assert_eq!(state.workload_version.as_deref(), Some("0.18.0"));
    assert!(state.config_digest.is_some());
}

#[tokio::test]
async fn test_install_writes_units_and_config() {
    let host = FakeHost::default();
    installed(&host).await;

    let unit = host.file(PARCA_UNIT).expect("parca unit written");
    assert!(unit.contains(
        "ExecStart=/usr/bin/parca --config-path=/etc/parca/parca.yaml \
         --storage-in-memory=true --storage-active-memory=4294967296"
    ));
    assert!(unit.contains("User=parca"));

    let introspect = host.file(INTROSPECT_UNIT).expect("sidecar unit written");
    assert!(introspect.contains("--listen=127.0.0.1:6000"));

    let config = host.file(CONFIG_FILE).expect("config written");
    assert!(config.contains("FILESYSTEM"));
    assert!(config.contains("/var/lib/parca"));
    assert!(config.contains("juju-introspect"));
}

#[tokio::test]
async fn test_install_failure_blocks_with_stage_and_stops() {
    let host = FakeHost::failing(Failure::Binary);
    let state = lifecycle::install(&host, &OperatorConfig::default(), UnitState::default())
        .await
        .unwrap();

    assert_eq!(state.phase, Phase::Uninstalled);
    let UnitStatus::Blocked(reason) = &state.status else {
        panic!("expected blocked, got {:?}", state.status);
    };
    assert!(reason.contains("install stage 'binary' failed"), "got: {reason}");
    assert!(!host.called("create_user"));
    assert!(!host.called("open_port"));
    assert!(state.config_digest.is_none());
}

#[tokio::test]
async fn test_install_dependency_failure_names_stage() {
    let host = FakeHost::failing(Failure::Packages);
    let state = lifecycle::install(&host, &OperatorConfig::default(), UnitState::default())
        .await
        .unwrap();
    assert_eq!(state.phase, Phase::Uninstalled);
    assert!(state.status.message().contains("'dependencies'"));
    assert!(!host.called("place_binary"));
}

#[tokio::test]
async fn test_install_retry_after_failure_succeeds() {
    let failing = FakeHost::failing(Failure::Port);
    let blocked = lifecycle::install(&failing, &OperatorConfig::default(), UnitState::default())
        .await
        .unwrap();
    assert!(blocked.status.message().contains("'port'"));

    let host = FakeHost::default();
    let state = lifecycle::install(&host, &OperatorConfig::default(), blocked)
        .await
        .unwrap();
    assert_eq!(state.phase, Phase::Installed);
    assert!(!state.status.is_blocked());
}

#[tokio::test]
async fn test_install_when_installed_is_ignored() {
    let host = FakeHost::default();
    let state = installed(&host).await;
    host.clear_calls();

    let again = lifecycle::install(&host, &OperatorConfig::default(), state.clone())
        .await
        .unwrap();
    assert_eq!(again, state);
    assert!(host.calls().is_empty());
}

#[tokio::test]
async fn test_install_malformed_version_is_contract_violation() {
    let host = FakeHost {
        version_output: Some("parca".to_string()),
        ..FakeHost::default()
    };
    let err = lifecycle::install(&host, &OperatorConfig::default(), UnitState::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ContractViolation::MalformedVersion {
            needed: 3,
            found: 1,
            ..
        }
    ));
}

#[tokio::test]
async fn test_install_unreadable_version_is_not_fatal() {
    let host = FakeHost {
        version_output: None,
        ..FakeHost::default()
    };
    let state = installed(&host).await;
    assert!(state.workload_version.is_none());
}

#[tokio::test]
async fn test_install_rejects_legacy_storage_key() {
    let host = FakeHost::default();
    let settings = OperatorConfig {
        storage_persist: Some(true),
        ..OperatorConfig::default()
    };
    let err = lifecycle::install(&host, &settings, UnitState::default())
        .await
        .unwrap_err();
    assert_eq!(err, ContractViolation::LegacyStorageKey);
    assert!(host.calls().is_empty());
}

// ── start / stop ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_start_before_install_is_ignored() {
    let host = FakeHost::default();
    let state = lifecycle::start(&host, &OperatorConfig::default(), UnitState::default())
        .await
        .unwrap();
    assert_eq!(state.phase, Phase::Uninstalled);
    assert!(!host.called("resume"));
}

#[tokio::test]
async fn test_start_resumes_daemon_and_sidecar() {
    let host = FakeHost::default();
    let state = running(&host).await;
    assert_eq!(state.status, UnitStatus::Active);
    assert!(host.is_service_running("parca"));
    assert!(host.is_service_running("juju-introspect"));
}

#[tokio::test]
async fn test_start_failure_stays_installed() {
    let host = FakeHost::default();
    let state = installed(&host).await;
    let host = FakeHost::failing(Failure::Resume);
    let state = lifecycle::start(&host, &OperatorConfig::default(), state)
        .await
        .unwrap();
    assert_eq!(state.phase, Phase::Installed);
    assert!(state.status.message().starts_with("failed to start parca"));
}

#[tokio::test]
async fn test_stop_returns_to_installed() {
    let host = FakeHost::default();
    let state = running(&host).await;
    let state = lifecycle::stop(&host, &OperatorConfig::default(), state)
        .await
        .unwrap();
    assert_eq!(state.phase, Phase::Installed);
    assert_eq!(state.status, UnitStatus::maintenance("parca stopped"));
    assert!(!host.is_service_running("parca"));
    assert!(!host.is_service_running("juju-introspect"));
}

#[tokio::test]
async fn test_stop_when_not_running_is_ignored() {
    let host = FakeHost::default();
    let state = installed(&host).await;
    host.clear_calls();
    let state = lifecycle::stop(&host, &OperatorConfig::default(), state)
        .await
        .unwrap();
    assert_eq!(state.phase, Phase::Installed);
    assert!(!host.called("stop"));
}

// ── configure ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_configure_before_install_defers() {
    let host = FakeHost::default();
    let state = lifecycle::configure(&host, &OperatorConfig::default(), UnitState::default())
        .await
        .unwrap();
    assert_eq!(state.phase, Phase::Uninstalled);
    assert!(host.calls().is_empty());
}

#[tokio::test]
async fn test_configure_installed_writes_without_restart() {
    let host = FakeHost::default();
    let state = installed(&host).await;
    host.clear_calls();

    let settings = OperatorConfig {
        enable_persistence: Some(true),
        ..OperatorConfig::default()
    };
    let state = lifecycle::configure(&host, &settings, state).await.unwrap();

    assert_eq!(state.phase, Phase::Installed);
    assert!(host.called(&format!("write {PARCA_UNIT}")));
    assert!(!host.called("restart"));
    let unit = host.file(PARCA_UNIT).unwrap();
    assert!(unit.contains("--storage-persist --storage-path=/var/lib/parca"));
}

#[tokio::test]
async fn test_configure_running_restarts_daemon() {
    let host = FakeHost::default();
    let state = running(&host).await;
    host.clear_calls();

    let state = lifecycle::configure(&host, &OperatorConfig::default(), state)
        .await
        .unwrap();
    assert_eq!(state.phase, Phase::Running);
    assert_eq!(state.status, UnitStatus::Active);
    assert_eq!(
        host.calls().last().map(String::as_str),
        Some("restart parca")
    );
}

#[tokio::test]
async fn test_configure_twice_writes_identical_files() {
    let host = FakeHost::default();
    let state = running(&host).await;

    let first = lifecycle::configure(&host, &OperatorConfig::default(), state)
        .await
        .unwrap();
    let config = host.file(CONFIG_FILE).unwrap();
    let unit = host.file(PARCA_UNIT).unwrap();

    let second = lifecycle::configure(&host, &OperatorConfig::default(), first.clone())
        .await
        .unwrap();
    assert_eq!(host.file(CONFIG_FILE).unwrap(), config);
    assert_eq!(host.file(PARCA_UNIT).unwrap(), unit);
    assert_eq!(first.config_digest, second.config_digest);
}

#[tokio::test]
async fn test_configure_write_failure_blocks_and_keeps_phase() {
    let host = FakeHost::default();
    let state = running(&host).await;
    let host = FakeHost::failing(Failure::Write);
    let state = lifecycle::configure(&host, &OperatorConfig::default(), state)
        .await
        .unwrap();
    assert_eq!(state.phase, Phase::Running);
    assert!(state.status.message().starts_with("failed to write parca configuration"));
}

#[tokio::test]
async fn test_configure_zero_memory_limit_is_contract_violation() {
    let host = FakeHost::default();
    let state = installed(&host).await;
    let settings = OperatorConfig {
        memory_storage_limit: 0,
        ..OperatorConfig::default()
    };
    let err = lifecycle::configure(&host, &settings, state)
        .await
        .unwrap_err();
    assert_eq!(err, ContractViolation::ZeroMemoryLimit);
}

// ── remove ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_remove_cleans_up_but_keeps_profiles() {
    let host = FakeHost::default();
    let state = running(&host).await;
    host.files
        .lock()
        .unwrap()
        .insert("/var/lib/parca/blocks/0001".into(), "profile".into());

    let state = lifecycle::remove(&host, &OperatorConfig::default(), state)
        .await
        .unwrap();

    assert_eq!(state.phase, Phase::Removed);
    assert!(state.workload_version.is_none());
    assert!(state.config_digest.is_none());
    assert!(!host.is_service_running("parca"));
    assert!(host.file("/usr/bin/parca").is_none());
    assert!(host.file(CONFIG_FILE).is_none());
    assert!(host.file(PARCA_UNIT).is_none());
    assert!(host.file(INTROSPECT_UNIT).is_none());
    assert!(host.file("/var/lib/parca/blocks/0001").is_some());
    assert!(host.called("remove_empty_dir /etc/parca"));
    assert!(host.called("remove_user parca"));
}

fn with_config_at(path: &str) -> OperatorConfig {
    let mut settings = OperatorConfig::default();
    settings.paths.config = path.into();
    settings
}

#[tokio::test]
async fn test_remove_config_in_profile_dir_keeps_profiles() {
    let settings = with_config_at("/var/lib/parca/parca.yaml");
    let host = FakeHost::default();
    let state = lifecycle::install(&host, &settings, UnitState::default())
        .await
        .unwrap();
    host.files
        .lock()
        .unwrap()
        .insert("/var/lib/parca/blocks/0001".into(), "profile".into());

    let state = lifecycle::remove(&host, &settings, state).await.unwrap();

    assert_eq!(state.phase, Phase::Removed);
    assert!(host.file("/var/lib/parca/parca.yaml").is_none());
    assert!(host.file("/var/lib/parca/blocks/0001").is_some());
    assert!(host.exists(Path::new("/var/lib/parca")));
    assert!(!host.called("remove_empty_dir"));
}

#[tokio::test]
async fn test_remove_config_in_top_level_dir_keeps_dir() {
    let settings = with_config_at("/etc/parca.yaml");
    let host = FakeHost::default();
    let state = lifecycle::install(&host, &settings, UnitState::default())
        .await
        .unwrap();
    host.clear_calls();

    lifecycle::remove(&host, &settings, state).await.unwrap();

    assert!(host.called("remove_file /etc/parca.yaml"));
    assert!(!host.called("remove_empty_dir"));
}

#[tokio::test]
async fn test_remove_twice_is_ignored() {
    let host = FakeHost::default();
    let state = installed(&host).await;
    let state = lifecycle::remove(&host, &OperatorConfig::default(), state)
        .await
        .unwrap();
    host.clear_calls();
    let again = lifecycle::remove(&host, &OperatorConfig::default(), state.clone())
        .await
        .unwrap();
    assert_eq!(again, state);
    assert!(host.calls().is_empty());
}

#[tokio::test]
async fn test_reinstall_after_remove() {
    let host = FakeHost::default();
    let state = installed(&host).await;
    let state = lifecycle::remove(&host, &OperatorConfig::default(), state)
        .await
        .unwrap();
    let state = lifecycle::install(&host, &OperatorConfig::default(), state)
        .await
        .unwrap();
    assert_eq!(state.phase, Phase::Installed);
}

// ── upgrade / update-status ──────────────────────────────────────────────────

#[tokio::test]
async fn test_upgrade_replaces_binary_and_restarts() {
    let host = FakeHost::default();
    let state = running(&host).await;
    host.clear_calls();

    let state = lifecycle::upgrade(&host, &OperatorConfig::default(), state)
        .await
        .unwrap();
    assert_eq!(state.phase, Phase::Running);
    assert_eq!(state.status, UnitStatus::Active);
    assert!(host.called("place_binary"));
    assert!(host.called(&format!("write {INTROSPECT_UNIT}")));
    assert!(host.called("restart parca"));
}

#[tokio::test]
async fn test_upgrade_before_install_is_ignored() {
    let host = FakeHost::default();
    let state = lifecycle::upgrade(&host, &OperatorConfig::default(), UnitState::default())
        .await
        .unwrap();
    assert_eq!(state.phase, Phase::Uninstalled);
    assert!(host.calls().is_empty());
}

#[tokio::test]
async fn test_update_status_blocks_when_daemon_died() {
    let host = FakeHost::default();
    let state = running(&host).await;
    host.crash("parca");

    let state = lifecycle::update_status(&host, &OperatorConfig::default(), state)
        .await
        .unwrap();
    assert_eq!(state.phase, Phase::Running);
    assert_eq!(state.status, UnitStatus::blocked(NOT_RUNNING_REASON));

    host.running.lock().unwrap().insert("parca".into());
    let state = lifecycle::update_status(&host, &OperatorConfig::default(), state)
        .await
        .unwrap();
    assert_eq!(state.status, UnitStatus::Active);
}

#[tokio::test]
async fn test_update_status_refreshes_dev_version() {
    let host = FakeHost::default();
    let state = running(&host).await;
    let host = FakeHost {
        version_output: Some("parca, version 0.19.0-next (commit: 9f8e7d6c5b4a)".into()),
        ..FakeHost::default()
    };
    host.running.lock().unwrap().insert("parca".into());

    let state = lifecycle::update_status(&host, &OperatorConfig::default(), state)
        .await
        .unwrap();
    assert_eq!(state.workload_version.as_deref(), Some("0.19.0-next+9f8e7d"));
    assert_eq!(
        host.workload_version.lock().unwrap().as_deref(),
        Some("0.19.0-next+9f8e7d")
    );
}

// ── provider data ────────────────────────────────────────────────────────────

fn provider_state(mut state: UnitState) -> UnitState {
    state
        .inputs
        .upsert_relation(Relation::new(3, STORE_RELATION_NAME, "agent"));
    state
        .inputs
        .upsert_relation(Relation::new(4, METRICS_RELATION_NAME, "prometheus"));
    state
        .inputs
        .upsert_relation(Relation::new(5, SELF_PROFILING_RELATION_NAME, "parca-b"));
    state
}

#[tokio::test]
async fn test_publish_provider_data_leader_writes_app_and_unit_data() {
    let host = FakeHost::default();
    let state = provider_state(running(&host).await);

    let state = publish_provider_data(&host, &OperatorConfig::default(), state, None)
        .await
        .unwrap();
    assert_eq!(state.status, UnitStatus::Active);

    let writes = host.relation_writes();
    let store = writes
        .iter()
        .find(|w| w.relation_id == 3)
        .expect("store data written");
    assert!(store.app);
    assert_eq!(
        store.data.get(ADDRESS_KEY).map(String::as_str),
        Some("10.1.2.3:7070")
    );

    for id in [4, 5] {
        assert!(writes.iter().any(|w| w.relation_id == id && w.app));
        assert!(writes.iter().any(|w| w.relation_id == id && !w.app));
    }
}

#[tokio::test]
async fn test_publish_provider_data_follower_writes_unit_data_only() {
    let host = FakeHost::follower();
    let state = provider_state(UnitState::default());

    publish_provider_data(&host, &OperatorConfig::default(), state, None)
        .await
        .unwrap();

    let writes = host.relation_writes();
    assert!(writes.iter().all(|w| !w.app), "follower wrote app data: {writes:?}");
    assert!(!writes.iter().any(|w| w.relation_id == 3));
    assert!(writes.iter().any(|w| w.relation_id == 4));
}

#[tokio::test]
async fn test_publish_provider_data_single_relation() {
    let host = FakeHost::default();
    let state = provider_state(UnitState::default());

    publish_provider_data(&host, &OperatorConfig::default(), state, Some(4))
        .await
        .unwrap();
    assert!(host.relation_writes().iter().all(|w| w.relation_id == 4));
}

#[tokio::test]
async fn test_publish_provider_data_failure_blocks() {
    let host = FakeHost::failing(Failure::Relation);
    let state = provider_state(UnitState {
        phase: Phase::Running,
        status: UnitStatus::Active,
        ..UnitState::default()
    });

    let state = publish_provider_data(&host, &OperatorConfig::default(), state, None)
        .await
        .unwrap();
    assert_eq!(state.phase, Phase::Running);
    assert!(state.status.message().starts_with("failed to publish relation data"));
}

fn dashboard_state() -> UnitState {
    let mut state = UnitState::default();
    state
        .inputs
        .upsert_relation(Relation::new(7, DASHBOARD_RELATION_NAME, "grafana"));
    state
}

#[tokio::test]
async fn test_publish_dashboards_as_leader() {
    let host = FakeHost::default();
    publish_provider_data(&host, &OperatorConfig::default(), dashboard_state(), Some(7))
        .await
        .unwrap();

    let writes = host.relation_writes();
    assert_eq!(writes.len(), 1, "got: {writes:?}");
    assert!(writes[0].app);
    let payload: serde_json::Value =
        serde_json::from_str(&writes[0].data[DASHBOARDS_KEY]).unwrap();
    let template = &payload["templates"]["file:parca"];
    assert_eq!(template["charm"], "parca");
    assert_eq!(template["juju_topology"]["unit"], "parca/0");
    assert!(template["content"].as_str().is_some_and(|c| !c.is_empty()));
}

#[tokio::test]
async fn test_publish_dashboards_skipped_on_follower() {
    let host = FakeHost::follower();
    publish_provider_data(&host, &OperatorConfig::default(), dashboard_state(), None)
        .await
        .unwrap();
    assert!(host.relation_writes().is_empty());
}
