//! Property-based tests for command-line and config rendering.
//!
//! Uses `proptest` to verify invariants across many random inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::PathBuf;

use proptest::prelude::*;
use serde_json::json;

use parca_relations::{ScrapeJob, StoreConfig};
use parca_operator::domain::parca_config::BYTES_PER_MIB;
use parca_operator::domain::{
    ApplicationConfig, ContractViolation, Paths, render_command_line, render_config,
};

fn optional_value() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some(String::new())),
        "[a-z0-9.:]{1,24}".prop_map(Some),
    ]
}

fn store_config() -> impl Strategy<Value = StoreConfig> {
    (optional_value(), optional_value(), optional_value()).prop_map(
        |(address, bearer_token, insecure)| StoreConfig {
            address,
            bearer_token,
            insecure,
        },
    )
}

// ============================================================================
// render_command_line() property tests
// ============================================================================

proptest! {
    /// Persistent mode never carries an in-memory limit and always names the
    /// profile directory.
    #[test]
    fn prop_persistent_mode_has_no_memory_limit(
        profiles in "/[a-z0-9_]{1,12}(/[a-z0-9_.-]{1,12}){0,3}",
        store in proptest::option::of(store_config()),
    ) {
        let paths = Paths {
            profiles: PathBuf::from(&profiles),
            ..Paths::default()
        };
        let cmd = render_command_line(&ApplicationConfig::persistent(), &paths, store.as_ref())
            .unwrap();
        prop_assert!(!cmd.contains("--storage-active-memory"), "got: {}", cmd);
        let expected = format!("--storage-in-memory=false --storage-persist --storage-path={profiles}");
        prop_assert!(cmd.contains(&expected), "got: {}", cmd);
    }

    /// The in-memory limit is rendered in bytes.
    #[test]
    fn prop_memory_limit_rendered_in_bytes(mib in 1u64..=(u64::MAX / BYTES_PER_MIB)) {
        let cmd = render_command_line(&ApplicationConfig::in_memory(mib), &Paths::default(), None)
            .unwrap();
        let expected = format!("--storage-active-memory={}", mib * BYTES_PER_MIB);
        prop_assert!(cmd.ends_with(&expected), "got: {}", cmd);
    }

    /// Limits whose byte count does not fit are rejected, not wrapped.
    #[test]
    fn prop_memory_limit_overflow_rejected(mib in (u64::MAX / BYTES_PER_MIB + 1)..=u64::MAX) {
        let err = render_command_line(&ApplicationConfig::in_memory(mib), &Paths::default(), None)
            .unwrap_err();
        prop_assert_eq!(err, ContractViolation::MemoryLimitOverflow { mib });
    }

    /// Scraper-only mode is on exactly when some store field is non-empty.
    #[test]
    fn prop_scraper_only_iff_store_field_present(store in store_config()) {
        let cmd = render_command_line(&ApplicationConfig::default(), &Paths::default(), Some(&store))
            .unwrap();
        let any_field = [&store.address, &store.bearer_token, &store.insecure]
            .iter()
            .any(|v| v.as_deref().is_some_and(|v| !v.is_empty()));
        prop_assert_eq!(cmd.contains("--mode=scraper-only"), any_field, "got: {}", cmd);
        prop_assert!(!cmd.contains("= ") && !cmd.ends_with('='), "empty flag value: {}", cmd);
    }
}

// ============================================================================
// render_config() property tests
// ============================================================================

proptest! {
    /// `metrics_path` never reaches the daemon config; everything else does.
    #[test]
    fn prop_metrics_path_always_dropped(
        names in proptest::collection::vec("[a-z]{1,12}", 0..6),
        with_path in proptest::collection::vec(any::<bool>(), 6),
    ) {
        let jobs: Vec<ScrapeJob> = names
            .iter()
            .zip(&with_path)
            .map(|(name, path)| {
                let mut job = ScrapeJob::new();
                job.insert("job_name".into(), json!(name));
                if *path {
                    job.insert("metrics_path".into(), json!("/metrics"));
                }
                job
            })
            .collect();

        let config = render_config(std::path::Path::new("/var/lib/parca"), jobs);
        prop_assert_eq!(config.scrape_configs.len(), names.len());
        for (job, name) in config.scrape_configs.iter().zip(&names) {
            prop_assert!(!job.contains_key("metrics_path"));
            prop_assert_eq!(&job["job_name"], &json!(name));
        }
        let yaml = config.to_yaml().unwrap();
        prop_assert!(!yaml.contains("metrics_path"));
    }
}
