//! Scrape-target relations (`parca_scrape` and `prometheus_scrape`).
//!
//! A provider publishes job templates plus the topology of its application;
//! each of its units publishes its own address. The consumer combines both
//! into concrete, topology-labelled scrape jobs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::RelationError;
use crate::relation::{Databag, Relation};

/// An opaque scrape job mapping. Key order is preserved.
pub type ScrapeJob = Map<String, Value>;

/// Parca's scrape config schema has no equivalent of this key.
pub const METRICS_PATH_KEY: &str = "metrics_path";

pub const SCRAPE_JOBS_KEY: &str = "scrape_jobs";
pub const SCRAPE_METADATA_KEY: &str = "scrape_metadata";

pub const PROFILING_RELATION_NAME: &str = "profiling-endpoint";
pub const SELF_PROFILING_RELATION_NAME: &str = "self-profiling-endpoint";
pub const METRICS_RELATION_NAME: &str = "metrics-endpoint";

const PARCA_PREFIX: &str = "parca";
const PROMETHEUS_PREFIX: &str = "prometheus";

/// Keys a consumer passes through from a provider's job template.
const ALLOWED_JOB_KEYS: &[&str] = &[
    "job_name",
    "metrics_path",
    "static_configs",
    "scrape_interval",
    "scrape_timeout",
    "scheme",
    "params",
    "honor_labels",
    "honor_timestamps",
    "basic_auth",
    "tls_config",
    "relabel_configs",
    "profiling_config",
];

/// Topology of the application publishing scrape jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeMetadata {
    pub model: String,
    pub model_uuid: String,
    pub application: String,
    pub charm_name: String,
}

impl ScrapeMetadata {
    fn job_prefix(&self) -> String {
        let short_uuid = self.model_uuid.split('-').next().unwrap_or_default();
        format!("{}_{short_uuid}_{}", self.model, self.application)
    }

    fn labels(&self) -> Map<String, Value> {
        let mut labels = Map::new();
        labels.insert("juju_model".into(), json!(self.model));
        labels.insert("juju_model_uuid".into(), json!(self.model_uuid));
        labels.insert("juju_application".into(), json!(self.application));
        labels.insert("juju_charm".into(), json!(self.charm_name));
        labels
    }
}

/// Publishes scrape job templates for the local application.
#[derive(Debug, Clone)]
pub struct ScrapeEndpointProvider {
    relation_name: String,
    prefix: &'static str,
    jobs: Vec<ScrapeJob>,
}

impl ScrapeEndpointProvider {
    /// Provider for a Prometheus `metrics-endpoint` relation.
    #[must_use]
    pub fn metrics(jobs: Vec<ScrapeJob>) -> Self {
        Self {
            relation_name: METRICS_RELATION_NAME.to_string(),
            prefix: PROMETHEUS_PREFIX,
            jobs,
        }
    }

    /// Provider for a Parca profiling relation, e.g. `self-profiling-endpoint`.
    #[must_use]
    pub fn profiling(relation_name: impl Into<String>, jobs: Vec<ScrapeJob>) -> Self {
        Self {
            relation_name: relation_name.into(),
            prefix: PARCA_PREFIX,
            jobs,
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.relation_name
    }

    /// Application databag: job templates and topology, both JSON-encoded.
    pub fn app_data(&self, metadata: &ScrapeMetadata) -> Result<Databag, RelationError> {
        let encode = |key: &str, value: serde_json::Result<String>| {
            value.map_err(|source| RelationError::Encode {
                key: key.to_string(),
                source,
            })
        };
        let mut bag = Databag::new();
        bag.insert(
            SCRAPE_JOBS_KEY.to_string(),
            encode(SCRAPE_JOBS_KEY, serde_json::to_string(&self.jobs))?,
        );
        bag.insert(
            SCRAPE_METADATA_KEY.to_string(),
            encode(SCRAPE_METADATA_KEY, serde_json::to_string(metadata))?,
        );
        Ok(bag)
    }

    /// Unit databag: where this unit can be scraped.
    #[must_use]
    pub fn unit_data(&self, unit_address: &str, unit_name: &str) -> Databag {
        let mut bag = Databag::new();
        bag.insert(
            format!("{}_scrape_unit_address", self.prefix),
            unit_address.to_string(),
        );
        bag.insert(
            format!("{}_scrape_unit_name", self.prefix),
            unit_name.to_string(),
        );
        bag
    }
}

/// Builds concrete profiling jobs from every related provider.
#[derive(Debug, Clone)]
pub struct ProfilingEndpointConsumer {
    relation_name: String,
}

impl Default for ProfilingEndpointConsumer {
    fn default() -> Self {
        Self::new(PROFILING_RELATION_NAME)
    }
}

impl ProfilingEndpointConsumer {
    #[must_use]
    pub fn new(relation_name: impl Into<String>) -> Self {
        Self {
            relation_name: relation_name.into(),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.relation_name
    }

    /// Jobs from every relation on this endpoint. Relations with malformed
    /// data are skipped; use [`relation_jobs`](Self::relation_jobs) to see why.
    #[must_use]
    pub fn jobs(&self, relations: &[Relation]) -> Vec<ScrapeJob> {
        relations
            .iter()
            .filter(|r| r.name == self.relation_name)
            .filter_map(|r| self.relation_jobs(r).ok())
            .flatten()
            .collect()
    }

    /// Jobs derived from a single relation.
    ///
    /// A provider that has not yet published `scrape_jobs` yields no jobs.
    pub fn relation_jobs(&self, relation: &Relation) -> Result<Vec<ScrapeJob>, RelationError> {
        let Some(raw_jobs) = relation.app_value(SCRAPE_JOBS_KEY) else {
            return Ok(Vec::new());
        };
        let templates: Vec<ScrapeJob> =
            serde_json::from_str(raw_jobs).map_err(|source| invalid(relation, SCRAPE_JOBS_KEY, source))?;

        let raw_meta =
            relation
                .app_value(SCRAPE_METADATA_KEY)
                .ok_or_else(|| RelationError::MissingKey {
                    relation_id: relation.id,
                    name: relation.name.clone(),
                    key: SCRAPE_METADATA_KEY.to_string(),
                })?;
        let metadata: ScrapeMetadata = serde_json::from_str(raw_meta)
            .map_err(|source| invalid(relation, SCRAPE_METADATA_KEY, source))?;

        let units = unit_addresses(relation);
        Ok(templates
            .iter()
            .map(|t| expand_job(t, &metadata, &units))
            .collect())
    }
}

fn invalid(relation: &Relation, key: &str, source: serde_json::Error) -> RelationError {
    RelationError::InvalidJson {
        relation_id: relation.id,
        name: relation.name.clone(),
        key: key.to_string(),
        source,
    }
}

/// `(unit name, address)` for every remote unit that published an address.
fn unit_addresses(relation: &Relation) -> Vec<(String, String)> {
    let address_key = format!("{PARCA_PREFIX}_scrape_unit_address");
    let name_key = format!("{PARCA_PREFIX}_scrape_unit_name");
    relation
        .units
        .iter()
        .filter_map(|(unit, bag)| {
            let addr = bag.get(&address_key)?;
            let name = bag.get(&name_key).unwrap_or(unit);
            Some((name.clone(), addr.clone()))
        })
        .collect()
}

fn expand_job(template: &ScrapeJob, meta: &ScrapeMetadata, units: &[(String, String)]) -> ScrapeJob {
    let mut job: ScrapeJob = template
        .iter()
        .filter(|(k, _)| ALLOWED_JOB_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let job_name = match template.get("job_name").and_then(Value::as_str) {
        Some(name) => format!("{}_{name}", meta.job_prefix()),
        None => meta.job_prefix(),
    };
    job.insert("job_name".into(), json!(job_name));

    let mut static_configs = Vec::new();
    let mut has_wildcard = false;
    let templates = template
        .get("static_configs")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for config in &templates {
        let mut labels = config
            .get("labels")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        labels.extend(meta.labels());

        let targets: Vec<&str> = config
            .get("targets")
            .and_then(Value::as_array)
            .map(|t| t.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let (wildcard, fixed): (Vec<&str>, Vec<&str>) =
            targets.into_iter().partition(|t| t.starts_with("*:"));

        if !fixed.is_empty() {
            static_configs.push(json!({ "targets": fixed, "labels": labels }));
        }
        if wildcard.is_empty() {
            continue;
        }
        has_wildcard = true;
        for (unit_name, address) in units {
            let mut unit_labels = labels.clone();
            unit_labels.insert("juju_unit".into(), json!(unit_name));
            let unit_targets: Vec<String> = wildcard
                .iter()
                .map(|t| format!("{address}{}", &t[1..]))
                .collect();
            static_configs.push(json!({ "targets": unit_targets, "labels": unit_labels }));
        }
    }
    job.insert("static_configs".into(), Value::Array(static_configs));

    if has_wildcard {
        let mut relabel = job
            .get("relabel_configs")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        relabel.push(json!({
            "source_labels": ["juju_model", "juju_model_uuid", "juju_application", "juju_unit"],
            "separator": "_",
            "target_label": "instance",
            "regex": "(.*)",
        }));
        job.insert("relabel_configs".into(), Value::Array(relabel));
    }
    job
}
