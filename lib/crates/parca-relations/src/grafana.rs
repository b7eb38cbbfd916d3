//! `grafana_dashboard` interface, providing side.
//!
//! The leader publishes every dashboard template under a single `dashboards`
//! key. Each template body is xz-compressed and base64-encoded; Grafana's
//! side decodes it and injects the topology dropdowns.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

use crate::error::RelationError;
use crate::relation::Databag;
use crate::scrape::ScrapeMetadata;

pub const DEFAULT_RELATION_NAME: &str = "grafana-dashboard";
pub const DASHBOARDS_KEY: &str = "dashboards";

/// A dashboard template shipped with the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    /// File stem; the template is published as `file:<name>`.
    pub name: String,
    pub json: String,
}

impl Dashboard {
    #[must_use]
    pub fn new(name: impl Into<String>, json: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            json: json.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GrafanaDashboardProvider {
    dashboards: Vec<Dashboard>,
}

impl GrafanaDashboardProvider {
    #[must_use]
    pub fn new(dashboards: Vec<Dashboard>) -> Self {
        Self { dashboards }
    }

    #[must_use]
    pub fn endpoint(&self) -> &'static str {
        DEFAULT_RELATION_NAME
    }

    /// Application databag carrying every template.
    ///
    /// The `uuid` field changes whenever any template changes, so Grafana
    /// reloads on upgrade and stays quiet otherwise.
    pub fn app_data(
        &self,
        metadata: &ScrapeMetadata,
        unit_name: &str,
    ) -> Result<Databag, RelationError> {
        let mut templates = Map::new();
        for dashboard in &self.dashboards {
            serde_json::from_str::<Value>(&dashboard.json).map_err(|source| {
                RelationError::InvalidDashboard {
                    name: dashboard.name.clone(),
                    source,
                }
            })?;
            let content = compress(&dashboard.json).map_err(|source| RelationError::Compress {
                name: dashboard.name.clone(),
                source,
            })?;
            templates.insert(
                format!("file:{}", dashboard.name),
                json!({
                    "charm": metadata.charm_name,
                    "content": content,
                    "juju_topology": {
                        "model": metadata.model,
                        "model_uuid": metadata.model_uuid,
                        "application": metadata.application,
                        "unit": unit_name,
                    },
                    "inject_dropdowns": true,
                }),
            );
        }

        let revision = format!(
            "{:x}",
            Sha256::digest(
                self.dashboards
                    .iter()
                    .map(|d| d.json.as_str())
                    .collect::<String>()
            )
        );
        let payload = json!({ "templates": templates, "uuid": revision });
        let encoded =
            serde_json::to_string(&payload).map_err(|source| RelationError::Encode {
                key: DASHBOARDS_KEY.to_string(),
                source,
            })?;

        let mut bag = Databag::new();
        bag.insert(DASHBOARDS_KEY.to_string(), encoded);
        Ok(bag)
    }
}

/// xz-compress `text` and base64-encode the result.
fn compress(text: &str) -> std::io::Result<String> {
    let mut out = Vec::new();
    lzma_rs::xz_compress(&mut text.as_bytes(), &mut out)?;
    Ok(STANDARD.encode(out))
}
