//! The `s3` interface: object-storage credentials from an S3 integrator.

use serde::{Deserialize, Serialize};

use crate::relation::{Databag, Relation};

pub const DEFAULT_RELATION_NAME: &str = "s3-credentials";

/// Credentials for an S3-compatible bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Credentials {
    pub bucket: String,
    /// Endpoint host (and port) without scheme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    /// Plain-HTTP endpoint, either flagged or implied by an `http://` URL.
    #[serde(default)]
    pub insecure: bool,
}

impl S3Credentials {
    /// Read credentials from an integrator's databag.
    ///
    /// Returns `None` until the bucket and both keys are published.
    #[must_use]
    pub fn from_databag(bag: &Databag) -> Option<Self> {
        let non_empty = |key: &str| bag.get(key).filter(|v| !v.is_empty()).cloned();

        let raw_endpoint = non_empty("endpoint");
        let insecure = bag.get("insecure").is_some_and(|v| v == "true")
            || raw_endpoint
                .as_deref()
                .is_some_and(|e| e.starts_with("http://"));
        let endpoint = raw_endpoint.map(|e| {
            e.trim_start_matches("https://")
                .trim_start_matches("http://")
                .trim_end_matches('/')
                .to_string()
        });

        Some(Self {
            bucket: non_empty("bucket")?,
            endpoint,
            region: non_empty("region"),
            access_key: non_empty("access-key")?,
            secret_key: non_empty("secret-key")?,
            insecure,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum S3Event {
    CredentialsChanged(S3Credentials),
    CredentialsGone,
}

/// Requirer side of the `s3` interface.
#[derive(Debug, Clone)]
pub struct S3Requirer {
    relation_name: String,
}

impl Default for S3Requirer {
    fn default() -> Self {
        Self {
            relation_name: DEFAULT_RELATION_NAME.to_string(),
        }
    }
}

impl S3Requirer {
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.relation_name
    }

    /// Incomplete credentials are reported as gone so a half-written databag
    /// never reaches the daemon configuration.
    #[must_use]
    pub fn on_relation_changed(&self, relation: &Relation) -> S3Event {
        S3Credentials::from_databag(&relation.app_data)
            .map_or(S3Event::CredentialsGone, S3Event::CredentialsChanged)
    }

    #[must_use]
    pub fn on_relation_broken(&self) -> S3Event {
        S3Event::CredentialsGone
    }
}
