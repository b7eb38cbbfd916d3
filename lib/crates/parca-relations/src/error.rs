use thiserror::Error;

/// Errors raised while reading data published by a remote application.
#[derive(Debug, Error)]
pub enum RelationError {
    #[error("relation {relation_id} ({name}) is missing '{key}' in the remote application data")]
    MissingKey {
        relation_id: u32,
        name: String,
        key: String,
    },

    #[error("relation {relation_id} ({name}) has invalid JSON under '{key}': {source}")]
    InvalidJson {
        relation_id: u32,
        name: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot encode '{key}' for publishing: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("dashboard '{name}' is not valid JSON: {source}")]
    InvalidDashboard {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot compress dashboard '{name}': {source}")]
    Compress {
        name: String,
        #[source]
        source: std::io::Error,
    },
}
