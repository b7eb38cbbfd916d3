//! Snapshot of a single relation as seen from the local unit.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A relation databag: flat string keys to string values.
pub type Databag = BTreeMap<String, String>;

/// One established relation between the local application and a remote one.
///
/// Only the remote side's databags are held here; data published by the
/// local side is written straight through the hosting framework.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Framework-assigned relation identifier.
    pub id: u32,
    /// Local endpoint name, e.g. `profiling-endpoint`.
    pub name: String,
    /// Remote application name.
    pub app: String,
    /// Remote application databag.
    #[serde(default)]
    pub app_data: Databag,
    /// Remote unit databags keyed by unit name (`app/0`).
    #[serde(default)]
    pub units: BTreeMap<String, Databag>,
}

impl Relation {
    /// Create an empty relation snapshot.
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>, app: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            app: app.into(),
            ..Self::default()
        }
    }

    /// Read a key from the remote application databag.
    #[must_use]
    pub fn app_value(&self, key: &str) -> Option<&str> {
        self.app_data.get(key).map(String::as_str)
    }
}
