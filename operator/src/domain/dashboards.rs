//! Grafana dashboards bundled into the binary.

use parca_relations::Dashboard;

const PARCA_DASHBOARD: &str = include_str!("../../dashboards/parca.json");

#[must_use]
pub fn bundled() -> Vec<Dashboard> {
    vec![Dashboard::new("parca", PARCA_DASHBOARD)]
}
