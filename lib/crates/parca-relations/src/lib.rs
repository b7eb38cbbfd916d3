//! Relation contracts shared by Parca operators.
//!
//! Each module models one relation interface: what the providing side
//! publishes and how the requiring side reads it back. The types are plain
//! data in, data out; writing databags is left to the hosting operator.

pub mod error;
pub mod grafana;
pub mod relation;
pub mod s3;
pub mod scrape;
pub mod store;

pub use error::RelationError;
pub use grafana::{Dashboard, GrafanaDashboardProvider};
pub use relation::{Databag, Relation};
pub use s3::{S3Credentials, S3Event, S3Requirer};
pub use scrape::{
    METRICS_PATH_KEY, ProfilingEndpointConsumer, ScrapeEndpointProvider, ScrapeJob,
    ScrapeMetadata,
};
pub use store::{
    StoreConfig, StoreEndpointProvider, StoreEndpointRequirer, StoreEvent, TokenGenerator,
};
