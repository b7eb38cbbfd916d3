//! The `parca_store` interface: where to send profiles and how to authenticate.
//!
//! The provider (a Parca server, or a hosted store) publishes its address, a
//! bearer token and whether TLS should be skipped. The requirer (a Parca
//! instance acting as a scraper, or an agent) turns that data into a
//! [`StoreConfig`].

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::relation::{Databag, Relation};

pub const DEFAULT_RELATION_NAME: &str = "parca-store-endpoint";

pub const ADDRESS_KEY: &str = "remote-store-address";
pub const BEARER_TOKEN_KEY: &str = "remote-store-bearer-token";
pub const INSECURE_KEY: &str = "remote-store-insecure";

/// Remote store descriptor received over a store relation.
///
/// Every field is optional: a key the provider never wrote stays `None`.
/// Whether the store is configured at all is expressed by wrapping this in
/// an `Option` at the call site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(
        rename = "remote-store-address",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub address: Option<String>,
    #[serde(
        rename = "remote-store-bearer-token",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub bearer_token: Option<String>,
    #[serde(
        rename = "remote-store-insecure",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub insecure: Option<String>,
}

impl StoreConfig {
    /// Build a store config from a remote application databag.
    #[must_use]
    pub fn from_databag(bag: &Databag) -> Self {
        Self {
            address: bag.get(ADDRESS_KEY).cloned(),
            bearer_token: bag.get(BEARER_TOKEN_KEY).cloned(),
            insecure: bag.get(INSECURE_KEY).cloned(),
        }
    }

    /// Returns `true` when no field carries a non-empty value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        [&self.address, &self.bearer_token, &self.insecure]
            .iter()
            .all(|v| v.as_deref().is_none_or(str::is_empty))
    }
}

/// Produces a bearer token for each relation the provider publishes to.
pub type TokenGenerator = Box<dyn Fn() -> String + Send + Sync>;

/// Publishes store connection details to every related requirer.
pub struct StoreEndpointProvider {
    relation_name: String,
    port: u16,
    insecure: bool,
    external_url: Option<String>,
    token_generator: TokenGenerator,
}

impl StoreEndpointProvider {
    /// Create a provider listening on `port`. TLS is assumed unless
    /// [`insecure`](Self::insecure) is set, and tokens are empty until a
    /// generator is supplied.
    #[must_use]
    pub fn new(port: u16) -> Self {
        Self {
            relation_name: DEFAULT_RELATION_NAME.to_string(),
            port,
            insecure: false,
            external_url: None,
            token_generator: Box::new(String::new),
        }
    }

    #[must_use]
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Advertise the hostname of `url` instead of the unit's own address.
    /// Used when the store sits behind an ingress.
    #[must_use]
    pub fn external_url(mut self, url: impl Into<String>) -> Self {
        self.external_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn token_generator(mut self, generator: TokenGenerator) -> Self {
        self.token_generator = generator;
        self
    }

    #[must_use]
    pub fn relation_name(mut self, name: impl Into<String>) -> Self {
        self.relation_name = name.into();
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.relation_name
    }

    /// Resolve the `host:port` address to advertise.
    ///
    /// Precedence: external URL hostname, then the relation bind address when
    /// it parses as an IP address, then `fqdn`.
    #[must_use]
    pub fn resolve_address(&self, bind_address: Option<&str>, fqdn: &str) -> String {
        let external_host = self
            .external_url
            .as_deref()
            .and_then(|u| url::Url::parse(u).ok())
            .and_then(|u| u.host_str().map(str::to_owned));

        let host = match (external_host, bind_address) {
            (Some(host), _) => host,
            (None, Some(addr)) if addr.parse::<IpAddr>().is_ok() => addr.to_string(),
            _ => fqdn.to_string(),
        };
        format!("{host}:{}", self.port)
    }

    /// Application data to publish on one relation. The token generator is
    /// invoked once per call.
    #[must_use]
    pub fn relation_data(&self, bind_address: Option<&str>, fqdn: &str) -> Databag {
        let mut bag = Databag::new();
        bag.insert(
            ADDRESS_KEY.to_string(),
            self.resolve_address(bind_address, fqdn),
        );
        bag.insert(BEARER_TOKEN_KEY.to_string(), (self.token_generator)());
        bag.insert(INSECURE_KEY.to_string(), self.insecure.to_string());
        bag
    }
}

/// Domain events raised by [`StoreEndpointRequirer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The provider published (new) connection details.
    EndpointsChanged {
        relation_id: u32,
        store_config: StoreConfig,
    },
    /// The provider went away; any store config derived from it must be dropped.
    RemoveStore { relation_id: u32 },
}

/// Reads store connection details published by a provider.
#[derive(Debug, Clone)]
pub struct StoreEndpointRequirer {
    relation_name: String,
}

impl Default for StoreEndpointRequirer {
    fn default() -> Self {
        Self::new(DEFAULT_RELATION_NAME)
    }
}

impl StoreEndpointRequirer {
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

    #[must_use]
    pub fn on_relation_changed(&self, relation: &Relation) -> StoreEvent {
        StoreEvent::EndpointsChanged {
            relation_id: relation.id,
            store_config: StoreConfig::from_databag(&relation.app_data),
        }
    }

    #[must_use]
    pub fn on_relation_departed(&self, relation: &Relation) -> StoreEvent {
        StoreEvent::RemoveStore {
            relation_id: relation.id,
        }
    }

    /// Store config of the first formed relation on this endpoint, or `None`
    /// when no such relation exists.
    #[must_use]
    pub fn config(&self, relations: &[Relation]) -> Option<StoreConfig> {
        relations
            .iter()
            .find(|r| r.name == self.relation_name)
            .map(|r| StoreConfig::from_databag(&r.app_data))
    }
}
