//! Consul catalog backend.
//!
//! # Responsibilities
//! - Query `/v1/catalog/service/{name}` on every lookup
//! - Translate catalog entries into service instances
//! - Degrade every failure (network, ACL, decode) into an empty result

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::config::{ConsulConfig, DiscoveryKind};
use crate::discovery::{DiscoveryBackend, DiscoveryError};
use crate::proxy::transport::Transport;
use crate::registry::ServiceInstance;

/// Upper bound on a catalog response body.
const MAX_CATALOG_BYTES: usize = 4 * 1024 * 1024;

/// One row of `/v1/catalog/service/{name}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CatalogEntry {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub service_address: String,
    pub service_port: u16,
    #[serde(default)]
    pub service_meta: Option<HashMap<String, String>>,
}

impl CatalogEntry {
    /// Convert into an instance; the service address wins over the node address.
    pub fn into_instance(self, service: &str, health_check_path: &str) -> ServiceInstance {
        let host = if self.service_address.is_empty() {
            self.address
        } else {
            self.service_address
        };
        ServiceInstance::new(service, host, self.service_port, health_check_path)
            .with_metadata(self.service_meta.unwrap_or_default())
    }
}

/// Discovery backed by a Consul agent's catalog API.
pub struct ConsulDiscovery {
    base_url: Url,
    token: Option<String>,
    datacenter: Option<String>,
    health_check_path: String,
    timeout: Duration,
    transport: Arc<dyn Transport>,
}

impl ConsulDiscovery {
    /// Validate the agent address. No network traffic happens here.
    pub fn new(config: &ConsulConfig, transport: Arc<dyn Transport>) -> Result<Self, DiscoveryError> {
        let base_url = parse_base_url(&config.address)?;

        tracing::info!(address = %base_url, datacenter = ?config.datacenter, "Consul client initialized");

        Ok(Self {
            base_url,
            token: config.token.clone(),
            datacenter: config.datacenter.clone(),
            health_check_path: config.health_check_path.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            transport,
        })
    }

    /// `{base}/v1/catalog/{segments...}?dc=...` with every segment escaped.
    fn catalog_url(&self, segments: &[&str]) -> Result<Url, DiscoveryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DiscoveryError::Config(format!("'{}' cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(["v1", "catalog"])
            .extend(segments);
        if let Some(dc) = &self.datacenter {
            url.query_pairs_mut().append_pair("dc", dc);
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, DiscoveryError> {
        let mut builder = Request::get(url.as_str());
        if let Some(token) = &self.token {
            builder = builder.header("X-Consul-Token", token);
        }
        let request = builder
            .body(Body::empty())
            .map_err(|e| DiscoveryError::Query(e.to_string()))?;

        let response = self
            .transport
            .send(request, self.timeout)
            .await
            .map_err(|e| DiscoveryError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Query(format!("catalog returned {}", status)));
        }

        let bytes = to_bytes(response.into_body(), MAX_CATALOG_BYTES)
            .await
            .map_err(|e| DiscoveryError::Connection(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| DiscoveryError::Decode(e.to_string()))
    }

    async fn query_service(&self, service: &str) -> Result<Vec<ServiceInstance>, DiscoveryError> {
        let url = self.catalog_url(&["service", service])?;
        let entries: Vec<CatalogEntry> = self.get_json(url).await?;
        Ok(entries
            .into_iter()
            .map(|entry| entry.into_instance(service, &self.health_check_path))
            .collect())
    }

    async fn query_services(&self) -> Result<Vec<String>, DiscoveryError> {
        let url = self.catalog_url(&["services"])?;
        let services: HashMap<String, Vec<String>> = self.get_json(url).await?;
        let mut names: Vec<String> = services.into_keys().filter(|name| name != "consul").collect();
        names.sort();
        Ok(names)
    }
}

/// Agent address as a base URL. Bare `host:port` means plain HTTP; the
/// transport has no TLS connector, so any other scheme is refused here.
fn parse_base_url(address: &str) -> Result<Url, DiscoveryError> {
    let address = address.trim();
    let with_scheme = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    };
    let url = Url::parse(&with_scheme)
        .map_err(|e| DiscoveryError::Config(format!("invalid Consul address '{}': {}", address, e)))?;
    if url.scheme() != "http" {
        return Err(DiscoveryError::Config(format!(
            "unsupported Consul scheme '{}' in '{}', only http is available",
            url.scheme(),
            address
        )));
    }
    Ok(url)
}

#[async_trait]
impl DiscoveryBackend for ConsulDiscovery {
    fn kind(&self) -> DiscoveryKind {
        DiscoveryKind::Consul
    }

    async fn fetch_instances(&self, service: &str) -> Result<Vec<ServiceInstance>, DiscoveryError> {
        self.query_service(service).await
    }

    async fn fetch_services(&self) -> Result<Vec<String>, DiscoveryError> {
        self.query_services().await
    }

    async fn shutdown(&self) {
        tracing::info!("Consul discovery stopped");
    }
}
