//! Static service mapping backend.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::config::{DiscoveryKind, StaticServiceConfig};
use crate::discovery::{DiscoveryBackend, DiscoveryError};
use crate::registry::ServiceInstance;

/// Serves a fixed name → endpoint mapping for the whole process lifetime.
#[derive(Debug, Clone)]
pub struct StaticDiscovery {
    services: BTreeMap<String, StaticServiceConfig>,
}

impl StaticDiscovery {
    pub fn new(services: &BTreeMap<String, StaticServiceConfig>) -> Self {
        tracing::info!(
            services = ?services.keys().collect::<Vec<_>>(),
            "Static service mapping initialized"
        );
        Self {
            services: services.clone(),
        }
    }
}

#[async_trait]
impl DiscoveryBackend for StaticDiscovery {
    fn kind(&self) -> DiscoveryKind {
        DiscoveryKind::Static
    }

    async fn fetch_instances(&self, service: &str) -> Result<Vec<ServiceInstance>, DiscoveryError> {
        Ok(match self.services.get(service) {
            Some(entry) => vec![ServiceInstance::new(
                service,
                entry.host.clone(),
                entry.port,
                entry.health_check.clone(),
            )
            .with_metadata(entry.metadata.clone())],
            None => Vec::new(),
        })
    }

    async fn fetch_services(&self) -> Result<Vec<String>, DiscoveryError> {
        Ok(self.services.keys().cloned().collect())
    }

    async fn shutdown(&self) {
        tracing::debug!("Static discovery has nothing to release");
    }
}
