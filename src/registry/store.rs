//! Instance registry.
//!
//! # Responsibilities
//! - Hold, per service name, the ordered list of known instances
//! - Merge fresh discovery results while keeping health state
//! - Hand out consistent snapshots to readers

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::registry::instance::ServiceInstance;

/// Immutable view of one service's instances.
pub type InstanceList = Arc<Vec<Arc<ServiceInstance>>>;

/// Maps service names to their instances.
///
/// Each bucket is replaced wholesale (copy-on-write), so a reader holding a
/// snapshot never sees a half-applied refresh. Locking is per bucket.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: DashMap<String, InstanceList>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the bucket of `service` with `discovered`.
    ///
    /// Endpoints already known keep their instance handle (and health), with
    /// metadata updated in place. New endpoints start healthy. Endpoints no
    /// longer discovered are dropped. Duplicate host:port pairs collapse onto
    /// the first occurrence.
    ///
    /// Callers pass only successful lookups: an empty `discovered` means the
    /// service is gone and its bucket is removed.
    pub fn sync(&self, service: &str, discovered: Vec<ServiceInstance>) -> InstanceList {
        // Empty results drop the bucket so unknown names never accumulate.
        if discovered.is_empty() {
            if let Some((_, gone)) = self.services.remove(service) {
                for instance in gone.iter() {
                    tracing::info!(service = %service, instance = %instance.authority(), "Instance no longer discovered, removing");
                }
            }
            return InstanceList::default();
        }

        let mut entry = self
            .services
            .entry(service.to_string())
            .or_insert_with(|| Arc::new(Vec::new()));

        let mut next: Vec<Arc<ServiceInstance>> = Vec::with_capacity(discovered.len());
        for instance in discovered {
            if next.iter().any(|known| known.same_endpoint(&instance)) {
                tracing::debug!(service = %service, instance = %instance.authority(), "Duplicate instance ignored");
                continue;
            }

            let existing = entry.iter().find(|known| known.same_endpoint(&instance));
            let kept = match existing {
                Some(known) if known.health_check_path == instance.health_check_path => {
                    if known.update_metadata(instance.metadata()) {
                        tracing::debug!(service = %service, instance = %known.authority(), "Instance metadata updated");
                    }
                    known.clone()
                }
                // A new probe path makes earlier probe results stale.
                Some(known) => {
                    instance.inherit_health(known);
                    Arc::new(instance)
                }
                None => {
                    tracing::debug!(service = %service, instance = %instance.authority(), "Instance registered");
                    Arc::new(instance)
                }
            };
            next.push(kept);
        }

        for gone in entry.iter().filter(|known| !next.iter().any(|n| n.same_endpoint(known))) {
            tracing::info!(service = %service, instance = %gone.authority(), "Instance no longer discovered, removing");
        }

        let snapshot: InstanceList = Arc::new(next);
        *entry = snapshot.clone();
        snapshot
    }

    /// Snapshot of a service's instances (empty if unknown).
    pub fn instances(&self, service: &str) -> InstanceList {
        self.services
            .get(service)
            .map(|bucket| bucket.value().clone())
            .unwrap_or_default()
    }

    /// Every instance of every service (for health checking).
    pub fn all_instances(&self) -> Vec<Arc<ServiceInstance>> {
        self.services
            .iter()
            .flat_map(|bucket| bucket.value().iter().cloned().collect::<Vec<_>>())
            .collect()
    }

    /// Names of all services with a bucket, sorted.
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.iter().map(|b| b.key().clone()).collect();
        names.sort();
        names
    }

    /// Health summary of a service's current snapshot.
    pub fn health_summary(&self, service: &str) -> ServiceHealthSummary {
        ServiceHealthSummary::from_instances(service, &self.instances(service))
    }
}

/// Body of `GET /services/{service}/health`.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealthSummary {
    pub service: String,
    pub total_instances: usize,
    pub healthy_instances: usize,
    pub instances: Vec<InstanceHealth>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceHealth {
    pub host: String,
    pub port: u16,
    pub healthy: bool,
    pub last_health_check: f64,
}

impl ServiceHealthSummary {
    pub fn from_instances(service: &str, instances: &[Arc<ServiceInstance>]) -> Self {
        let instances: Vec<InstanceHealth> = instances
            .iter()
            .map(|instance| {
                let health = instance.health();
                InstanceHealth {
                    host: instance.host.clone(),
                    port: instance.port,
                    healthy: health.healthy,
                    last_health_check: health.last_health_check,
                }
            })
            .collect();

        Self {
            service: service.to_string(),
            total_instances: instances.len(),
            healthy_instances: instances.iter().filter(|i| i.healthy).count(),
            instances,
        }
    }
}
