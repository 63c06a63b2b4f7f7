//! Service instance abstraction.
//!
//! # Responsibilities
//! - Represent a single backend endpoint of a service
//! - Track health state (healthy flag + last probe time)
//!
//! # Design Decisions
//! - Identity (service, host, port) and probe path are immutable after creation
//! - Health is swapped as one snapshot so flag and timestamp always agree
//! - Metadata is swapped in place so a refresh keeps the same instance handle
//! - Only the health checker writes health (`pub(crate)` mutators)

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwap;
use serde::Serialize;

/// Health snapshot of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    /// Seconds since the UNIX epoch of the last answered probe (0.0 = never).
    pub last_health_check: f64,
}

impl HealthStatus {
    /// Initial state: healthy, never probed.
    pub fn initial() -> Self {
        Self {
            healthy: true,
            last_health_check: 0.0,
        }
    }
}

/// A single backend endpoint of a service.
#[derive(Debug)]
pub struct ServiceInstance {
    pub service_name: String,
    pub host: String,
    pub port: u16,
    /// Path probed by the health checker (e.g. "/health").
    pub health_check_path: String,

    metadata: ArcSwap<HashMap<String, String>>,
    health: ArcSwap<HealthStatus>,
}

impl ServiceInstance {
    /// Create a new instance. Instances start healthy.
    pub fn new(
        service_name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        health_check_path: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            host: host.into(),
            port,
            health_check_path: health_check_path.into(),
            metadata: ArcSwap::from_pointee(HashMap::new()),
            health: ArcSwap::from_pointee(HealthStatus::initial()),
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = ArcSwap::from_pointee(metadata);
        self
    }

    /// Current metadata snapshot.
    pub fn metadata(&self) -> Arc<HashMap<String, String>> {
        self.metadata.load_full()
    }

    /// Replace the metadata. Returns false when nothing changed.
    pub(crate) fn update_metadata(&self, metadata: Arc<HashMap<String, String>>) -> bool {
        if *self.metadata.load_full() == *metadata {
            return false;
        }
        self.metadata.store(metadata);
        true
    }

    /// `host:port`, also used as the instance label in logs and metrics.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// URL probed by the health checker.
    pub fn health_check_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.health_check_path)
    }

    /// True when `other` designates the same endpoint.
    pub fn same_endpoint(&self, other: &ServiceInstance) -> bool {
        self.host == other.host && self.port == other.port
    }

    /// Current health snapshot.
    pub fn health(&self) -> HealthStatus {
        **self.health.load()
    }

    pub fn is_healthy(&self) -> bool {
        self.health.load().healthy
    }

    pub fn last_health_check(&self) -> f64 {
        self.health.load().last_health_check
    }

    // --- Health Logic (health checker only) ---

    /// Record an answered probe. Returns the previous flag.
    pub(crate) fn record_probe(&self, healthy: bool) -> bool {
        let previous = self.health.swap(Arc::new(HealthStatus {
            healthy,
            last_health_check: unix_now(),
        }));
        previous.healthy
    }

    /// Record a probe that got no answer; the timestamp is left untouched.
    /// Returns the previous flag.
    pub(crate) fn record_unreachable(&self) -> bool {
        let mut previous = true;
        self.health.rcu(|current| {
            previous = current.healthy;
            HealthStatus {
                healthy: false,
                last_health_check: current.last_health_check,
            }
        });
        previous
    }

    /// Carry health state over from a previous incarnation of this endpoint.
    pub(crate) fn inherit_health(&self, from: &ServiceInstance) {
        self.health.store(Arc::new(from.health()));
    }
}

impl fmt::Display for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.service_name, self.host, self.port)
    }
}

/// Seconds since the UNIX epoch.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
