//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Service discovery backend selection and parameters.
    pub discovery: DiscoveryConfig,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Upstream client (connection pool, timeouts, balancing).
    pub upstream: UpstreamConfig,

    /// Retry configuration for the caller-side retry wrapper.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Which discovery backend is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryKind {
    #[default]
    Static,
    Consul,
    Redis,
}

impl DiscoveryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryKind::Static => "static",
            DiscoveryKind::Consul => "consul",
            DiscoveryKind::Redis => "redis",
        }
    }
}

impl fmt::Display for DiscoveryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service discovery configuration.
///
/// Only the section matching `backend` is consulted; the others keep their
/// defaults and are ignored.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Backend selector: `static`, `consul` or `redis`.
    pub backend: DiscoveryKind,

    /// Static service mapping (service name -> endpoint).
    pub services: BTreeMap<String, StaticServiceConfig>,

    /// Consul catalog settings.
    pub consul: ConsulConfig,

    /// Redis hash settings.
    pub redis: RedisConfig,
}

/// One statically mapped service endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticServiceConfig {
    pub host: String,

    pub port: u16,

    /// Path probed by the health checker.
    #[serde(default = "default_health_check_path")]
    pub health_check: String,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

fn default_health_check_path() -> String {
    "/health".to_string()
}

/// Consul catalog configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsulConfig {
    /// Consul agent address, bare or with an `http://` scheme (e.g., "localhost:8500").
    pub address: String,

    /// ACL token sent as `X-Consul-Token`.
    pub token: Option<String>,

    /// Datacenter to query; agent default when unset.
    pub datacenter: Option<String>,

    /// Health check path assigned to discovered instances.
    pub health_check_path: String,

    /// Catalog query timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            address: "localhost:8500".to_string(),
            token: None,
            datacenter: None,
            health_check_path: default_health_check_path(),
            timeout_secs: 5,
        }
    }
}

/// Redis hash configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub password: Option<String>,

    /// Prefix of the per-service hash key (`{prefix}{service}`).
    pub key_prefix: String,

    /// Health check path assigned to discovered instances.
    pub health_check_path: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            password: None,
            key_prefix: "service:".to_string(),
            health_check_path: default_health_check_path(),
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Per-probe timeout in seconds.
    pub timeout_secs: u64,

    /// Pause after a failed cycle before the loop resumes, in seconds.
    pub error_backoff_secs: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            timeout_secs: 5,
            error_backoff_secs: 5,
        }
    }
}

/// Instance selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BalancingPolicy {
    #[default]
    RoundRobin,
    Random,
}

/// Upstream client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Time allowed until upstream response headers arrive, in seconds.
    pub timeout_secs: u64,

    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Maximum in-flight upstream exchanges across the process.
    pub max_connections: usize,

    /// Maximum idle keep-alive connections per upstream host.
    pub max_idle_per_host: usize,

    /// Idle keep-alive connection lifetime in seconds.
    pub idle_timeout_secs: u64,

    /// How a healthy instance is chosen.
    pub load_balancing: BalancingPolicy,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 5,
            max_connections: 100,
            max_idle_per_host: 20,
            idle_timeout_secs: 90,
            load_balancing: BalancingPolicy::RoundRobin,
        }
    }
}

/// Backoff between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries for idempotent requests.
    pub enabled: bool,

    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,

    /// Fixed or exponential backoff.
    pub backoff: BackoffKind,

    /// Base delay between attempts in milliseconds.
    pub delay_ms: u64,

    /// Upper bound for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Largest request body buffered so it can be replayed.
    pub max_buffered_body_bytes: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_retries: 3,
            backoff: BackoffKind::Fixed,
            delay_ms: 1000,
            max_delay_ms: 10_000,
            max_buffered_body_bytes: 1024 * 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long background tasks may take to finish after shutdown starts.
    pub grace_period_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 10,
        }
    }
}
