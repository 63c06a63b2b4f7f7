//! Redis hash backend.
//!
//! Each service is a hash at `{key_prefix}{service}`; every field value is one
//! instance encoded as `host:port`.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use url::Url;

use crate::config::{DiscoveryKind, RedisConfig};
use crate::discovery::{DiscoveryBackend, DiscoveryError};
use crate::registry::ServiceInstance;

/// Keys fetched per SCAN round trip.
const SCAN_BATCH: usize = 100;

/// Discovery backed by Redis hashes.
pub struct RedisDiscovery {
    connection: ConnectionManager,
    key_prefix: String,
    health_check_path: String,
}

impl RedisDiscovery {
    /// Open a managed connection and verify it with PING.
    pub async fn connect(config: &RedisConfig) -> Result<Self, DiscoveryError> {
        let url = connection_url(config)?;
        let client = redis::Client::open(url.as_str())
            .map_err(|e| DiscoveryError::Config(format!("Failed to create Redis client: {}", e)))?;

        let mut connection = ConnectionManager::new(client)
            .await
            .map_err(|e| DiscoveryError::Connection(format!("Failed to connect to Redis: {}", e)))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(|e| DiscoveryError::Connection(format!("Redis PING failed: {}", e)))?;

        tracing::info!(host = %config.host, port = config.port, db = config.db, "Redis client initialized");

        Ok(Self {
            connection,
            key_prefix: config.key_prefix.clone(),
            health_check_path: config.health_check_path.clone(),
        })
    }

    fn service_key(&self, service: &str) -> String {
        format!("{}{}", self.key_prefix, service)
    }

    async fn query_service(&self, service: &str) -> Result<Vec<ServiceInstance>, DiscoveryError> {
        let mut connection = self.connection.clone();
        let fields: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(self.service_key(service))
            .query_async(&mut connection)
            .await
            .map_err(|e| DiscoveryError::Query(e.to_string()))?;

        Ok(instances_from_fields(service, &self.health_check_path, fields))
    }

    async fn query_services(&self) -> Result<Vec<String>, DiscoveryError> {
        let mut connection = self.connection.clone();
        let pattern = format!("{}*", self.key_prefix);
        let mut cursor: u64 = 0;
        let mut names = Vec::new();

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut connection)
                .await
                .map_err(|e| DiscoveryError::Query(e.to_string()))?;

            names.extend(
                keys.iter()
                    .filter_map(|key| key.strip_prefix(&self.key_prefix))
                    .filter(|name| !name.is_empty())
                    .map(String::from),
            );

            if next == 0 {
                break;
            }
            cursor = next;
        }

        names.sort();
        names.dedup();
        Ok(names)
    }
}

/// `redis://host:port/db`, with the password escaped into the userinfo.
fn connection_url(config: &RedisConfig) -> Result<Url, DiscoveryError> {
    let mut url = Url::parse(&format!("redis://{}:{}/{}", config.host, config.port, config.db))
        .map_err(|e| DiscoveryError::Config(format!("invalid Redis address: {}", e)))?;
    if let Some(password) = &config.password {
        url.set_password(Some(password))
            .map_err(|_| DiscoveryError::Config("Redis URL cannot carry a password".to_string()))?;
    }
    Ok(url)
}

/// Parse one `host:port` value.
pub fn parse_endpoint(value: &str) -> Option<(String, u16)> {
    let (host, port) = value.trim().rsplit_once(':')?;
    if host.is_empty() {
        return None;
    }
    let port: u16 = port.parse().ok()?;
    if port == 0 {
        return None;
    }
    Some((host.to_string(), port))
}

/// Turn hash fields into instances ordered by field name, skipping malformed values.
pub fn instances_from_fields(
    service: &str,
    health_check_path: &str,
    fields: HashMap<String, String>,
) -> Vec<ServiceInstance> {
    let mut fields: Vec<(String, String)> = fields.into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .into_iter()
        .filter_map(|(field, value)| match parse_endpoint(&value) {
            Some((host, port)) => Some(ServiceInstance::new(service, host, port, health_check_path)),
            None => {
                tracing::warn!(service = %service, field = %field, value = %value, "Skipping malformed instance entry");
                None
            }
        })
        .collect()
}

#[async_trait]
impl DiscoveryBackend for RedisDiscovery {
    fn kind(&self) -> DiscoveryKind {
        DiscoveryKind::Redis
    }

    async fn fetch_instances(&self, service: &str) -> Result<Vec<ServiceInstance>, DiscoveryError> {
        self.query_service(service).await
    }

    async fn fetch_services(&self) -> Result<Vec<String>, DiscoveryError> {
        self.query_services().await
    }

    async fn shutdown(&self) {
        // The connection manager closes its socket when the last clone drops.
        tracing::info!("Redis discovery stopped");
    }
}
