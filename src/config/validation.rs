//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals and timeouts > 0, ports valid)
//! - Check that the selected discovery backend is usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{DiscoveryKind, GatewayConfig};

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be a socket address, got '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("service '{service}': {reason}")]
    InvalidService { service: String, reason: String },

    #[error("{field} must start with '/', got '{value}'")]
    InvalidPath { field: String, value: String },

    #[error("discovery.consul.address must not be empty")]
    MissingConsulAddress,

    #[error("discovery.redis.host must not be empty")]
    MissingRedisHost,
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    let positive = [
        ("health_check.interval_secs", config.health_check.interval_secs),
        ("health_check.timeout_secs", config.health_check.timeout_secs),
        ("upstream.timeout_secs", config.upstream.timeout_secs),
        ("upstream.connect_timeout_secs", config.upstream.connect_timeout_secs),
        ("upstream.max_connections", config.upstream.max_connections as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    match config.discovery.backend {
        DiscoveryKind::Static => {
            for (name, service) in &config.discovery.services {
                if service.host.trim().is_empty() {
                    errors.push(ValidationError::InvalidService {
                        service: name.clone(),
                        reason: "host must not be empty".to_string(),
                    });
                }
                if service.port == 0 {
                    errors.push(ValidationError::InvalidService {
                        service: name.clone(),
                        reason: "port must not be 0".to_string(),
                    });
                }
                check_path(
                    &mut errors,
                    format!("discovery.services.{}.health_check", name),
                    &service.health_check,
                );
            }
        }
        DiscoveryKind::Consul => {
            if config.discovery.consul.address.trim().is_empty() {
                errors.push(ValidationError::MissingConsulAddress);
            }
            if config.discovery.consul.timeout_secs == 0 {
                errors.push(ValidationError::Zero {
                    field: "discovery.consul.timeout_secs",
                });
            }
            check_path(
                &mut errors,
                "discovery.consul.health_check_path".to_string(),
                &config.discovery.consul.health_check_path,
            );
        }
        DiscoveryKind::Redis => {
            if config.discovery.redis.host.trim().is_empty() {
                errors.push(ValidationError::MissingRedisHost);
            }
            check_path(
                &mut errors,
                "discovery.redis.health_check_path".to_string(),
                &config.discovery.redis.health_check_path,
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_path(errors: &mut Vec<ValidationError>, field: String, value: &str) {
    if !value.starts_with('/') {
        errors.push(ValidationError::InvalidPath {
            field,
            value: value.to_string(),
        });
    }
}
