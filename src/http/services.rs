//! Service introspection endpoints.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::http::server::AppState;
use crate::registry::ServiceHealthSummary;

/// Body of `GET /services`.
#[derive(Debug, Serialize)]
pub struct ServiceList {
    pub services: Vec<String>,
    pub service_discovery_type: &'static str,
}

/// Body of `GET /services/{service}/info`.
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: String,
    pub instances: Vec<InstanceInfo>,
}

#[derive(Debug, Serialize)]
pub struct InstanceInfo {
    pub host: String,
    pub port: u16,
    pub healthy: bool,
    pub metadata: HashMap<String, String>,
}

pub async fn list_services(State(state): State<AppState>) -> Json<ServiceList> {
    let discovery = state.proxy.discovery();
    let mut services = discovery.list_services().await;
    services.extend(state.proxy.registry().service_names());
    services.sort();
    services.dedup();

    Json(ServiceList {
        services,
        service_discovery_type: discovery.kind().as_str(),
    })
}

pub async fn service_health(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> Json<ServiceHealthSummary> {
    let instances = state.proxy.resolve(&service).await;
    Json(ServiceHealthSummary::from_instances(&service, &instances))
}

pub async fn service_info(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> Json<ServiceInfo> {
    let instances = state.proxy.resolve(&service).await;
    let instances = instances
        .iter()
        .map(|instance| InstanceInfo {
            host: instance.host.clone(),
            port: instance.port,
            healthy: instance.is_healthy(),
            metadata: instance.metadata().as_ref().clone(),
        })
        .collect();

    Json(ServiceInfo { service, instances })
}
