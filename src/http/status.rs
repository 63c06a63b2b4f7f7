//! Gateway self-checks: `/health`, `/health/ready`, `/health/live`.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::http::server::AppState;
use crate::registry::unix_now;

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": unix_now(),
        "service": "api-gateway",
    }))
}

/// Ready once bootstrap has completed, which is a precondition for serving.
pub async fn ready(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ready",
        "timestamp": unix_now(),
        "service_discovery": state.proxy.discovery().kind().as_str(),
        "known_services": state.proxy.registry().service_names().len(),
    }))
}

pub async fn live() -> Json<Value> {
    Json(json!({
        "status": "alive",
        "timestamp": unix_now(),
    }))
}
