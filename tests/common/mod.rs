//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use mesh_gateway::config::{GatewayConfig, StaticServiceConfig};
use mesh_gateway::lifecycle::{bootstrap, Shutdown};
use mesh_gateway::GatewayServer;

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Echo what the backend received as JSON; `/health` answers 200.
pub async fn start_echo_backend(name: &'static str) -> SocketAddr {
    async fn echo(
        State(name): State<&'static str>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> (StatusCode, [(&'static str, &'static str); 1], Json<Value>) {
        let headers: HashMap<String, String> = headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        (
            StatusCode::OK,
            [("x-backend", name)],
            Json(json!({
                "backend": name,
                "method": method.as_str(),
                "path": uri.path(),
                "query": uri.query(),
                "headers": headers,
                "body": String::from_utf8_lossy(&body),
            })),
        )
    }

    let router = Router::new()
        .route("/health", get(|| async { "ok" }))
        .fallback(echo)
        .with_state(name);
    serve(router).await
}

/// Backend whose `/health` status can be changed while running.
pub async fn start_switchable_backend(status: Arc<AtomicU16>) -> SocketAddr {
    async fn health(State(status): State<Arc<AtomicU16>>) -> StatusCode {
        StatusCode::from_u16(status.load(Ordering::SeqCst)).unwrap()
    }

    let router = Router::new()
        .route("/health", get(health))
        .fallback(|| async { "payload" })
        .with_state(status);
    serve(router).await
}

/// A local address nothing listens on.
pub async fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Static-discovery config for the given services, metrics off, checks off.
pub fn static_config(services: &[(&str, SocketAddr)]) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.observability.metrics_enabled = false;
    config.health_check.enabled = false;
    config.upstream.timeout_secs = 5;
    config.upstream.connect_timeout_secs = 1;
    config.shutdown.grace_period_secs = 2;

    let mut mapping = BTreeMap::new();
    for (name, addr) in services {
        mapping.insert(
            name.to_string(),
            StaticServiceConfig {
                host: addr.ip().to_string(),
                port: addr.port(),
                health_check: "/health".into(),
                metadata: HashMap::new(),
            },
        );
    }
    config.discovery.services = mapping;
    config
}

/// A running gateway; dropping it without `stop` leaves the task running.
pub struct TestGateway {
    pub addr: SocketAddr,
    shutdown: Shutdown,
    task: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = self.task.await;
    }
}

pub async fn spawn_gateway(config: GatewayConfig) -> TestGateway {
    let gateway = bootstrap(config).await.unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    let server = GatewayServer::new(gateway);
    let task = tokio::spawn(async move { server.run(listener, stop).await });

    TestGateway { addr, shutdown, task }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
