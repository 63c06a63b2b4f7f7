//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with introspection and proxy routes
//! - Wire up middleware (request ID, tracing)
//! - Run the health checker alongside the listener
//! - Shut down in order: listener, health checker, discovery

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::{Path, State},
    http::{header, Request},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::discovery::DiscoveryBackend;
use crate::health::HealthChecker;
use crate::http::request::{request_span, service_relative_path, UuidRequestId, X_REQUEST_ID};
use crate::http::{services, status};
use crate::lifecycle::{shutdown, Gateway};
use crate::proxy::{ForwardingProxy, GatewayError, ProxyOutcome, ProxyRequest};
use crate::resilience::retries::should_retry_method;
use crate::resilience::RetryPolicy;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub proxy: ForwardingProxy,
    /// Present when retries are enabled.
    pub retry: Option<RetryPolicy>,
    pub max_buffered_body_bytes: usize,
}

/// HTTP front of the gateway.
pub struct GatewayServer {
    router: Router,
    health_checker: HealthChecker,
    discovery: Arc<dyn DiscoveryBackend>,
    grace_period: Duration,
}

impl GatewayServer {
    pub fn new(gateway: Gateway) -> Self {
        let config = &gateway.config;
        let state = AppState {
            proxy: gateway.proxy.clone(),
            retry: config
                .retries
                .enabled
                .then(|| RetryPolicy::from_config(&config.retries)),
            max_buffered_body_bytes: config.retries.max_buffered_body_bytes,
        };

        Self {
            router: Self::build_router(state),
            health_checker: gateway.health_checker,
            discovery: gateway.discovery,
            grace_period: Duration::from_secs(config.shutdown.grace_period_secs),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(status::health))
            .route("/health/ready", get(status::ready))
            .route("/health/live", get(status::live))
            .route("/services", get(services::list_services))
            .route("/services/{service}/health", get(services::service_health))
            .route("/services/{service}/info", get(services::service_info))
            .route("/{service}", any(proxy_handler))
            .route("/{service}/", any(proxy_handler))
            .route("/{service}/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
                    .layer(TraceLayer::new_for_http().make_span_with(request_span))
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID)),
            )
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `stop` fires, then drain and stop background tasks.
    pub async fn run(
        self,
        listener: TcpListener,
        stop: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let health = self.health_checker.spawn();

        let served = axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(stop))
            .await;

        tracing::info!("Listener closed, stopping background tasks");
        health.stop(self.grace_period).await;
        self.discovery.shutdown().await;

        tracing::info!("HTTP server stopped");
        served
    }
}

/// Forwards `/{service}/...` to an instance of `service`.
async fn proxy_handler(
    State(state): State<AppState>,
    Path(params): Path<Vec<(String, String)>>,
    request: Request<Body>,
) -> Response {
    let service = params
        .into_iter()
        .find_map(|(name, value)| (name == "service").then_some(value))
        .unwrap_or_default();

    let (parts, body) = request.into_parts();
    let proxied = ProxyRequest {
        service,
        path: service_relative_path(parts.uri.path()),
        method: parts.method,
        headers: parts.headers,
        query: parts.uri.query().map(str::to_string),
        body,
    };

    let result = match &state.retry {
        Some(policy) if should_retry_method(&proxied.method) => {
            forward_with_retries(&state, policy, proxied).await
        }
        _ => state.proxy.forward(proxied).await,
    };

    match result {
        Ok(outcome) => outcome.into_response(),
        Err(e) => e.into_response(),
    }
}

/// Buffer the body so each attempt can replay it.
async fn forward_with_retries(
    state: &AppState,
    policy: &RetryPolicy,
    request: ProxyRequest,
) -> Result<ProxyOutcome, GatewayError> {
    let limit = state.max_buffered_body_bytes;
    let declared = request
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        tracing::warn!(service = %request.service, limit, "Request body too large to retry");
        return Err(GatewayError::PayloadTooLarge { limit });
    }

    let ProxyRequest {
        service,
        path,
        method,
        headers,
        query,
        body,
    } = request;

    let bytes = to_bytes(body, limit).await.map_err(|e| {
        tracing::warn!(service = %service, limit, error = %e, "Failed to buffer request body");
        GatewayError::PayloadTooLarge { limit }
    })?;

    let proxy = &state.proxy;
    let (service, path, method, headers, query, bytes) =
        (&service, &path, &method, &headers, &query, &bytes);
    policy
        .run(move || {
            proxy.forward(ProxyRequest {
                service: service.clone(),
                path: path.clone(),
                method: method.clone(),
                headers: headers.clone(),
                query: query.clone(),
                body: Body::from(bytes.clone()),
            })
        })
        .await
}
