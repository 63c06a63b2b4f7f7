//! Request forwarding.
//!
//! # Responsibilities
//! - Reject unsupported verbs before any lookup
//! - Resolve a service through discovery and the registry
//! - Pick a healthy instance and forward the request to it
//! - Return the upstream response with its body still streaming
//!
//! # Design Decisions
//! - Exactly one attempt per call; retrying is the caller's decision
//! - Every outcome is logged and counted once
//! - A failed discovery lookup falls back to the last known instances
//! - Only resolved service names become metric labels

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, Response, Uri};
use axum::response::IntoResponse;

use crate::discovery::{self, DiscoveryBackend};
use crate::load_balancer::LoadBalancer;
use crate::observability::metrics;
use crate::proxy::error::GatewayError;
use crate::proxy::headers::{strip_hop_by_hop, upstream_request_headers};
use crate::proxy::transport::Transport;
use crate::registry::{InstanceList, ServiceInstance, ServiceRegistry};

/// An inbound call addressed to a service.
#[derive(Debug)]
pub struct ProxyRequest {
    pub service: String,
    /// Path below the service prefix, always starting with `/`.
    pub path: String,
    pub method: Method,
    pub headers: HeaderMap,
    /// Raw query string, without the leading `?`.
    pub query: Option<String>,
    pub body: Body,
}

/// A successful exchange with an upstream instance.
#[derive(Debug)]
pub struct ProxyOutcome {
    pub instance: Arc<ServiceInstance>,
    pub target_url: String,
    pub response: Response<Body>,
}

impl IntoResponse for ProxyOutcome {
    fn into_response(self) -> axum::response::Response {
        let (mut parts, body) = self.response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Response::from_parts(parts, body)
    }
}

/// Metric label for requests that never resolved to a known service.
const UNRESOLVED_SERVICE: &str = "unknown";

/// Whether the verb is forwarded and, if so, whether it carries a body.
pub fn forwards_body(method: &Method) -> Option<bool> {
    match *method {
        Method::GET | Method::DELETE => Some(false),
        Method::POST | Method::PUT | Method::PATCH => Some(true),
        _ => None,
    }
}

/// Routes calls for `/{service}/...` to a healthy instance of that service.
#[derive(Clone)]
pub struct ForwardingProxy {
    registry: Arc<ServiceRegistry>,
    discovery: Arc<dyn DiscoveryBackend>,
    balancer: Arc<dyn LoadBalancer>,
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl ForwardingProxy {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        discovery: Arc<dyn DiscoveryBackend>,
        balancer: Arc<dyn LoadBalancer>,
        transport: Arc<dyn Transport>,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            discovery,
            balancer,
            transport,
            timeout,
        }
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn discovery(&self) -> &Arc<dyn DiscoveryBackend> {
        &self.discovery
    }

    /// Fresh discovery lookup merged into the registry.
    ///
    /// When the lookup fails the registry is left untouched and its current
    /// snapshot is used, so health set by the checker survives the outage.
    pub async fn resolve(&self, service: &str) -> InstanceList {
        match self.discovery.fetch_instances(service).await {
            Ok(discovered) => self.registry.sync(service, discovered),
            Err(e) => {
                discovery::report_failure(self.discovery.kind(), Some(service), &e);
                self.registry.instances(service)
            }
        }
    }

    /// Forward one request. Never retries.
    pub async fn forward(&self, request: ProxyRequest) -> Result<ProxyOutcome, GatewayError> {
        let start = Instant::now();
        let service = request.service.clone();
        let method = request.method.clone();

        let result = self.dispatch(request).await;

        let status = match &result {
            Ok(outcome) => outcome.response.status(),
            Err(e) => e.status_code(),
        };
        metrics::record_request(metric_label(&service, &result), method.as_str(), status.as_u16(), start);

        result
    }

    async fn dispatch(&self, request: ProxyRequest) -> Result<ProxyOutcome, GatewayError> {
        let ProxyRequest {
            service,
            path,
            method,
            headers,
            query,
            body,
        } = request;

        let Some(with_body) = forwards_body(&method) else {
            tracing::warn!(service = %service, method = %method, "Unsupported method");
            return Err(GatewayError::MethodNotAllowed(method));
        };

        let instances = self.resolve(&service).await;
        if instances.is_empty() {
            tracing::warn!(service = %service, method = %method, "No available instances found");
            return Err(GatewayError::ServiceUnavailable { service });
        }

        let healthy: Vec<Arc<ServiceInstance>> =
            instances.iter().filter(|i| i.is_healthy()).cloned().collect();
        if healthy.is_empty() {
            tracing::warn!(
                service = %service,
                method = %method,
                total_instances = instances.len(),
                "No healthy instances found"
            );
            return Err(GatewayError::ServiceUnhealthy { service });
        }

        let instance = self.balancer.select(&service, &healthy)?;
        let target_url = target_url(&instance, &path, query.as_deref());
        let uri: Uri = target_url.parse().map_err(|e| {
            tracing::error!(service = %service, target_url = %target_url, error = %e, "Invalid upstream URL");
            GatewayError::InternalError(format!("invalid upstream url: {}", e))
        })?;

        let mut upstream = Request::builder()
            .method(method.clone())
            .uri(uri)
            .body(if with_body { body } else { Body::empty() })
            .map_err(|e| GatewayError::InternalError(e.to_string()))?;
        *upstream.headers_mut() = upstream_request_headers(&headers, with_body);

        tracing::info!(
            service = %service,
            method = %method,
            target_url = %target_url,
            instance = %instance.authority(),
            "Proxying request"
        );

        match self.transport.send(upstream, self.timeout).await {
            Ok(response) => {
                tracing::debug!(
                    service = %service,
                    instance = %instance.authority(),
                    status = %response.status(),
                    "Upstream responded"
                );
                Ok(ProxyOutcome {
                    instance,
                    target_url,
                    response,
                })
            }
            Err(e) => {
                tracing::error!(
                    service = %service,
                    method = %method,
                    target_url = %target_url,
                    error = %e,
                    "Upstream request failed"
                );
                Err(GatewayError::BadGateway { service, source: e })
            }
        }
    }
}

/// The service name once it resolved to instances, a fixed label otherwise.
fn metric_label<'a>(service: &'a str, result: &Result<ProxyOutcome, GatewayError>) -> &'a str {
    match result {
        Err(GatewayError::MethodNotAllowed(_)) | Err(GatewayError::ServiceUnavailable { .. }) => {
            UNRESOLVED_SERVICE
        }
        _ => service,
    }
}

fn target_url(instance: &ServiceInstance, path: &str, query: Option<&str>) -> String {
    let mut url = format!("http://{}{}", instance.authority(), path);
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(query);
    }
    url
}
