//! Upstream HTTP transport.
//!
//! # Responsibilities
//! - Own the process-wide pooled HTTP client
//! - Bound in-flight proxied exchanges (semaphore)
//! - Enforce a deadline until response headers arrive
//!
//! # Design Decisions
//! - One connection pool created at startup; the proxy uses the bounded view,
//!   health probes and Consul queries use `control_plane()` which skips the limit
//! - Waiting for a permit counts against the deadline
//! - The concurrency permit travels with the response body and is released when
//!   the body is fully read or dropped (client disconnect)
//! - Callers depend on the `Transport` trait so tests can count or fake calls

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use futures_util::StreamExt;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time;

use crate::config::UpstreamConfig;

/// Transport-level failure talking to an upstream.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),

    #[error("upstream connection failed: {0}")]
    Connect(String),

    #[error("upstream request failed: {0}")]
    Request(String),

    #[error("upstream connection pool closed")]
    Closed,
}

/// Executes one HTTP exchange against an upstream.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request`, waiting at most `timeout` for the response head.
    async fn send(
        &self,
        request: Request<Body>,
        timeout: Duration,
    ) -> Result<Response<Body>, TransportError>;
}

/// hyper-util pooled client with an optional global in-flight limit.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client<HttpConnector, Body>,
    permits: Option<Arc<Semaphore>>,
}

impl HttpTransport {
    pub fn new(config: &UpstreamConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(config.max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .pool_timer(TokioTimer::new())
            .build(connector);

        tracing::debug!(
            max_connections = config.max_connections,
            max_idle_per_host = config.max_idle_per_host,
            "Upstream transport created"
        );

        Self {
            client,
            permits: Some(Arc::new(Semaphore::new(config.max_connections))),
        }
    }

    /// Same connection pool without the in-flight limit, so short control
    /// requests never queue behind long-lived proxied responses.
    pub fn control_plane(&self) -> Self {
        Self {
            client: self.client.clone(),
            permits: None,
        }
    }

    /// Currently unused in-flight slots; `None` when unlimited.
    pub fn available_permits(&self) -> Option<usize> {
        self.permits.as_ref().map(|permits| permits.available_permits())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: Request<Body>,
        timeout: Duration,
    ) -> Result<Response<Body>, TransportError> {
        let exchange = async {
            let permit = match &self.permits {
                Some(permits) => Some(
                    permits
                        .clone()
                        .acquire_owned()
                        .await
                        .map_err(|_| TransportError::Closed)?,
                ),
                None => None,
            };
            let response = self.client.request(request).await.map_err(|e| {
                if e.is_connect() {
                    TransportError::Connect(e.to_string())
                } else {
                    TransportError::Request(e.to_string())
                }
            })?;
            Ok::<_, TransportError>((permit, response))
        };

        let (permit, response) = match time::timeout(timeout, exchange).await {
            Ok(result) => result?,
            Err(_) => return Err(TransportError::Timeout(timeout)),
        };

        let (parts, body) = response.into_parts();
        let stream = Body::new(body).into_data_stream().map(move |chunk| {
            let _held = &permit;
            chunk
        });

        Ok(Response::from_parts(parts, Body::from_stream(stream)))
    }
}
