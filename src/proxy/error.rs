//! Gateway error taxonomy and its HTTP mapping.

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::load_balancer::NoHealthyInstance;
use crate::proxy::transport::TransportError;

/// Failures that reach the caller of the proxy.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No instance is registered for the service.
    #[error("Service {service} is not available")]
    ServiceUnavailable { service: String },

    /// Instances exist but none is healthy.
    #[error("Service {service} is not healthy")]
    ServiceUnhealthy { service: String },

    #[error("Method {0} not allowed")]
    MethodNotAllowed(Method),

    /// Upstream transport failure (refused, timeout, reset).
    #[error("Bad gateway: {source}")]
    BadGateway {
        service: String,
        #[source]
        source: TransportError,
    },

    /// Request body exceeded the replay buffer of the retry wrapper.
    #[error("Request body larger than {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Any other unexpected fault.
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::ServiceUnavailable { .. } | GatewayError::ServiceUnhealthy { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GatewayError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the caller. Never carries internal error text.
    pub fn public_detail(&self) -> String {
        match self {
            GatewayError::ServiceUnavailable { .. } | GatewayError::ServiceUnhealthy { .. } => {
                self.to_string()
            }
            GatewayError::MethodNotAllowed(_) => "Method not allowed".to_string(),
            GatewayError::BadGateway { .. } => "Bad gateway".to_string(),
            GatewayError::PayloadTooLarge { .. } => self.to_string(),
            GatewayError::InternalError(_) => "Internal server error".to_string(),
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::ServiceUnavailable { .. } => "service_unavailable",
            GatewayError::ServiceUnhealthy { .. } => "service_unhealthy",
            GatewayError::MethodNotAllowed(_) => "method_not_allowed",
            GatewayError::BadGateway { .. } => "bad_gateway",
            GatewayError::PayloadTooLarge { .. } => "payload_too_large",
            GatewayError::InternalError(_) => "internal_error",
        }
    }
}

impl From<NoHealthyInstance> for GatewayError {
    fn from(err: NoHealthyInstance) -> Self {
        GatewayError::ServiceUnhealthy {
            service: err.service,
        }
    }
}

/// JSON body of every gateway error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub detail: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            status: status.as_u16(),
            detail: self.public_detail(),
        };
        (status, Json(body)).into_response()
    }
}
