//! Forwarding proxy subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyRequest (service, path, method, headers, query, body)
//!     → forward.rs   verb check → discovery + registry sync → healthy filter
//!                    → load balancer → target URL
//!     → headers.rs   strip Host (and framing headers for bodiless verbs)
//!     → transport.rs pooled client, bounded in-flight, header deadline
//!     → ProxyOutcome (streamed response, hop-by-hop headers removed)
//!     or GatewayError (error.rs, JSON {status, detail})
//! ```

pub mod error;
pub mod forward;
pub mod headers;
pub mod transport;

pub use error::{ErrorBody, GatewayError};
pub use forward::{forwards_body, ForwardingProxy, ProxyOutcome, ProxyRequest};
pub use transport::{HttpTransport, Transport, TransportError};
