//! Gateway request pipeline.
//!
//! # Module Structure
//!
//! - `service` - Service lifecycle, endpoint registration and accept loop
//! - `mux` - Path multiplexer (one router per local path)
//! - `router` - Per-path dispatch by method
//! - `forwarding` - Outbound request construction and response relay
//! - `client` - Outbound HTTP client creation and configuration
//! - `tls` - PEM loading and rustls client configuration

mod client;
mod forwarding;
mod mux;
mod router;
mod service;
mod tls;

pub use client::{create_outbound_client, ClientError, OutboundClient, TransportSettings};
pub use forwarding::{empty_response, forwardable_headers, ForwardRoute};
pub use mux::PathMux;
pub use router::{RouteError, Router};
pub use service::{Service, ServiceError, ServiceState};
pub use tls::load_pem_bytes;
