//! Gatehouse: a small API gateway.
//!
//! Each configured endpoint maps a local (path, method) pair to an upstream
//! URL. Forwarded calls can carry credentials the caller never sees (static
//! headers, HTTP Basic, OAuth2 client credentials) and can go out through a
//! proxy or over mutual TLS.

pub mod auth;
pub mod config;
pub mod proxy;

#[cfg(test)]
mod test_support;

pub use config::{Config, Endpoint};
pub use proxy::{Service, ServiceError, ServiceState};
