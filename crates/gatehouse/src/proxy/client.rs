//! Outbound HTTP client creation and configuration.
//!
//! This module turns an [`HttpConfig`] into the shared client used to reach
//! upstreams and token endpoints.

use super::tls::build_tls_settings;
use crate::config::{ConnectionPoolConfig, HttpConfig};
use reqwest::Url;
use rustls::pki_types::CertificateDer;
use rustls::RootCertStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid proxy URL '{url}': {reason}")]
    InvalidProxy { url: String, reason: String },
    #[error("Failed to read PEM file '{path}': {source}")]
    ReadPem {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to decode PEM data: {0}")]
    DecodePem(#[source] std::io::Error),
    #[error("No certificates found in client certificate material")]
    NoCertificates,
    #[error("Could not read any PEM format certificate from the CA bundle")]
    NoValidCaCertificates,
    #[error("No private key found for the client certificate")]
    MissingPrivateKey,
    #[error("TLS configuration error: {0}")]
    Tls(#[source] rustls::Error),
    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

/// What an [`OutboundClient`] was configured with.
#[derive(Debug)]
pub struct TransportSettings {
    proxy: Option<Url>,
    client_chain: Vec<CertificateDer<'static>>,
    trust_roots: Option<Arc<RootCertStore>>,
    timeout: Option<Duration>,
}

impl TransportSettings {
    pub fn proxy(&self) -> Option<&Url> {
        self.proxy.as_ref()
    }

    /// Certificate chain presented to upstreams; empty without mTLS.
    pub fn client_chain(&self) -> &[CertificateDer<'static>] {
        &self.client_chain
    }

    /// Custom trust roots; `None` means the web PKI roots are used.
    pub fn trust_roots(&self) -> Option<&RootCertStore> {
        self.trust_roots.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Shared HTTP client bound to one transport configuration.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct OutboundClient {
    http: reqwest::Client,
    transport: Arc<TransportSettings>,
}

impl OutboundClient {
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn transport(&self) -> &TransportSettings {
        &self.transport
    }

    pub async fn execute(&self, request: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.http.execute(request).await
    }
}

/// Create an outbound client with connection pooling.
///
/// # Arguments
/// * `http` - Proxy, TLS and timeout settings
/// * `pool` - Connection pool settings
pub fn create_outbound_client(
    http: &HttpConfig,
    pool: &ConnectionPoolConfig,
) -> Result<OutboundClient, ClientError> {
    let tls = build_tls_settings(http)?;

    let mut builder = reqwest::Client::builder()
        .use_preconfigured_tls(tls.config)
        .pool_max_idle_per_host(pool.max_idle_per_host)
        .pool_idle_timeout(Duration::from_secs(pool.idle_timeout_secs))
        .tcp_keepalive(Duration::from_secs(pool.keepalive_timeout_secs))
        .connect_timeout(Duration::from_secs(pool.connect_timeout_secs));

    let proxy = match http.proxy_server.as_deref() {
        Some(raw) => {
            let invalid = |reason: String| ClientError::InvalidProxy {
                url: raw.to_string(),
                reason,
            };
            let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
            let proxy = reqwest::Proxy::all(url.clone()).map_err(|e| invalid(e.to_string()))?;
            builder = builder.proxy(proxy);
            Some(url)
        }
        // Environment proxies are only honoured when configured explicitly
        None => {
            builder = builder.no_proxy();
            None
        }
    };

    let timeout = http.timeout();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    let client = builder.build().map_err(ClientError::Build)?;

    info!(
        "Outbound client configured: proxy={}, client_cert={}, custom_roots={}, timeout={:?}",
        proxy.as_ref().map(Url::as_str).unwrap_or("none"),
        !tls.client_chain.is_empty(),
        tls.trust_roots.is_some(),
        timeout
    );

    Ok(OutboundClient {
        http: client,
        transport: Arc::new(TransportSettings {
            proxy,
            client_chain: tls.client_chain,
            trust_roots: tls.trust_roots,
            timeout,
        }),
    })
}
