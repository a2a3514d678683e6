//! TLS utilities for outbound connections.
//!
//! PEM material (client certificate, private key, CA bundle) can be given
//! either as a path or inline. The string is stat'ed first; anything that
//! cannot be a path on this system is taken as the PEM text itself.

use super::client::ClientError;
use crate::config::HttpConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};
use std::io;
use std::sync::Arc;
use tracing::warn;

/// Client TLS configuration plus the material it was built from.
pub struct TlsSettings {
    pub config: ClientConfig,
    pub client_chain: Vec<CertificateDer<'static>>,
    pub trust_roots: Option<Arc<RootCertStore>>,
}

/// Resolve PEM material to bytes: the contents of the file if `material`
/// names one, otherwise `material` itself.
pub fn load_pem_bytes(material: &str) -> Result<Vec<u8>, ClientError> {
    let read_error = |source: io::Error| ClientError::ReadPem {
        path: material.to_string(),
        source,
    };

    match std::fs::metadata(material) {
        Ok(_) => std::fs::read(material).map_err(read_error),
        Err(e) if cannot_be_path(&e) => Ok(material.as_bytes().to_vec()),
        Err(e) => Err(read_error(e)),
    }
}

fn cannot_be_path(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::InvalidInput
    ) || matches!(
        err.raw_os_error(),
        Some(libc::ENAMETOOLONG) | Some(libc::ENOTDIR)
    )
}

/// Every `CERTIFICATE` block, in order. Other block types are skipped.
pub fn parse_certificates(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, ClientError> {
    let mut reader = io::BufReader::new(pem);
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut reader)
        .collect::<Result<_, _>>()
        .map_err(ClientError::DecodePem)?;

    if certs.is_empty() {
        return Err(ClientError::NoCertificates);
    }
    Ok(certs)
}

/// First PKCS#8, PKCS#1 or SEC1 private key, if any.
pub fn parse_private_key(pem: &[u8]) -> Result<Option<PrivateKeyDer<'static>>, ClientError> {
    let mut reader = io::BufReader::new(pem);
    rustls_pemfile::private_key(&mut reader).map_err(ClientError::DecodePem)
}

/// Trust store holding every certificate of a CA bundle.
pub fn load_root_store(material: &str) -> Result<RootCertStore, ClientError> {
    let pem = load_pem_bytes(material)?;
    let mut reader = io::BufReader::new(pem.as_slice());

    let mut store = RootCertStore::empty();
    let certs = rustls_pemfile::certs(&mut reader)
        .filter_map(Result::ok)
        .collect::<Vec<_>>();
    let (added, ignored) = store.add_parsable_certificates(certs);
    if ignored > 0 {
        warn!("Ignored {} unparsable certificate(s) in CA bundle", ignored);
    }
    if added == 0 {
        return Err(ClientError::NoValidCaCertificates);
    }
    Ok(store)
}

fn web_pki_roots() -> RootCertStore {
    RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned())
}

/// Build the rustls client configuration for an outbound transport.
///
/// A configuration is always produced, even when no TLS option is set.
pub fn build_tls_settings(http: &HttpConfig) -> Result<TlsSettings, ClientError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let trust_roots = http
        .client_cas
        .as_deref()
        .map(load_root_store)
        .transpose()?
        .map(Arc::new);

    let builder = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(ClientError::Tls)?;

    let builder = match trust_roots {
        Some(ref roots) => builder.with_root_certificates(Arc::clone(roots)),
        None => builder.with_root_certificates(web_pki_roots()),
    };

    let (config, client_chain) = match http.client_certificate.as_deref() {
        Some(material) => {
            let cert_pem = load_pem_bytes(material)?;
            let chain = parse_certificates(&cert_pem)?;
            let key = match http.client_key.as_deref() {
                Some(key_material) => parse_private_key(&load_pem_bytes(key_material)?)?,
                None => parse_private_key(&cert_pem)?,
            }
            .ok_or(ClientError::MissingPrivateKey)?;

            let config = builder
                .with_client_auth_cert(chain.clone(), key)
                .map_err(ClientError::Tls)?;
            (config, chain)
        }
        None => (builder.with_no_client_auth(), Vec::new()),
    };

    Ok(TlsSettings {
        config,
        client_chain,
        trust_roots,
    })
}
