//! Request forwarding to the configured upstream.
//!
//! A [`ForwardRoute`] turns an inbound request into the outbound one:
//! fixed upstream URL and method, inbound body, inbound headers minus the
//! hop-by-hop set. The upstream status and body are relayed; headers are not,
//! so the upstream is never offered a content coding the caller could not
//! be told about.

use super::client::OutboundClient;
use crate::auth::CredentialInjector;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{self, HeaderMap, HeaderName};
use hyper::{Method, Response, StatusCode};
use reqwest::Url;
use tracing::{debug, error, warn};

/// Headers that describe the inbound connection rather than the message.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Response with `status` and no body.
pub fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

/// Inbound headers that may be sent upstream.
///
/// Drops `host` and `content-length` (the client derives both),
/// `accept-encoding` (relayed bodies must stay identity-encoded), the
/// hop-by-hop headers and any header listed in `Connection`.
pub fn forwardable_headers(inbound: &HeaderMap) -> HeaderMap {
    let listed: Vec<HeaderName> = inbound
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    let mut headers = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound {
        if name == header::HOST
            || name == header::CONTENT_LENGTH
            || name == header::ACCEPT_ENCODING
            || HOP_BY_HOP.contains(name)
            || listed.contains(name)
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Upstream target of one (path, method) route.
#[derive(Debug, Clone)]
pub struct ForwardRoute {
    remote_url: Url,
    remote_method: Method,
    client: OutboundClient,
}

impl ForwardRoute {
    pub fn new(remote_url: Url, remote_method: Method, client: OutboundClient) -> Self {
        Self {
            remote_url,
            remote_method,
            client,
        }
    }

    pub fn remote_url(&self) -> &Url {
        &self.remote_url
    }

    fn outbound_request(&self, headers: &HeaderMap, body: Bytes) -> reqwest::Request {
        let mut request =
            reqwest::Request::new(self.remote_method.clone(), self.remote_url.clone());
        *request.headers_mut() = forwardable_headers(headers);
        *request.body_mut() = Some(body.into());
        request
    }

    /// Send the call upstream and relay the answer.
    ///
    /// Any failure, including a failed credential injection, yields a 500
    /// with an empty body.
    pub async fn forward(
        &self,
        headers: &HeaderMap,
        body: Bytes,
        injector: Option<&dyn CredentialInjector>,
    ) -> Response<Full<Bytes>> {
        let mut request = self.outbound_request(headers, body);

        if let Some(injector) = injector {
            if let Err(e) = injector.inject_credentials(&mut request).await {
                warn!(
                    "Credential injection ({}) failed for {} {}: {}",
                    injector.scheme(),
                    self.remote_method,
                    self.remote_url,
                    e
                );
                return empty_response(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }

        debug!("Forwarding to: {} {}", self.remote_method, self.remote_url);

        let upstream = match self.client.execute(request).await {
            Ok(upstream) => upstream,
            Err(e) => {
                error!(
                    "Failed to forward request to {} {}: {}",
                    self.remote_method, self.remote_url, e
                );
                return empty_response(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        let status = upstream.status();
        match upstream.bytes().await {
            Ok(body) => {
                let mut response = Response::new(Full::new(body));
                *response.status_mut() = status;
                response
            }
            Err(e) => {
                error!(
                    "Failed to read upstream response from {}: {}",
                    self.remote_url, e
                );
                empty_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}
