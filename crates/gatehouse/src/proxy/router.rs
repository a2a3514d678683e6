//! Per-path dispatch by HTTP method.

use super::client::OutboundClient;
use super::forwarding::{empty_response, ForwardRoute};
use crate::auth::CredentialInjector;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use reqwest::Url;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Request body cap for routers built without an explicit limit.
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("Could not register another handler for {method} {path}")]
    DuplicateRoute { path: String, method: Method },
    #[error("{method} {path} already has a credential injector")]
    DuplicateCredentials { path: String, method: Method },
}

/// Handlers and credential injectors for one local path.
pub struct Router {
    path: String,
    method_handlers: HashMap<Method, ForwardRoute>,
    credentials: HashMap<Method, Arc<dyn CredentialInjector>>,
    body_limit: usize,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("path", &self.path)
            .field("methods", &self.method_handlers.keys().collect::<Vec<_>>())
            .field("credentials", &self.credentials.keys().collect::<Vec<_>>())
            .field("body_limit", &self.body_limit)
            .finish()
    }
}

impl Router {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method_handlers: HashMap::new(),
            credentials: HashMap::new(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn has_route(&self, method: &Method) -> bool {
        self.method_handlers.contains_key(method)
    }

    pub fn route(&self, method: &Method) -> Option<&ForwardRoute> {
        self.method_handlers.get(method)
    }

    pub fn register_route(
        &mut self,
        local_method: Method,
        remote_url: Url,
        remote_method: Method,
        client: OutboundClient,
    ) -> Result<(), RouteError> {
        if self.method_handlers.contains_key(&local_method) {
            return Err(RouteError::DuplicateRoute {
                path: self.path.clone(),
                method: local_method,
            });
        }
        self.method_handlers.insert(
            local_method,
            ForwardRoute::new(remote_url, remote_method, client),
        );
        Ok(())
    }

    pub fn register_credentials(
        &mut self,
        method: Method,
        injector: Arc<dyn CredentialInjector>,
    ) -> Result<(), RouteError> {
        if self.credentials.contains_key(&method) {
            return Err(RouteError::DuplicateCredentials {
                path: self.path.clone(),
                method,
            });
        }
        self.credentials.insert(method, injector);
        Ok(())
    }

    /// Answer an inbound request. Unknown methods get an empty 404, bodies
    /// over the limit an empty 413.
    pub async fn serve<B>(&self, request: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = request.into_parts();

        let Some(route) = self.method_handlers.get(&parts.method) else {
            debug!("No handler for {} {}", parts.method, self.path);
            return empty_response(StatusCode::NOT_FOUND);
        };

        let body = match Limited::new(body, self.body_limit).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.is::<LengthLimitError>() => {
                warn!(
                    "Request body for {} {} exceeds {} bytes",
                    parts.method, self.path, self.body_limit
                );
                return empty_response(StatusCode::PAYLOAD_TOO_LARGE);
            }
            Err(e) => {
                error!("Failed to read request body for {} {}: {}", parts.method, self.path, e);
                return empty_response(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        let injector = self.credentials.get(&parts.method).map(Arc::as_ref);
        route.forward(&parts.headers, body, injector).await
    }
}
