//! Path multiplexer: one [`Router`] per registered local path.
//!
//! Resolution order:
//! 1. exact path match
//! 2. longest registered path ending in `/` that prefixes the request path
//! 3. nothing (empty 404)

use super::forwarding::empty_response;
use super::router::{BoxError, Router, DEFAULT_BODY_LIMIT};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug)]
pub struct PathMux {
    routers: HashMap<String, Router>,
    body_limit: usize,
}

impl Default for PathMux {
    fn default() -> Self {
        Self::with_body_limit(DEFAULT_BODY_LIMIT)
    }
}

impl PathMux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mux whose routers reject request bodies larger than `limit` bytes.
    pub fn with_body_limit(limit: usize) -> Self {
        Self {
            routers: HashMap::new(),
            body_limit: limit,
        }
    }

    /// Router for `path`, created on first use.
    pub fn router_mut(&mut self, path: &str) -> &mut Router {
        let limit = self.body_limit;
        self.routers
            .entry(path.to_string())
            .or_insert_with(|| Router::new(path).with_body_limit(limit))
    }

    pub fn len(&self) -> usize {
        self.routers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
    }

    pub fn resolve(&self, path: &str) -> Option<&Router> {
        if let Some(router) = self.routers.get(path) {
            return Some(router);
        }
        self.routers
            .iter()
            .filter(|(prefix, _)| prefix.ends_with('/') && path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, router)| router)
    }

    pub async fn dispatch<B>(&self, request: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        match self.resolve(request.uri().path()) {
            Some(router) => {
                debug!(
                    "{} {} -> router {}",
                    request.method(),
                    request.uri().path(),
                    router.path()
                );
                router.serve(request).await
            }
            None => {
                debug!("No route for {}", request.uri().path());
                empty_response(StatusCode::NOT_FOUND)
            }
        }
    }
}
