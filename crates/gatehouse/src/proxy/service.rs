//! The gateway service: endpoint registration, listener and lifecycle.
//!
//! ```text
//! Created --start/serve--> Running --stop--> Stopped
//! ```
//!
//! Endpoints can only be registered while `Created`. Once serving, the path
//! multiplexer is shared read-only by every connection task.

use super::client::{create_outbound_client, ClientError, OutboundClient};
use super::mux::PathMux;
use super::router::RouteError;
use crate::auth::{build_injector, AuthError};
use crate::config::{Config, ConnectionPoolConfig, Endpoint, EndpointError};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use parking_lot::Mutex;
use std::convert::Infallible;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Extra time `stop` allows beyond the drain timeout for `serve` to report.
const STOP_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Created,
    Running,
    Stopped,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceState::Created => "created",
            ServiceState::Running => "running",
            ServiceState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Cannot {operation} while the service is {state}")]
    InvalidState {
        operation: &'static str,
        state: ServiceState,
    },
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

pub struct Service {
    addr: SocketAddr,
    shutdown_timeout: Duration,
    pool: ConnectionPoolConfig,
    default_client: OutboundClient,
    mux: Arc<PathMux>,
    state: Mutex<ServiceState>,
    local_addr: Mutex<Option<SocketAddr>>,
    shutdown_tx: watch::Sender<bool>,
    drained_tx: watch::Sender<bool>,
}

impl Service {
    /// Create a service with no endpoints. Builds the default outbound client.
    pub fn new(config: &Config) -> Result<Self, ServiceError> {
        let default_client = create_outbound_client(&config.http, &config.connection_pool)?;
        let (shutdown_tx, _) = watch::channel(false);
        let (drained_tx, _) = watch::channel(false);

        Ok(Self {
            addr: config.listen.socket_addr(),
            shutdown_timeout: config.listen.shutdown_timeout(),
            pool: config.connection_pool.clone(),
            default_client,
            mux: Arc::new(PathMux::with_body_limit(config.listen.max_body_bytes)),
            state: Mutex::new(ServiceState::Created),
            local_addr: Mutex::new(None),
            shutdown_tx,
            drained_tx,
        })
    }

    pub fn state(&self) -> ServiceState {
        *self.state.lock()
    }

    /// Address actually bound, once serving.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    pub fn default_client(&self) -> &OutboundClient {
        &self.default_client
    }

    pub fn mux(&self) -> &PathMux {
        &self.mux
    }

    fn ensure_state(
        &self,
        expected: ServiceState,
        operation: &'static str,
    ) -> Result<(), ServiceError> {
        let state = *self.state.lock();
        if state != expected {
            return Err(ServiceError::InvalidState { operation, state });
        }
        Ok(())
    }

    fn transition(
        &self,
        from: ServiceState,
        to: ServiceState,
        operation: &'static str,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        if *state != from {
            return Err(ServiceError::InvalidState {
                operation,
                state: *state,
            });
        }
        *state = to;
        Ok(())
    }

    /// Wire an endpoint: validate it, then register its injector and route
    /// on the router for its local path.
    pub fn register_endpoint(&mut self, endpoint: &Endpoint) -> Result<(), ServiceError> {
        self.ensure_state(ServiceState::Created, "register endpoints")?;
        let resolved = endpoint.resolve()?;

        let client = match resolved.http {
            Some(http) => create_outbound_client(http, &self.pool)?,
            None => self.default_client.clone(),
        };
        let injector = resolved
            .auth
            .as_ref()
            .map(|auth| build_injector(auth, &client))
            .transpose()?;

        let state = self.state();
        let mux = Arc::get_mut(&mut self.mux).ok_or(ServiceError::InvalidState {
            operation: "register endpoints",
            state,
        })?;
        let router = mux.router_mut(resolved.local_path);

        // Checked up front so a rejected endpoint leaves the router untouched
        if router.has_route(&resolved.local_method) {
            return Err(RouteError::DuplicateRoute {
                path: resolved.local_path.to_string(),
                method: resolved.local_method,
            }
            .into());
        }
        if let Some(injector) = injector {
            router.register_credentials(resolved.local_method.clone(), injector)?;
        }
        router.register_route(
            resolved.local_method.clone(),
            resolved.remote_url.clone(),
            resolved.remote_method.clone(),
            client,
        )?;

        info!(
            "Registered {} {} -> {} {} (auth: {})",
            resolved.local_method,
            resolved.local_path,
            resolved.remote_method,
            resolved.remote_url,
            resolved.auth.as_ref().map(|a| a.scheme()).unwrap_or("none")
        );
        Ok(())
    }

    /// Bind the configured address and serve until [`Service::stop`].
    pub async fn start(&self) -> Result<(), ServiceError> {
        self.ensure_state(ServiceState::Created, "start")?;
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|source| ServiceError::Bind {
                addr: self.addr,
                source,
            })?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until [`Service::stop`].
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServiceError> {
        // Subscribed before going Running so a stop cannot be missed
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        self.transition(ServiceState::Created, ServiceState::Running, "start")?;

        let addr = listener.local_addr().unwrap_or(self.addr);
        *self.local_addr.lock() = Some(addr);
        info!("Listening on http://{}", addr);
        info!("Serving {} local path(s)", self.mux.len());

        let graceful = GracefulShutdown::new();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, remote_addr)) => {
                            let mux = Arc::clone(&self.mux);
                            let service = service_fn(move |req: Request<Incoming>| {
                                let mux = Arc::clone(&mux);
                                async move { Ok::<_, Infallible>(mux.dispatch(req).await) }
                            });
                            let conn = http1::Builder::new()
                                .serve_connection(TokioIo::new(stream), service);
                            let conn = graceful.watch(conn);
                            tokio::spawn(async move {
                                if let Err(e) = conn.await {
                                    debug!("Connection error from {}: {}", remote_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error on {}: {}", addr, e);
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("Gateway on {} shutting down", addr);
                    break;
                }
            }
        }
        drop(listener);

        tokio::select! {
            _ = graceful.shutdown() => {
                info!("All connections drained");
            }
            _ = tokio::time::sleep(self.shutdown_timeout) => {
                warn!(
                    "Timed out after {:?} waiting for connections to drain",
                    self.shutdown_timeout
                );
            }
        }

        self.drained_tx.send_replace(true);
        Ok(())
    }

    /// Stop accepting, wait for in-flight requests, then return.
    ///
    /// The wait is bounded by the shutdown timeout, so a serve future that
    /// was dropped without draining cannot hold `stop` forever.
    pub async fn stop(&self) -> Result<(), ServiceError> {
        self.transition(ServiceState::Running, ServiceState::Stopped, "stop")?;

        let mut drained_rx = self.drained_tx.subscribe();
        self.shutdown_tx.send_replace(true);
        let drained = async {
            while !*drained_rx.borrow_and_update() {
                if drained_rx.changed().await.is_err() {
                    break;
                }
            }
        };
        if tokio::time::timeout(self.shutdown_timeout + STOP_GRACE, drained)
            .await
            .is_err()
        {
            warn!("Serve loop did not report drained; stopping anyway");
        }

        info!("Gateway stopped");
        Ok(())
    }
}
