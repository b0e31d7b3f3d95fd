use std::{
    convert::Infallible,
    error::Error as StdError,
    fmt::{self, Display, Formatter},
    io,
    net::{SocketAddr, TcpListener, ToSocketAddrs},
    time::Duration,
};

use axum_server::Handle;
use futures_util::{future::BoxFuture, Future};
use tower::{
    layer::util::{Identity, Stack},
    Layer, Service,
};

use super::Transport;
use crate::{
    common::transport::http::{HttpRequest, HttpResponse},
    server::{error::RouteError, MakeRoutes},
};

/// Underlying implementation of this transport.
pub mod r#impl;

/// How long in-flight calls may run after a graceful shutdown was requested.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors the HTTP transport can fail with.
#[derive(Debug)]
pub enum ServeError {
    /// The routes table couldn't be built.
    Routes(RouteError),
    /// The listener failed.
    Io(io::Error),
}

impl Display for ServeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ServeError::Routes(err) => write!(f, "invalid routes: {}", err),
            ServeError::Io(err) => write!(f, "listener failed: {}", err),
        }
    }
}

impl StdError for ServeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ServeError::Routes(err) => Some(err),
            ServeError::Io(err) => Some(err),
        }
    }
}

impl From<RouteError> for ServeError {
    fn from(err: RouteError) -> Self {
        ServeError::Routes(err)
    }
}

impl From<io::Error> for ServeError {
    fn from(err: io::Error) -> Self {
        ServeError::Io(err)
    }
}

/// A transport based on [`hyper`], serving the binary protocol.
///
/// The listener is bound before serving starts, so address errors surface
/// when the transport is created.
pub struct Http<L> {
    listener: TcpListener,
    layer: L,
    handle: Handle,
    shutdown: Option<BoxFuture<'static, ()>>,
    shutdown_timeout: Duration,
}

impl Http<Identity> {
    /// Create a new transport that serves on an already bound listener.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self {
            listener,
            layer: Identity::new(),
            handle: Handle::new(),
            shutdown: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Bind a listener to `addr` and create a new transport serving on it.
    pub fn bind<Addr: ToSocketAddrs>(addr: Addr) -> Result<Self, io::Error> {
        TcpListener::bind(addr).map(Self::from_listener)
    }
}

impl<L> Http<L> {
    /// The address this transport listens on.
    pub fn local_addr(&self) -> Result<SocketAddr, io::Error> {
        self.listener.local_addr()
    }

    /// Layer the per-connection HTTP service with a [`Layer`].
    pub fn layer<Layer>(self, layer: Layer) -> Http<Stack<Layer, L>> {
        Http {
            listener: self.listener,
            layer: Stack::new(layer, self.layer),
            handle: self.handle,
            shutdown: self.shutdown,
            shutdown_timeout: self.shutdown_timeout,
        }
    }

    /// Stop accepting connections once `signal` resolves, then let
    /// in-flight calls finish.
    pub fn with_graceful_shutdown<F>(mut self, signal: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.shutdown = Some(Box::pin(signal));
        self
    }

    /// Set how long in-flight calls may run after shutdown was requested.
    /// Defaults to [`DEFAULT_SHUTDOWN_TIMEOUT`].
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// A handle that can be used to shut the server down.
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }
}

impl<L, S> Transport for Http<L>
where
    L: Layer<r#impl::RpcServiceToHttp, Service = S> + Clone + Send + 'static,
    S: Service<HttpRequest, Response = HttpResponse, Error = Infallible> + Send + 'static,
    S::Future: Send,
{
    type Error = ServeError;

    fn serve<M>(self, mk_routes: M) -> BoxFuture<'static, Result<(), Self::Error>>
    where
        M: MakeRoutes,
    {
        let routes = match mk_routes.build_routes() {
            Ok(routes) => routes,
            Err(err) => return Box::pin(futures_util::future::ready(Err(err.into()))),
        };
        let service = r#impl::MakeRoutesToHttp::new(routes).layer(self.layer);

        let shutdown = self.shutdown;
        let timeout = self.shutdown_timeout;
        let handle = self.handle.clone();
        let server = axum_server::from_tcp(self.listener).handle(self.handle);

        Box::pin(async move {
            let watcher = shutdown.map(|signal| {
                tokio::spawn(async move {
                    signal.await;
                    tracing::info!("shutting down gracefully");
                    handle.graceful_shutdown(Some(timeout));
                })
            });

            let res = server.serve(service).await.map_err(ServeError::from);
            if let Some(watcher) = watcher {
                watcher.abort();
            }
            res
        })
    }
}
