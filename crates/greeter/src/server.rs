use std::{
    future::Future,
    io,
    net::{Ipv4Addr, SocketAddr, TcpListener},
};

use tokio::sync::watch;
use twinrpc::{
    client::{transport::http::Hyper, Client},
    combine_services,
    common::layer::trace::TraceLayer,
    exports::http::Uri,
    gateway::{self, Gateway},
    server::{prelude::*, transport::http::Http, Reflection},
};

use crate::{
    config::Config,
    contract::{gateway_routes, ApiVersion, GreeterServer},
    handlers::{GreeterService, HandlerConfig},
    BoxError,
};

/// Both listeners of a greeter process, bound and ready to serve.
#[derive(Debug)]
pub struct Servers {
    rpc: TcpListener,
    http: TcpListener,
    handlers: HandlerConfig,
}

impl Servers {
    /// Bind both listeners. Fails if either address can't be bound.
    pub fn bind(config: &Config) -> Result<Self, io::Error> {
        let rpc = TcpListener::bind(config.rpc_addr)?;
        let http = TcpListener::bind(config.http_addr)?;
        Ok(Self::from_listeners(rpc, http, config.handler_config()))
    }

    /// Serve on already bound listeners.
    pub fn from_listeners(rpc: TcpListener, http: TcpListener, handlers: HandlerConfig) -> Self {
        Self {
            rpc,
            http,
            handlers,
        }
    }

    /// Address of the binary protocol listener.
    pub fn rpc_addr(&self) -> Result<SocketAddr, io::Error> {
        self.rpc.local_addr()
    }

    /// Address of the JSON gateway listener.
    pub fn http_addr(&self) -> Result<SocketAddr, io::Error> {
        self.http.local_addr()
    }

    /// Serve both versions of the Greeter service on both listeners until
    /// `signal` resolves or either server fails.
    ///
    /// The binary protocol is served in a spawned task, the gateway on the
    /// calling task. Both shut down gracefully together.
    pub async fn serve<F>(self, signal: F) -> Result<(), BoxError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let rpc_addr = self.rpc_addr()?;
        let http_addr = self.http_addr()?;

        let service = GreeterService::new(self.handlers);
        let v1 = GreeterServer::new(service, ApiVersion::V1);
        let v2 = GreeterServer::new(service, ApiVersion::V2);
        let reflection = Reflection;
        let server = combine_services!(v1, v2, reflection).layer(TraceLayer::default());

        let client = Client::new(Hyper::new(loopback_uri(rpc_addr)?)?);
        let gateway = gateway_routes(ApiVersion::V1, Gateway::new(client.clone()))
            .combine_with(gateway_routes(ApiVersion::V2, Gateway::new(client)))
            .build()?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let trigger = {
            let shutdown_tx = shutdown_tx.clone();
            tokio::spawn(async move {
                signal.await;
                let _ = shutdown_tx.send(true);
            })
        };

        let transport =
            Http::from_listener(self.rpc).with_graceful_shutdown(shutdown(shutdown_rx.clone()));
        let rpc = {
            let shutdown_tx = shutdown_tx.clone();
            tokio::spawn(async move {
                let res = transport.serve(server).await;
                if let Err(err) = &res {
                    tracing::error!("binary protocol server failed: {}", err);
                }
                let _ = shutdown_tx.send(true);
                res
            })
        };

        tracing::info!("serving binary protocol on {}", rpc_addr);
        tracing::info!("serving JSON gateway on {}", http_addr);

        let gateway_res = gateway::serve(self.http, gateway, shutdown(shutdown_rx)).await;
        if let Err(err) = &gateway_res {
            tracing::error!("gateway failed: {}", err);
        }
        let _ = shutdown_tx.send(true);
        trigger.abort();

        let rpc_res = rpc.await?;
        tracing::info!("greeter stopped");

        gateway_res?;
        rpc_res?;
        Ok(())
    }
}

/// Resolves once shutdown was requested.
async fn shutdown(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// URI the gateway uses to reach the binary protocol listener.
fn loopback_uri(addr: SocketAddr) -> Result<Uri, BoxError> {
    let addr = if addr.ip().is_unspecified() {
        SocketAddr::from((Ipv4Addr::LOCALHOST, addr.port()))
    } else {
        addr
    };
    Ok(format!("http://{}", addr).parse()?)
}

/// Bind both listeners from `config` and serve until Ctrl-C.
pub async fn run(config: Config) -> Result<(), BoxError> {
    let servers = Servers::bind(&config)?;
    servers
        .serve(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for Ctrl-C: {}", err);
                return;
            }
            tracing::info!("received Ctrl-C");
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_dials_loopback_for_unspecified_addresses() {
        let uri = loopback_uri("0.0.0.0:9091".parse().unwrap()).unwrap();
        assert_eq!(uri, "http://127.0.0.1:9091/");

        let uri = loopback_uri("10.0.0.2:9091".parse().unwrap()).unwrap();
        assert_eq!(uri, "http://10.0.0.2:9091/");
    }

    #[test]
    fn occupied_addresses_fail_to_bind() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let config = Config {
            rpc_addr: "127.0.0.1:0".parse().unwrap(),
            http_addr: taken.local_addr().unwrap(),
            strict_names: false,
            hello_metadata: false,
            status_side_channel: Default::default(),
            log_level: tracing::Level::INFO,
        };
        assert!(Servers::bind(&config).is_err());
    }
}
