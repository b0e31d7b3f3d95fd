use futures_util::{future::BoxFuture, StreamExt};
use tower::Service;

use crate::{
    common::transport::mock::MockReceiver,
    server::{error::RouteError, MakeRoutes},
};

use super::Transport;

/// Mock transport for the server. Calls never leave the process.
pub struct Mock {
    rx: MockReceiver,
}

impl Mock {
    /// Create a new mock transport.
    pub fn new(rx: MockReceiver) -> Self {
        Self { rx }
    }
}

impl Transport for Mock {
    type Error = RouteError;

    fn serve<S>(mut self, mk_routes: S) -> BoxFuture<'static, Result<(), Self::Error>>
    where
        S: MakeRoutes,
    {
        let routes = mk_routes.build_routes();

        Box::pin(async move {
            let mut svc = routes?;

            while let Some((req, sender)) = self.rx.inner.next().await {
                let fut = Service::call(&mut svc, req);

                tokio::spawn(async move {
                    let resp = match fut.await {
                        Ok(resp) => resp,
                        Err(never) => match never {},
                    };
                    if sender.send(resp).is_err() {
                        tracing::debug!("mock client went away before the response");
                    }
                });
            }

            Ok(())
        })
    }
}
