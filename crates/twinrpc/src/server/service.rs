use futures_util::{future::BoxFuture, Future, FutureExt};
use std::{convert::Infallible, sync::Arc};
use tower::{
    layer::{layer_fn, util::Stack},
    service_fn,
    util::BoxCloneService,
    Layer, Service,
};

use super::error::ServerResult;
use crate::{
    request::BoxRequest, response::BoxResponse, Request, Response, ResponseChannel, Status,
};

/// Call future used by [`RpcService`].
pub(crate) type CallFuture<'a> = BoxFuture<'a, Result<BoxResponse, Infallible>>;

/// A type erased, clonable service handling calls.
#[derive(Clone)]
pub struct RpcService {
    svc: BoxCloneService<BoxRequest, BoxResponse, Infallible>,
}

impl RpcService {
    /// Create a new service from a [`tower::Service`].
    pub fn new<S>(svc: S) -> Self
    where
        S: Service<BoxRequest, Response = BoxResponse, Error = Infallible>
            + Clone
            + Send
            + 'static,
        S::Future: Send,
    {
        Self {
            svc: BoxCloneService::new(svc),
        }
    }

    /// Layer this service.
    pub fn layer<L, S>(self, layer: L) -> Self
    where
        L: Layer<Self, Service = S>,
        S: Service<BoxRequest, Response = BoxResponse, Error = Infallible>
            + Clone
            + Send
            + 'static,
        S::Future: Send,
    {
        RpcService::new(layer.layer(self))
    }
}

impl Service<BoxRequest> for RpcService {
    type Response = BoxResponse;

    type Error = Infallible;

    type Future = CallFuture<'static>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.svc.poll_ready(cx)
    }

    fn call(&mut self, req: BoxRequest) -> Self::Future {
        Service::call(&mut self.svc, req)
    }
}

/// Layer type that produces [`RpcService`]s.
#[derive(Clone)]
pub struct RpcLayer {
    inner: Arc<dyn Layer<RpcService, Service = RpcService> + Sync + Send + 'static>,
}

impl RpcLayer {
    /// Create a new [`RpcLayer`] from a [`tower::Layer`].
    pub fn new<L, S>(layer: L) -> Self
    where
        L: Layer<RpcService, Service = S> + Sync + Send + 'static,
        S: Service<BoxRequest, Response = BoxResponse, Error = Infallible>
            + Clone
            + Send
            + 'static,
        S::Future: Send,
    {
        let layer = layer_fn(move |svc| RpcService::new(layer.layer(svc)));

        Self {
            inner: Arc::new(layer),
        }
    }

    pub(crate) fn stack(inner: RpcLayer, outer: RpcLayer) -> Self {
        Self {
            inner: Arc::new(Stack::new(inner, outer)),
        }
    }
}

impl<S> Layer<S> for RpcLayer
where
    S: Service<BoxRequest, Response = BoxResponse, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send,
{
    type Service = RpcService;

    fn layer(&self, inner: S) -> Self::Service {
        self.inner.layer(RpcService::new(inner))
    }
}

/// A service that answers every call with [`crate::Code::Unimplemented`].
pub fn unimplemented() -> RpcService {
    RpcService::new(service_fn(|req: BoxRequest| {
        let status = Status::unimplemented(format!("unknown method {}", req.endpoint()));
        futures_util::future::ready(Ok::<_, Infallible>(BoxResponse::from(status)))
    }))
}

/// Wrap an async function handling a unary call into an [`RpcService`].
///
/// The handler gets a fresh [`ResponseChannel`] in its request, which is
/// finalized once the handler returns. The produced response carries the
/// message (on success), the terminal status and the metadata written to the
/// channel.
pub fn unary_handler<Req, Resp, HandlerFn, HandlerFut>(handler: HandlerFn) -> RpcService
where
    Req: prost::Message + Default + 'static,
    Resp: prost::Message + 'static,
    HandlerFut: Future<Output = ServerResult<Response<Resp>>> + Send + 'static,
    HandlerFn: FnOnce(Request<Req>) -> HandlerFut + Clone + Send + 'static,
{
    let service = service_fn(move |mut req: BoxRequest| {
        let handler = handler.clone();
        let channel = ResponseChannel::new();
        req.extensions_mut().insert(channel.clone());

        async move {
            // cancels the channel if this future is dropped before the handler returns
            let _cancel = channel.cancel_on_drop();

            let result = handler(req.map::<Req>()).await;

            let metadata = match channel.finish() {
                Ok(metadata) => metadata,
                Err(status) => return Ok(BoxResponse::from(status)),
            };

            let resp = match result {
                Ok(resp) => resp.map::<()>(),
                Err(status) if status.is_ok() => {
                    // a handler "failing" with OK status still succeeds, just without a message
                    BoxResponse::empty()
                }
                Err(status) => BoxResponse::from(status),
            };

            Ok::<_, Infallible>(resp.with_metadata(metadata))
        }
        .boxed()
    });

    RpcService::new(service)
}
