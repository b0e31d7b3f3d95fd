use std::{
    borrow::Cow,
    convert::Infallible,
    net::SocketAddr,
    task::{Context, Poll},
};

use futures_util::{
    future::{self, BoxFuture, Ready},
    FutureExt,
};
use http::{header, Method, StatusCode};
use hyper::server::conn::AddrStream;
use tower::{
    layer::util::{Identity, Stack},
    Layer, Service,
};

use crate::{
    common::transport::http::{
        content_header_value, version_header_name, version_header_value, HeaderMapExt,
        HttpRequest, HttpResponse,
    },
    frame,
    request::{self, BoxRequest},
    response::{self, BoxResponse},
    server::router::RoutesFinalized,
    MetadataMap, Request, Status,
};

/// A service that wraps a [`RoutesFinalized`], and takes HTTP requests and
/// produces HTTP responses in the framed binary protocol.
#[derive(Clone)]
pub struct RpcServiceToHttp {
    inner: RoutesFinalized,
    socket_addr: Option<SocketAddr>,
}

impl RpcServiceToHttp {
    /// Create a new service by wrapping a [`RoutesFinalized`].
    pub fn new(routes: RoutesFinalized) -> Self {
        Self {
            inner: routes,
            socket_addr: None,
        }
    }

    /// Set a [`SocketAddr`] that will be passed to all requests made to this
    /// service. Using this method after another will overwrite the older value.
    pub fn with_socket_addr(mut self, addr: SocketAddr) -> Self {
        self.socket_addr = Some(addr);
        self
    }
}

impl Service<HttpRequest> for RpcServiceToHttp {
    type Response = HttpResponse;

    type Error = Infallible;

    type Future = BoxFuture<'static, Result<HttpResponse, Infallible>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Service::poll_ready(&mut self.inner, cx)
    }

    fn call(&mut self, req: HttpRequest) -> Self::Future {
        if req.method() != Method::POST {
            return future::ready(Ok(bare_response(StatusCode::METHOD_NOT_ALLOWED))).boxed();
        }
        if !req.headers().is_twinrpc_content() {
            return future::ready(Ok(bare_response(StatusCode::UNSUPPORTED_MEDIA_TYPE))).boxed();
        }

        let mut req = from_http_request(req);
        if let Some(socket_addr) = self.socket_addr {
            req.extensions_mut().insert(socket_addr);
        }

        let fut = Service::call(&mut self.inner, req);
        Box::pin(async move {
            let resp = match fut.await {
                Ok(resp) => resp,
                Err(never) => match never {},
            };
            Ok(into_http_response(resp).await)
        })
    }
}

/// Service that wraps a built routes table and produces a [`RpcServiceToHttp`]
/// for each accepted connection.
pub struct MakeRoutesToHttp<L> {
    routes: RoutesFinalized,
    layer: L,
}

impl MakeRoutesToHttp<Identity> {
    /// Create a new service by wrapping a [`RoutesFinalized`].
    pub fn new(routes: RoutesFinalized) -> Self {
        Self {
            routes,
            layer: Identity::new(),
        }
    }
}

impl<L> MakeRoutesToHttp<L> {
    /// Layer the inner layer, that will be used to transform the produced services.
    pub fn layer<Layer>(self, layer: Layer) -> MakeRoutesToHttp<Stack<Layer, L>> {
        MakeRoutesToHttp {
            routes: self.routes,
            layer: Stack::new(layer, self.layer),
        }
    }
}

impl<L, S> Service<&AddrStream> for MakeRoutesToHttp<L>
where
    L: Layer<RpcServiceToHttp, Service = S> + Clone + Send,
    S: Service<HttpRequest, Response = HttpResponse, Error = Infallible> + Send + 'static,
    S::Future: Send,
{
    type Response = L::Service;

    type Error = Infallible;

    type Future = Ready<Result<L::Service, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: &AddrStream) -> Self::Future {
        let socket_addr = req.remote_addr();

        tracing::debug!("creating new service for: {}", socket_addr);

        let http_service =
            RpcServiceToHttp::new(self.routes.clone()).with_socket_addr(socket_addr);
        future::ready(Ok(self.layer.layer(http_service)))
    }
}

/// A response with no frames, used when a request can't be dispatched.
pub(crate) fn bare_response(status: StatusCode) -> HttpResponse {
    let mut resp = HttpResponse::new(hyper::Body::empty());
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(header::ACCEPT, content_header_value());
    resp
}

pub(crate) fn from_http_request(req: HttpRequest) -> BoxRequest {
    let (parts, body) = req.into_parts();

    let metadata = MetadataMap::from_headers(&parts.headers);
    let endpoint = Cow::Owned(parts.uri.path().to_string());

    Request::from(request::Parts {
        body: body.into(),
        metadata,
        extensions: parts.extensions,
        endpoint,
    })
}

/// Convert a response into a framed HTTP response.
///
/// Header metadata becomes HTTP headers, the message and the trailers go
/// into the body frames.
pub(crate) async fn into_http_response(resp: BoxResponse) -> HttpResponse {
    let response::Parts {
        body,
        metadata,
        mut status,
        extensions,
        ..
    } = resp.into();

    let message = if status.is_ok() {
        match body.aggregate().await {
            Ok(message) => Some(message),
            Err(err) => {
                tracing::error!("failed to read response message: {}", err);
                status = Status::internal("failed to read response message");
                None
            }
        }
    } else {
        None
    };

    let body = match frame::encode_response(message.as_deref(), &status, &metadata.trailer) {
        Ok(body) => body,
        Err(err) => {
            tracing::error!("failed to frame response: {}", err);
            return bare_response(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let mut resp = HttpResponse::new(hyper::Body::from(body));
    *resp.extensions_mut() = extensions;

    let headers = resp.headers_mut();
    for (key, value) in metadata.header.as_headers() {
        headers.append(key.clone(), value.clone());
    }
    headers.insert(header::CONTENT_TYPE, content_header_value());
    headers.insert(version_header_name(), version_header_value());

    resp
}
