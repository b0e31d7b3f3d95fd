//! JSON gateway in front of a binary protocol server.
//!
//! Each gateway route maps an HTTP verb and a path template to one fully
//! qualified method. A call is transcoded into a binary call made with a
//! [`Client`], and its outcome back into JSON:
//!
//! - inbound `Grpc-Metadata-<key>` headers become call metadata `<key>`,
//! - header metadata comes back as `Grpc-Metadata-<key>` headers and trailer
//!   metadata as `Grpc-Trailer-<key>` headers,
//! - a non-OK status becomes the mapped HTTP status and an [`ErrorBody`].

use std::{
    collections::HashMap,
    convert::Infallible,
    error::Error as StdError,
    future::Future,
    io,
    net::TcpListener,
    sync::Arc,
    task::{Context, Poll},
};

use axum_server::Handle;
use futures_util::{
    future::{self, BoxFuture, Ready},
    FutureExt,
};
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use hyper::server::conn::AddrStream;
use matchit::Router as Matcher;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tower::Service;
use tracing::Instrument;

use crate::{
    channel::ResponseMetadata,
    client::{error::ClientError, Client},
    common::transport::http::{HeaderMapExt, HttpRequest, HttpResponse},
    request::BoxRequest,
    response::BoxResponse,
    server::{error::RouteError, transport::http::DEFAULT_SHUTDOWN_TIMEOUT},
    MetadataMap, Request, Status,
};

/// JSON client for a gateway.
pub mod client;

pub use client::{GatewayCallError, GatewayClient, GatewayResponse};

/// Prefix of headers carrying call metadata, in both directions.
pub const METADATA_HEADER_PREFIX: &str = "grpc-metadata-";
/// Prefix of response headers carrying trailer metadata.
pub const TRAILER_HEADER_PREFIX: &str = "grpc-trailer-";

/// JSON body of a failed gateway call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Numeric status code.
    pub code: i32,
    /// Status message.
    pub message: String,
    /// Error details. Always empty.
    #[serde(default)]
    pub details: Vec<Value>,
}

impl From<&Status> for ErrorBody {
    fn from(status: &Status) -> Self {
        Self {
            code: status.code().as_i32(),
            message: status.message().to_owned(),
            details: Vec::new(),
        }
    }
}

struct GatewayCall {
    params: Vec<(String, String)>,
    req: HttpRequest,
}

type Handler<Inner> =
    Arc<dyn Fn(Client<Inner>, GatewayCall) -> BoxFuture<'static, HttpResponse> + Send + Sync>;

/// Builder for the gateway routing table.
pub struct Gateway<Inner> {
    client: Client<Inner>,
    routes: Vec<(Method, String, Handler<Inner>)>,
}

impl<Inner, TransportError> Gateway<Inner>
where
    Inner: Service<BoxRequest, Response = BoxResponse, Error = ClientError<TransportError>>
        + Clone
        + Send
        + Sync
        + 'static,
    Inner::Future: Send,
    TransportError: StdError + Send + 'static,
{
    /// Create a gateway that forwards calls with `client`.
    pub fn new(client: Client<Inner>) -> Self {
        Self {
            client,
            routes: Vec::new(),
        }
    }

    /// Serve `fq_method` (`/{package}.{Service}/{Method}`) at `method` +
    /// `template`.
    ///
    /// Templates use `:param` segments. Their values are merged, as strings,
    /// into the JSON request object before it is decoded.
    pub fn route<Req, Resp>(
        mut self,
        method: Method,
        template: impl Into<String>,
        fq_method: &'static str,
    ) -> Self
    where
        Req: prost::Message + Default + DeserializeOwned + 'static,
        Resp: prost::Message + Default + Serialize + 'static,
    {
        let handler: Handler<Inner> = Arc::new(move |client, call| {
            Box::pin(transcode::<Inner, TransportError, Req, Resp>(
                client, fq_method, call,
            ))
        });
        self.routes.push((method, template.into(), handler));
        self
    }

    /// Combine this with the routes of another gateway. The client of `self`
    /// is kept.
    pub fn combine_with(mut self, mut other: Gateway<Inner>) -> Self {
        self.routes.append(&mut other.routes);
        self
    }

    /// Build the routing table.
    ///
    /// Fails if a verb and template pair was registered more than once or a
    /// template isn't valid.
    pub fn build(self) -> Result<GatewayService<Inner>, RouteError> {
        let mut routes: HashMap<Method, Matcher<Handler<Inner>>> = HashMap::new();
        let mut seen = Vec::with_capacity(self.routes.len());

        for (method, template, handler) in self.routes {
            let key = format!("{} {}", method, template);
            if seen.contains(&key) {
                return Err(RouteError::Conflict { path: key });
            }
            routes
                .entry(method)
                .or_insert_with(Matcher::new)
                .insert(template, handler)
                .map_err(|reason| RouteError::InvalidPath {
                    path: key.clone(),
                    reason,
                })?;
            seen.push(key);
        }

        Ok(GatewayService {
            client: self.client,
            routes: Arc::new(routes),
        })
    }
}

/// Finalized [`Gateway`], a [`Service`] answering HTTP/JSON requests.
pub struct GatewayService<Inner> {
    client: Client<Inner>,
    routes: Arc<HashMap<Method, Matcher<Handler<Inner>>>>,
}

impl<Inner: Clone> Clone for GatewayService<Inner> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            routes: self.routes.clone(),
        }
    }
}

impl<Inner> GatewayService<Inner> {
    fn find(&self, method: &Method, path: &str) -> Option<(Handler<Inner>, Vec<(String, String)>)> {
        let matched = self.routes.get(method)?.at(path).ok()?;
        let params = matched
            .params
            .iter()
            .map(|(key, value)| (key.to_owned(), value.to_owned()))
            .collect();
        Some((matched.value.clone(), params))
    }

    fn unmatched(&self, method: &Method, path: &str) -> HttpResponse {
        let other_verb = self
            .routes
            .iter()
            .any(|(verb, matcher)| verb != method && matcher.at(path).is_ok());

        if other_verb {
            let status = Status::unimplemented(format!("method {} not allowed for {}", method, path));
            error_response(StatusCode::METHOD_NOT_ALLOWED, &status, &ResponseMetadata::default())
        } else {
            let status = Status::not_found(format!("no route for {}", path));
            error_response(StatusCode::NOT_FOUND, &status, &ResponseMetadata::default())
        }
    }
}

impl<Inner: Clone> Service<HttpRequest> for GatewayService<Inner> {
    type Response = HttpResponse;

    type Error = Infallible;

    type Future = BoxFuture<'static, Result<HttpResponse, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: HttpRequest) -> Self::Future {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();

        match self.find(&method, &path) {
            Some((handler, params)) => {
                let span = tracing::info_span!("gateway", %method, %path);
                handler(self.client.clone(), GatewayCall { params, req })
                    .map(Ok)
                    .instrument(span)
                    .boxed()
            }
            None => {
                tracing::debug!("no gateway route for {} {}", method, path);
                future::ready(Ok(self.unmatched(&method, &path))).boxed()
            }
        }
    }
}

/// Produces a [`GatewayService`] for each accepted connection.
pub struct MakeGateway<Inner> {
    service: GatewayService<Inner>,
}

impl<Inner> MakeGateway<Inner> {
    /// Wrap a built gateway.
    pub fn new(service: GatewayService<Inner>) -> Self {
        Self { service }
    }
}

impl<Inner: Clone> Service<&AddrStream> for MakeGateway<Inner> {
    type Response = GatewayService<Inner>;

    type Error = Infallible;

    type Future = Ready<Result<GatewayService<Inner>, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, conn: &AddrStream) -> Self::Future {
        tracing::debug!("gateway connection from: {}", conn.remote_addr());
        future::ready(Ok(self.service.clone()))
    }
}

/// Serve a gateway on an already bound listener until `signal` resolves.
pub async fn serve<Inner, F>(
    listener: TcpListener,
    service: GatewayService<Inner>,
    signal: F,
) -> Result<(), io::Error>
where
    Inner: Clone + Send + Sync + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let handle = Handle::new();
    let shutdown = {
        let handle = handle.clone();
        tokio::spawn(async move {
            signal.await;
            tracing::info!("shutting down gateway gracefully");
            handle.graceful_shutdown(Some(DEFAULT_SHUTDOWN_TIMEOUT));
        })
    };

    let res = axum_server::from_tcp(listener)
        .handle(handle)
        .serve(MakeGateway::new(service))
        .await;
    shutdown.abort();
    res
}

async fn transcode<Inner, TransportError, Req, Resp>(
    mut client: Client<Inner>,
    fq_method: &'static str,
    call: GatewayCall,
) -> HttpResponse
where
    Inner: Service<BoxRequest, Response = BoxResponse, Error = ClientError<TransportError>>,
    TransportError: StdError,
    Req: prost::Message + Default + DeserializeOwned,
    Resp: prost::Message + Default + Serialize,
{
    let (parts, body) = call.req.into_parts();

    let message = match decode_json::<Req>(body, call.params).await {
        Ok(message) => message,
        Err(status) => {
            return error_response(
                status.code().http_status(),
                &status,
                &ResponseMetadata::default(),
            )
        }
    };

    let req = Request::new(&message)
        .with_endpoint(fq_method)
        .with_metadata(metadata_from_headers(&parts.headers));

    let resp = match client.execute_request::<Req, Resp>(req).await {
        Ok(resp) => resp,
        Err(err) => {
            let metadata = err.metadata().cloned().unwrap_or_default();
            if let ClientError::EndpointError { .. } = err {
                tracing::debug!("{} failed: {}", fq_method, err);
            } else {
                tracing::warn!("{} failed upstream: {}", fq_method, err);
            }
            let status = Status::from(err);
            return error_response(status.code().http_status(), &status, &metadata);
        }
    };

    let metadata = resp.metadata().clone();
    let body = match resp.into_message().await {
        Ok(message) => serde_json::to_vec(&message)
            .map_err(|err| Status::internal(format!("failed to encode response: {}", err))),
        Err(err) => Err(Status::from(err)),
    };

    match body {
        Ok(body) => json_response(StatusCode::OK, body, &metadata),
        Err(status) => error_response(status.code().http_status(), &status, &metadata),
    }
}

/// Decode the JSON request object, with path parameters merged in.
async fn decode_json<Req: DeserializeOwned>(
    body: hyper::Body,
    params: Vec<(String, String)>,
) -> Result<Req, Status> {
    let bytes = hyper::body::to_bytes(body)
        .await
        .map_err(|err| Status::invalid_argument(format!("failed to read body: {}", err)))?;

    let mut object = if bytes.iter().all(u8::is_ascii_whitespace) {
        Map::new()
    } else {
        match serde_json::from_slice(&bytes) {
            Ok(Value::Object(object)) => object,
            Ok(_) => return Err(Status::invalid_argument("request body must be a JSON object")),
            Err(err) => return Err(Status::invalid_argument(format!("invalid JSON: {}", err))),
        }
    };

    for (key, value) in params {
        object.insert(key, Value::String(value));
    }

    serde_json::from_value(Value::Object(object))
        .map_err(|err| Status::invalid_argument(format!("invalid request: {}", err)))
}

/// Call metadata from `Grpc-Metadata-` prefixed headers.
pub fn metadata_from_headers(headers: &HeaderMap) -> MetadataMap {
    let mut metadata = MetadataMap::new();
    for (name, value) in headers {
        let key = match name.as_str().strip_prefix(METADATA_HEADER_PREFIX) {
            Some(key) => key,
            None => continue,
        };
        let appended = value
            .to_str()
            .map_err(|_| Status::invalid_argument("metadata value is not visible ASCII"))
            .and_then(|value| metadata.append(key, value));
        if let Err(status) = appended {
            tracing::debug!("dropping metadata header {}: {}", name, status.message());
        }
    }
    metadata
}

fn json_response(status: StatusCode, body: Vec<u8>, metadata: &ResponseMetadata) -> HttpResponse {
    let mut resp = HttpResponse::new(hyper::Body::from(body));
    *resp.status_mut() = status;

    let headers = resp.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.extend_prefixed(METADATA_HEADER_PREFIX, &metadata.header);
    headers.extend_prefixed(TRAILER_HEADER_PREFIX, &metadata.trailer);
    resp
}

fn error_response(status: StatusCode, error: &Status, metadata: &ResponseMetadata) -> HttpResponse {
    let body = serde_json::to_vec(&ErrorBody::from(error)).unwrap_or_default();
    json_response(status, body, metadata)
}

#[cfg(all(test, feature = "mock_client", feature = "mock_server"))]
mod tests {
    use prost::Message;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        client::transport::mock::Mock as MockClient,
        common::transport::mock::new_mock_channels,
        server::{
            prelude::*,
            transport::{mock::Mock as MockServer, Transport},
        },
        Code,
    };

    #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
    struct Echo {
        #[prost(string, tag = "1")]
        #[serde(default)]
        text: String,
    }

    struct EchoServer;

    impl MakeRoutes for EchoServer {
        fn make_routes(&self) -> Routes {
            Routes::new().route(
                "/test.v1.Echo/Echo",
                unary_handler(|req: Request<Echo>| async move {
                    let channel = req.response_channel();
                    channel.set_header(req.metadata().clone())?;
                    let mut trailer = MetadataMap::new();
                    trailer.insert("done", "yes")?;
                    channel.set_trailer(trailer)?;

                    let echo = req.into_message().await?;
                    if echo.text.is_empty() {
                        return Err(Status::invalid_argument("empty text"));
                    }
                    Ok(Response::new(&echo))
                }),
            )
        }
    }

    fn gateway() -> GatewayService<MockClient> {
        let (tx, rx) = new_mock_channels();
        tokio::spawn(MockServer::new(rx).serve(EchoServer));

        Gateway::new(Client::new(MockClient::new(tx)))
            .route::<Echo, Echo>(Method::POST, "/v1/echo", "/test.v1.Echo/Echo")
            .route::<Echo, Echo>(Method::GET, "/v1/echo/:text", "/test.v1.Echo/Echo")
            .build()
            .unwrap()
    }

    async fn json_of<T: DeserializeOwned>(resp: HttpResponse) -> T {
        let body = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn transcodes_body_and_metadata() {
        let req = http::Request::builder()
            .method(Method::POST)
            .uri("/v1/echo")
            .header("Grpc-Metadata-Key", "value")
            .header("x-ignored", "1")
            .body(hyper::Body::from(r#"{"text":"hi"}"#))
            .unwrap();
        let resp = gateway().oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["grpc-metadata-key"], "value");
        assert_eq!(resp.headers()["grpc-trailer-done"], "yes");
        assert!(resp.headers().get("grpc-metadata-x-ignored").is_none());
        let echo: Echo = json_of(resp).await;
        assert_eq!(echo.text, "hi");
    }

    #[tokio::test]
    async fn path_params_fill_the_request() {
        let req = http::Request::builder()
            .uri("/v1/echo/from-path")
            .body(hyper::Body::empty())
            .unwrap();
        let resp = gateway().oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let echo: Echo = json_of(resp).await;
        assert_eq!(echo.text, "from-path");
    }

    #[tokio::test]
    async fn failures_become_error_bodies() {
        let req = http::Request::builder()
            .method(Method::POST)
            .uri("/v1/echo")
            .body(hyper::Body::empty())
            .unwrap();
        let resp = gateway().oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(resp.headers()["grpc-trailer-done"], "yes");
        let body: ErrorBody = json_of(resp).await;
        assert_eq!(body.code, Code::InvalidArgument.as_i32());
        assert_eq!(body.message, "empty text");
        assert!(body.details.is_empty());
    }

    #[tokio::test]
    async fn invalid_json_is_rejected_before_the_call() {
        let req = http::Request::builder()
            .method(Method::POST)
            .uri("/v1/echo")
            .body(hyper::Body::from("[1, 2"))
            .unwrap();
        let resp = gateway().oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(resp.headers().get("grpc-trailer-done").is_none());
        let body: ErrorBody = json_of(resp).await;
        assert_eq!(body.code, Code::InvalidArgument.as_i32());
    }

    #[tokio::test]
    async fn unknown_paths_and_verbs() {
        let gateway = gateway();

        let req = http::Request::builder()
            .uri("/v1/nope")
            .body(hyper::Body::empty())
            .unwrap();
        let resp = gateway.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: ErrorBody = json_of(resp).await;
        assert_eq!(body.code, Code::NotFound.as_i32());

        let req = http::Request::builder()
            .method(Method::DELETE)
            .uri("/v1/echo")
            .body(hyper::Body::empty())
            .unwrap();
        let resp = gateway.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body: ErrorBody = json_of(resp).await;
        assert_eq!(body.code, Code::Unimplemented.as_i32());
    }

    #[tokio::test]
    async fn upstream_failures_are_unavailable() {
        let (tx, rx) = new_mock_channels();
        drop(rx);

        let gateway = Gateway::new(Client::new(MockClient::new(tx)))
            .route::<Echo, Echo>(Method::POST, "/v1/echo", "/test.v1.Echo/Echo")
            .build()
            .unwrap();
        let req = http::Request::builder()
            .method(Method::POST)
            .uri("/v1/echo")
            .body(hyper::Body::from(r#"{"text":"hi"}"#))
            .unwrap();
        let resp = gateway.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: ErrorBody = json_of(resp).await;
        assert_eq!(body.code, Code::Unavailable.as_i32());
    }

    #[test]
    fn duplicate_routes_are_rejected() {
        let (tx, _rx) = new_mock_channels();
        let res = Gateway::new(Client::new(MockClient::new(tx)))
            .route::<Echo, Echo>(Method::POST, "/v1/echo", "/test.v1.Echo/Echo")
            .route::<Echo, Echo>(Method::POST, "/v1/echo", "/test.v1.Echo/Echo")
            .build();
        assert!(matches!(res, Err(RouteError::Conflict { .. })));
    }

    #[test]
    fn metadata_headers_are_unprefixed() {
        let mut headers = HeaderMap::new();
        headers.insert("grpc-metadata-code", HeaderValue::from_static("1234"));
        headers.insert("grpc-metadata-content-type", HeaderValue::from_static("x"));
        headers.insert("code", HeaderValue::from_static("other"));

        let metadata = metadata_from_headers(&headers);
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata.get("code"), Some("1234"));
    }
}
