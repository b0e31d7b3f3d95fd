//! A HTTP client transport implementation using [`hyper`].

use std::{
    error::Error as StdError,
    fmt::{self, Display, Formatter},
    str::FromStr,
    task::{Context, Poll},
};

use http::{header, uri::PathAndQuery, Method, StatusCode, Uri};
use tower::Service;

use super::CallResult;
use crate::{
    body::Body,
    channel::ResponseMetadata,
    client::error::ClientError,
    common::transport::http::{
        content_header_value, version_header_name, version_header_value, HeaderMapExt,
    },
    frame,
    request::{self, BoxRequest},
    response::{self, BoxResponse},
    MetadataMap, Response, TWINRPC_PROTOCOL_VERSION,
};

/// A plain `hyper` HTTP client.
pub type HttpClient = hyper::Client<hyper::client::HttpConnector>;

/// HTTP transport implemented using [`hyper`].
///
/// Request metadata is sent as HTTP headers. The header metadata of the
/// response is read from its HTTP headers, its status and trailer metadata
/// from the final frame of its body.
#[derive(Debug, Clone)]
pub struct Hyper {
    client: HttpClient,
    server: Uri,
}

impl Hyper {
    /// Create a new HTTP transport using the provided URI as server URI.
    pub fn new(server: Uri) -> Result<Self, HyperError> {
        Self::new_with_hyper(server, hyper::Client::new())
    }

    /// Create a new HTTP transport using the provided URI as server URI, and
    /// the provided [`HttpClient`] as the underlying client.
    pub fn new_with_hyper(server: Uri, hyper_client: HttpClient) -> Result<Self, HyperError> {
        Ok(Self {
            client: hyper_client,
            server: check_uri(server).map_err(HyperError::InvalidUrl)?,
        })
    }

    fn make_endpoint(&self, path: &str) -> Result<Uri, HyperError> {
        let path = PathAndQuery::from_str(path)
            .map_err(http::Error::from)
            .map_err(HyperError::FailedRequestBuilder)?;

        let mut parts = self.server.clone().into_parts();
        parts.path_and_query = Some(path);

        Uri::from_parts(parts)
            .map_err(http::Error::from)
            .map_err(HyperError::FailedRequestBuilder)
    }
}

impl Service<BoxRequest> for Hyper {
    type Response = BoxResponse;

    type Error = ClientError<HyperError>;

    type Future = CallResult<'static, BoxResponse, HyperError>;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Ok(()).into()
    }

    fn call(&mut self, req: BoxRequest) -> Self::Future {
        let maybe_req_url = self.make_endpoint(req.endpoint());
        let client = self.client.clone();

        Box::pin(async move {
            let req_url = maybe_req_url?;

            let request::Parts { body, metadata, .. } = req.into();

            let mut request = http::Request::new(hyper::Body::from(body));
            *request.method_mut() = Method::POST;
            *request.uri_mut() = req_url;
            let headers = request.headers_mut();
            *headers = metadata.into_headers();
            headers.insert(header::CONTENT_TYPE, content_header_value());
            headers.insert(version_header_name(), version_header_value());

            let resp = client.request(request).await.map_err(HyperError::Http)?;

            if resp.status() != StatusCode::OK {
                return Err(ClientError::UnexpectedStatus(resp.status()));
            }

            if !resp.headers().is_twinrpc_content() {
                return Err(ClientError::ContentNotSupported);
            }

            if !resp
                .headers()
                .header_eq(&version_header_name(), TWINRPC_PROTOCOL_VERSION.as_bytes())
            {
                return Err(ClientError::IncompatibleProtocolVersion);
            }

            let (parts, body) = resp.into_parts();
            let header = MetadataMap::from_headers(&parts.headers);

            let body = hyper::body::to_bytes(body)
                .await
                .map_err(HyperError::Http)?;
            let decoded = frame::decode_response(body)?;

            let body = decoded.message.map_or_else(Body::empty, Body::full);
            Ok(Response::from(response::Parts {
                body,
                metadata: ResponseMetadata {
                    header,
                    trailer: decoded.trailer,
                },
                status: decoded.status,
                extensions: parts.extensions,
            }))
        })
    }
}

/// Check if a URI is a valid server URI or not.
fn check_uri(uri: Uri) -> Result<Uri, InvalidServerUrl> {
    matches!(uri.scheme_str(), Some("http"))
        .then(|| uri)
        .ok_or(InvalidServerUrl::InvalidScheme)
}

#[derive(Debug)]
/// Errors that can occur while parsing a URL when creating a client.
pub enum InvalidServerUrl {
    /// Occurs if URL scheme isn't `http`.
    InvalidScheme,
}

impl Display for InvalidServerUrl {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            InvalidServerUrl::InvalidScheme => write!(f, "invalid scheme, expected `http`"),
        }
    }
}

impl StdError for InvalidServerUrl {}

/// Errors that [`Hyper`] transport might produce.
#[derive(Debug)]
pub enum HyperError {
    /// Occurs if request creation fails.
    FailedRequestBuilder(http::Error),
    /// Occurs if hyper, the HTTP client, returns an error.
    Http(hyper::Error),
    /// Occurs if the given URL is invalid.
    InvalidUrl(InvalidServerUrl),
}

impl Display for HyperError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailedRequestBuilder(err) => write!(f, "failed to build request: {}", err),
            Self::Http(err) => write!(f, "HTTP error: {}", err),
            Self::InvalidUrl(err) => write!(f, "invalid URL: {}", err),
        }
    }
}

impl StdError for HyperError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::FailedRequestBuilder(err) => Some(err),
            Self::Http(err) => Some(err),
            Self::InvalidUrl(err) => Some(err),
        }
    }
}

impl From<hyper::Error> for HyperError {
    fn from(err: hyper::Error) -> Self {
        HyperError::Http(err)
    }
}

impl From<HyperError> for ClientError<HyperError> {
    fn from(err: HyperError) -> Self {
        ClientError::Transport(err)
    }
}
