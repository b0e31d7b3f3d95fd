use std::{
    error::Error as StdError,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use http::{header, uri::PathAndQuery, HeaderMap, HeaderValue, Method, Uri};
use serde::{de::DeserializeOwned, Serialize};

use super::{ErrorBody, METADATA_HEADER_PREFIX, TRAILER_HEADER_PREFIX};
use crate::{
    channel::ResponseMetadata, client::transport::http::HttpClient, Code, MetadataMap, Status,
};

/// A successful gateway call.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse<T> {
    /// The decoded JSON message.
    pub message: T,
    /// Header and trailer metadata recovered from the prefixed headers.
    pub metadata: ResponseMetadata,
}

/// Errors a [`GatewayClient`] call can fail with.
#[derive(Debug)]
pub enum GatewayCallError {
    /// The call reached the gateway and terminated with a non-OK status.
    Status {
        /// Status of the call.
        status: Status,
        /// Header and trailer metadata of the call.
        metadata: ResponseMetadata,
    },
    /// The request couldn't be built.
    Request(http::Error),
    /// The HTTP exchange failed.
    Http(hyper::Error),
    /// A JSON body couldn't be encoded or decoded.
    Json(serde_json::Error),
}

impl GatewayCallError {
    /// The status of a call that reached the gateway.
    pub fn status(&self) -> Option<&Status> {
        match self {
            GatewayCallError::Status { status, .. } => Some(status),
            _ => None,
        }
    }
}

impl Display for GatewayCallError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            GatewayCallError::Status { status, .. } => write!(f, "gateway returned {}", status),
            GatewayCallError::Request(err) => write!(f, "failed to build request: {}", err),
            GatewayCallError::Http(err) => write!(f, "HTTP error: {}", err),
            GatewayCallError::Json(err) => write!(f, "JSON error: {}", err),
        }
    }
}

impl StdError for GatewayCallError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            GatewayCallError::Status { status, .. } => Some(status),
            GatewayCallError::Request(err) => Some(err),
            GatewayCallError::Http(err) => Some(err),
            GatewayCallError::Json(err) => Some(err),
        }
    }
}

impl From<http::Error> for GatewayCallError {
    fn from(err: http::Error) -> Self {
        GatewayCallError::Request(err)
    }
}

impl From<hyper::Error> for GatewayCallError {
    fn from(err: hyper::Error) -> Self {
        GatewayCallError::Http(err)
    }
}

impl From<serde_json::Error> for GatewayCallError {
    fn from(err: serde_json::Error) -> Self {
        GatewayCallError::Json(err)
    }
}

/// JSON client for a gateway.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: HttpClient,
    server: Uri,
}

impl GatewayClient {
    /// Create a client calling the gateway at `server`.
    pub fn new(server: Uri) -> Self {
        Self {
            client: hyper::Client::new(),
            server,
        }
    }

    /// Call the gateway.
    ///
    /// `body` is sent as JSON; `None` sends no body. `metadata` is sent as
    /// `Grpc-Metadata-` prefixed headers.
    pub async fn call<Req, Resp>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Req>,
        metadata: &MetadataMap,
    ) -> Result<GatewayResponse<Resp>, GatewayCallError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let mut parts = self.server.clone().into_parts();
        parts.path_and_query = Some(PathAndQuery::from_str(path).map_err(http::Error::from)?);
        let uri = Uri::from_parts(parts).map_err(http::Error::from)?;

        let body = match body {
            Some(body) => hyper::Body::from(serde_json::to_vec(body)?),
            None => hyper::Body::empty(),
        };

        let mut request = http::Request::builder().method(method).uri(uri).body(body)?;
        let headers = request.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        for (key, value) in metadata.as_headers() {
            let name = format!("{}{}", METADATA_HEADER_PREFIX, key.as_str());
            headers.append(
                header::HeaderName::from_bytes(name.as_bytes()).map_err(http::Error::from)?,
                value.clone(),
            );
        }

        let resp = self.client.request(request).await?;
        let (parts, body) = resp.into_parts();
        let body = hyper::body::to_bytes(body).await?;
        let metadata = metadata_of(&parts.headers);

        if parts.status.is_success() {
            let message = serde_json::from_slice(&body)?;
            return Ok(GatewayResponse { message, metadata });
        }

        let status = match serde_json::from_slice::<ErrorBody>(&body) {
            Ok(err) => Status::new(Code::from_i32_lossy(err.code), err.message),
            Err(_) => Status::new(
                Code::from_http_status(parts.status),
                parts.status.canonical_reason().unwrap_or("").to_owned(),
            ),
        };
        Err(GatewayCallError::Status { status, metadata })
    }
}

/// Split prefixed response headers back into header and trailer metadata.
pub fn metadata_of(headers: &HeaderMap) -> ResponseMetadata {
    let mut metadata = ResponseMetadata::default();
    for (name, value) in headers {
        let (map, key) = if let Some(key) = name.as_str().strip_prefix(METADATA_HEADER_PREFIX) {
            (&mut metadata.header, key)
        } else if let Some(key) = name.as_str().strip_prefix(TRAILER_HEADER_PREFIX) {
            (&mut metadata.trailer, key)
        } else {
            continue;
        };
        if let Ok(value) = value.to_str() {
            // the gateway only emits keys a map accepts
            let _ = map.append(key, value);
        }
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_headers_split_into_channels() {
        let mut headers = HeaderMap::new();
        headers.append("grpc-metadata-hello", HeaderValue::from_static("buffer"));
        headers.append("grpc-trailer-buf", HeaderValue::from_static("buffer"));
        headers.append("content-type", HeaderValue::from_static("application/json"));

        let metadata = metadata_of(&headers);
        assert_eq!(metadata.header.get("hello"), Some("buffer"));
        assert_eq!(metadata.trailer.get("buf"), Some("buffer"));
        assert_eq!(metadata.header.len() + metadata.trailer.len(), 2);
    }
}
