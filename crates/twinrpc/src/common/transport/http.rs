use futures_util::TryStreamExt;
use http::{
    header::{HeaderName, CONTENT_TYPE},
    HeaderMap, HeaderValue,
};

use crate::{body::Body, BoxError, MetadataMap, TWINRPC_CONTENT_MIMETYPE, TWINRPC_PROTOCOL_VERSION};

/// A HTTP request.
pub type HttpRequest = http::Request<hyper::Body>;
/// A HTTP response.
pub type HttpResponse = http::Response<hyper::Body>;

/// Create a header value for the binary protocol content type.
pub fn content_header_value() -> HeaderValue {
    HeaderValue::from_static(TWINRPC_CONTENT_MIMETYPE)
}

/// Create the header name for the protocol version header.
pub fn version_header_name() -> HeaderName {
    HeaderName::from_static("twinrpc-version")
}

/// Create a header value for the protocol version header.
pub fn version_header_value() -> HeaderValue {
    HeaderValue::from_static(TWINRPC_PROTOCOL_VERSION)
}

/// Helper methods for working with `HeaderMap`.
pub trait HeaderMapExt {
    /// Check if a header is equal to a bytes array. Ignores casing.
    fn header_eq(&self, key: &HeaderName, value: &[u8]) -> bool;
    /// Check if the content type is the binary protocol one, ignoring parameters.
    fn is_twinrpc_content(&self) -> bool;
    /// Append metadata to this map, prefixing every key with `prefix`.
    fn extend_prefixed(&mut self, prefix: &str, metadata: &MetadataMap);
}

impl HeaderMapExt for HeaderMap {
    fn header_eq(&self, key: &HeaderName, value: &[u8]) -> bool {
        self.get(key).map_or(false, |header| {
            header.as_bytes().eq_ignore_ascii_case(value)
        })
    }

    fn is_twinrpc_content(&self) -> bool {
        self.get(CONTENT_TYPE)
            .and_then(|t| t.to_str().ok())
            .and_then(|t| t.split(';').next())
            .map_or(false, |t| {
                t.trim().eq_ignore_ascii_case(TWINRPC_CONTENT_MIMETYPE)
            })
    }

    fn extend_prefixed(&mut self, prefix: &str, metadata: &MetadataMap) {
        for (key, value) in metadata.as_headers() {
            let name = format!("{}{}", prefix, key.as_str());
            // metadata keys are valid header names, and so are prefixed ones
            if let Ok(name) = HeaderName::from_bytes(name.as_bytes()) {
                self.append(name, value.clone());
            }
        }
    }
}

impl From<Body> for hyper::Body {
    fn from(body: Body) -> Self {
        hyper::Body::wrap_stream(body)
    }
}

impl From<hyper::Body> for Body {
    fn from(hbody: hyper::Body) -> Self {
        Body::new(hbody.map_err(|err| -> BoxError { Box::new(err) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_parameters_are_ignored() {
        let mut headers = HeaderMap::new();
        assert!(!headers.is_twinrpc_content());

        headers.insert(CONTENT_TYPE, content_header_value());
        assert!(headers.is_twinrpc_content());

        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("Application/TwinRPC; charset=utf-8"),
        );
        assert!(headers.is_twinrpc_content());

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert!(!headers.is_twinrpc_content());
    }

    #[test]
    fn prefixed_metadata() {
        let mut metadata = MetadataMap::new();
        metadata.append("code", "1").unwrap();
        metadata.append("code", "2").unwrap();

        let mut headers = HeaderMap::new();
        headers.extend_prefixed("grpc-metadata-", &metadata);

        let values: Vec<_> = headers.get_all("grpc-metadata-code").iter().collect();
        assert_eq!(values, ["1", "2"]);
    }
}
