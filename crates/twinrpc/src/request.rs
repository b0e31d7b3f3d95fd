use std::{
    borrow::Cow,
    fmt::{self, Debug, Formatter},
    marker::PhantomData,
};

use http::Extensions;
use prost::Message as PbMsg;

use crate::{
    body::Body, decode::*, encode::encode_protobuf_message, MetadataMap, ResponseChannel,
};

/// Request parts.
#[non_exhaustive]
#[derive(Debug)]
pub struct Parts {
    /// Body of a request.
    pub body: Body,
    /// Inbound metadata of a request.
    pub metadata: MetadataMap,
    /// Extensions of a request.
    pub extensions: Extensions,
    /// Endpoint of a request.
    pub endpoint: Cow<'static, str>,
}

impl<T> From<Request<T>> for Parts {
    fn from(req: Request<T>) -> Self {
        req.parts
    }
}

impl<T> From<Parts> for Request<T> {
    fn from(parts: Parts) -> Self {
        Self {
            parts,
            message: PhantomData,
        }
    }
}

/// A twinrpc request.
pub struct Request<T> {
    parts: Parts,
    message: PhantomData<T>,
}

impl<T> Debug for Request<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("parts", &self.parts)
            .finish()
    }
}

impl<T> Request<T> {
    /// Creates a new request using the provided body.
    pub fn new_with_body(body: Body) -> Self {
        Self {
            parts: Parts {
                body,
                metadata: MetadataMap::new(),
                extensions: Extensions::new(),
                endpoint: Cow::Borrowed(""),
            },
            message: PhantomData,
        }
    }

    /// Get a mutable reference to the extensions of this request.
    #[inline]
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.parts.extensions
    }

    /// Get an immutable reference to the extensions of this request.
    #[inline]
    pub fn extensions(&self) -> &Extensions {
        &self.parts.extensions
    }

    /// Get a mutable reference to the endpoint of this request.
    #[inline]
    pub fn endpoint_mut(&mut self) -> &mut Cow<'static, str> {
        &mut self.parts.endpoint
    }

    /// Get an immutable reference to the endpoint of this request.
    #[inline]
    pub fn endpoint(&self) -> &str {
        self.parts.endpoint.as_ref()
    }

    /// Inbound metadata of this request.
    #[inline]
    pub fn metadata(&self) -> &MetadataMap {
        &self.parts.metadata
    }

    /// Get a mutable reference to the inbound metadata of this request.
    #[inline]
    pub fn metadata_mut(&mut self) -> &mut MetadataMap {
        &mut self.parts.metadata
    }

    /// Set the endpoint of this request.
    pub fn with_endpoint(mut self, endpoint: impl Into<Cow<'static, str>>) -> Self {
        self.parts.endpoint = endpoint.into();
        self
    }

    /// Set the inbound metadata of this request.
    pub fn with_metadata(mut self, metadata: MetadataMap) -> Self {
        self.parts.metadata = metadata;
        self
    }

    /// The response channel of the call this request belongs to.
    ///
    /// Requests that weren't dispatched through a handler return a detached
    /// channel, which rejects every write.
    pub fn response_channel(&self) -> ResponseChannel {
        self.parts
            .extensions
            .get::<ResponseChannel>()
            .cloned()
            .unwrap_or_else(ResponseChannel::detached)
    }

    pub(crate) fn map<M>(self) -> Request<M> {
        Request {
            parts: self.parts,
            message: PhantomData,
        }
    }
}

impl<T: PbMsg> Request<T> {
    /// Create a new request with the specified message.
    pub fn new(msg: &T) -> Self {
        Self::new_with_body(Body::full(encode_protobuf_message(msg)))
    }
}

impl<T: PbMsg + Default> Request<T> {
    /// Extract the body from the request and decode it into the message.
    #[inline]
    pub async fn into_message(self) -> Result<T, DecodeBodyError> {
        decode_body(self.parts.body).await
    }

    /// Decode the message while keeping the rest of the request around.
    pub async fn into_parts_message(self) -> Result<(T, Request<()>), DecodeBodyError> {
        let Parts {
            body,
            metadata,
            extensions,
            endpoint,
        } = self.parts;
        let message = decode_body(body).await?;
        let rest = Request::from(Parts {
            body: Body::empty(),
            metadata,
            extensions,
            endpoint,
        });
        Ok((message, rest))
    }
}

/// Trait used for blanket impls on generated protobuf types.
pub trait IntoRequest<T> {
    /// Convert this to a twinrpc request.
    fn into_request(self) -> Request<T>;
}

impl<T: PbMsg> IntoRequest<T> for T {
    fn into_request(self) -> Request<Self> {
        Request::new(&self)
    }
}

impl<T> IntoRequest<T> for Request<T> {
    fn into_request(self) -> Request<T> {
        self
    }
}

/// A request that has a message type of `()`. Used in places where the
/// request message type is not important.
pub type BoxRequest = Request<()>;
