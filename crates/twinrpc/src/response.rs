use std::{
    fmt::{self, Debug, Formatter},
    marker::PhantomData,
};

use http::Extensions;
use prost::Message as PbMsg;

use crate::{
    body::Body,
    channel::ResponseMetadata,
    decode::{decode_body, DecodeBodyError},
    encode::encode_protobuf_message,
    MetadataMap, Status,
};

/// Response parts.
#[non_exhaustive]
#[derive(Debug)]
pub struct Parts {
    /// Body of a response.
    pub body: Body,
    /// Header and trailer metadata of a response.
    pub metadata: ResponseMetadata,
    /// Terminal status of a response.
    pub status: Status,
    /// Extensions of a response.
    pub extensions: Extensions,
}

impl<T> From<Response<T>> for Parts {
    fn from(resp: Response<T>) -> Self {
        resp.parts
    }
}

impl<T> From<Parts> for Response<T> {
    fn from(parts: Parts) -> Self {
        Self {
            parts,
            msg: PhantomData,
        }
    }
}

/// twinrpc response type.
///
/// A response always carries a [`Status`]. Responses with a non-OK status
/// have an empty body.
pub struct Response<T> {
    parts: Parts,
    msg: PhantomData<T>,
}

impl Response<()> {
    /// Creates a response with an empty body.
    pub fn empty() -> Self {
        Self::new_with_body(Body::empty())
    }
}

impl<T> Debug for Response<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("parts", &self.parts)
            .finish()
    }
}

impl<T> Response<T> {
    /// Creates a successful response with the provided body.
    pub fn new_with_body(body: Body) -> Self {
        Self {
            parts: Parts {
                body,
                metadata: ResponseMetadata::default(),
                status: Status::ok(),
                extensions: Extensions::new(),
            },
            msg: PhantomData,
        }
    }

    /// Get a mutable reference to the extensions of this response.
    #[inline]
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.parts.extensions
    }

    /// Get an immutable reference to the extensions of this response.
    #[inline]
    pub fn extensions(&self) -> &Extensions {
        &self.parts.extensions
    }

    /// Terminal status of this response.
    #[inline]
    pub fn status(&self) -> &Status {
        &self.parts.status
    }

    /// Header metadata of this response.
    #[inline]
    pub fn header(&self) -> &MetadataMap {
        &self.parts.metadata.header
    }

    /// Trailer metadata of this response.
    #[inline]
    pub fn trailer(&self) -> &MetadataMap {
        &self.parts.metadata.trailer
    }

    /// Header and trailer metadata of this response.
    #[inline]
    pub fn metadata(&self) -> &ResponseMetadata {
        &self.parts.metadata
    }

    /// Get a mutable reference to the header and trailer metadata of this response.
    #[inline]
    pub fn metadata_mut(&mut self) -> &mut ResponseMetadata {
        &mut self.parts.metadata
    }

    /// Replace the header and trailer metadata of this response.
    pub fn with_metadata(mut self, metadata: ResponseMetadata) -> Self {
        self.parts.metadata = metadata;
        self
    }

    pub(crate) fn map<M>(self) -> Response<M> {
        Response {
            parts: self.parts,
            msg: PhantomData,
        }
    }
}

impl<T: PbMsg> Response<T> {
    /// Create a new successful response.
    pub fn new(msg: &T) -> Response<T> {
        Self::new_with_body(Body::full(encode_protobuf_message(msg)))
    }
}

impl<T: PbMsg + Default> Response<T> {
    /// Extract the body from the response and decode it into the message.
    #[inline]
    pub async fn into_message(self) -> Result<T, DecodeBodyError> {
        decode_body(self.parts.body).await
    }
}

impl<T> From<Status> for Response<T> {
    fn from(status: Status) -> Self {
        let mut resp = Response::new_with_body(Body::empty());
        resp.parts.status = status;
        resp
    }
}

/// Trait used for converting any type to a Response type.
pub trait IntoResponse<T> {
    /// Convert this to a twinrpc response.
    fn into_response(self) -> Response<T>;
}

impl<T: PbMsg> IntoResponse<T> for T {
    fn into_response(self) -> Response<T> {
        Response::new(&self)
    }
}

impl<T> IntoResponse<T> for Response<T> {
    fn into_response(self) -> Response<T> {
        self
    }
}

/// A response that has a message type of `()`. Used in places where the
/// response message type is not important.
pub type BoxResponse = Response<()>;
