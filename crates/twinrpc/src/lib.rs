//! Unary protobuf RPC served over two transports: a framed binary protocol
//! and a JSON gateway that transcodes into it.
//!
//! Every call carries inbound metadata, may attach header and trailer
//! metadata through its [`ResponseChannel`], and terminates with a
//! [`Status`] delivered in the final frame of the response.
#![deny(missing_docs)]

/// Some re-exported crates that might be useful while writing software with `twinrpc`.
pub mod exports {
    pub use bytes;
    pub use futures_util;
    pub use http;
    pub use prost;
    pub use tracing;

    #[cfg(feature = "_common")]
    pub use tower;

    #[cfg(feature = "server")]
    pub use async_trait::async_trait;
}

/// Common client types and functions.
#[cfg(feature = "client")]
pub mod client;
/// JSON gateway that transcodes HTTP/JSON calls into binary calls.
#[cfg(feature = "gateway")]
pub mod gateway;
/// Common server types and functions.
#[cfg(feature = "server")]
pub mod server;

/// Body utitilies and types.
pub mod body;
/// Per-call header / trailer metadata channel.
pub mod channel;
/// Common utilities.
pub mod common;
/// Decoding utilities.
pub mod decode;
/// Encoding utilities.
pub mod encode;
/// Framing of binary protocol response bodies.
pub mod frame;
/// Out-of-band metadata.
pub mod metadata;
/// Protocol messages.
pub mod proto;
/// The `Request` type used by twinrpc.
pub mod request;
/// The `Response` type used by twinrpc.
pub mod response;
/// Status codes and the `Status` type.
pub mod status;

#[doc(inline)]
pub use channel::ResponseChannel;
#[doc(inline)]
pub use metadata::MetadataMap;
#[doc(inline)]
pub use request::Request;
#[doc(inline)]
pub use response::Response;
#[doc(inline)]
pub use status::{Code, Status};

/// Alias for a type-erased error type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Convert any error to a [`BoxError`].
pub fn box_error<Err>(err: Err) -> BoxError
where
    Err: std::error::Error + Send + Sync + 'static,
{
    Box::new(err)
}

/// The binary protocol mimetype.
pub const TWINRPC_CONTENT_MIMETYPE: &str = "application/twinrpc";
/// The protocol version this version of `twinrpc` implements.
pub const TWINRPC_PROTOCOL_VERSION: &str = "1";
/// Prefix of headers reserved by the binary protocol.
pub const TWINRPC_HEADER_PREFIX: &str = "twinrpc-";
