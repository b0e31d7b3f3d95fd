use futures_util::future::BoxFuture;

use super::error::ClientResult;

/// Client HTTP transport.
#[cfg(feature = "http_hyper_client")]
pub mod http;

/// The mock transport. Useful for testing.
#[cfg(feature = "mock_client")]
pub mod mock;

/// Type alias for the future transports produce.
pub type CallResult<'a, T, TransportError> = BoxFuture<'a, ClientResult<T, TransportError>>;
