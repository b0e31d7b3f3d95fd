/// Common code to work with the HTTP transport.
#[cfg(feature = "_common_http")]
pub mod http;

/// Common code to work with the mock transport.
#[cfg(feature = "_common_mock")]
pub mod mock;
