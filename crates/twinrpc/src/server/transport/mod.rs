use futures_util::future::BoxFuture;

use super::MakeRoutes;

/// Serves the routes of a [`MakeRoutes`] until it stops or fails.
///
/// Implementations build the routes table once, before accepting calls.
pub trait Transport: Sized {
    /// What serving can fail with.
    type Error;

    /// Build the routes of `mk_routes` and serve them.
    fn serve<S>(self, mk_routes: S) -> BoxFuture<'static, Result<(), Self::Error>>
    where
        S: MakeRoutes;
}

/// Binary protocol over HTTP.
#[cfg(feature = "http_server")]
pub mod http;

/// In-process transport fed by a channel, for tests.
#[cfg(feature = "mock_server")]
pub mod mock;
