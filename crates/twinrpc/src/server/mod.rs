use std::convert::Infallible;

use tower::Layer;

use router::{Routes, RoutesFinalized};
use service::RpcService;

use crate::{request::BoxRequest, response::BoxResponse};

/// Error types used by servers.
pub mod error;
/// Service discovery.
pub mod reflection;
/// The router used by twinrpc.
pub mod router;
/// Service types and handlers.
pub mod service;
/// Transports for serving routes.
pub mod transport;

mod macros;

pub use service::RpcLayer;

/// Prelude that exports commonly used server types.
pub mod prelude {
    pub use super::{
        error::{RouteError, ServerResult},
        router::Routes,
        service::{unary_handler, RpcLayer, RpcService},
        transport::Transport,
        MakeRoutes,
    };
    pub use crate::{
        bail, response::IntoResponse, Code, MetadataMap, Request, Response, ResponseChannel,
        Status,
    };
}

/// The core trait of twinrpc servers. It produces a set of [`Routes`],
/// and can be combined with other [`MakeRoutes`]s.
///
/// Not to be confused with [`tower::Service`].
pub trait MakeRoutes: Send + 'static {
    /// Creates a [`Routes`], which will be used to build a [`RoutesFinalized`] instance.
    fn make_routes(&self) -> Routes;

    /// Build the routes table once. Transports call this before serving,
    /// so a bad table fails start-up instead of a call.
    fn build_routes(&self) -> Result<RoutesFinalized, error::RouteError> {
        self.make_routes().build()
    }

    /// Combines this server with another server.
    fn combine_with<Other>(self, other: Other) -> ServiceStack<Other, Self>
    where
        Other: MakeRoutes,
        Self: Sized,
    {
        ServiceStack {
            outer: other,
            inner: self,
        }
    }

    /// Layers this server with a layer.
    ///
    /// If your layer does not implement [`Clone`], you can wrap it using
    /// [`RpcLayer::new`].
    fn layer<S, L>(self, layer: L) -> LayeredService<S, L, Self>
    where
        L: Layer<RpcService, Service = S> + Clone + Sync + Send + 'static,
        S: tower::Service<BoxRequest, Response = BoxResponse, Error = Infallible>
            + Clone
            + Send
            + 'static,
        S::Future: Send,
        Self: Sized,
    {
        LayeredService { inner: self, layer }
    }
}

/// Type that layers the handlers that are produced by a [`MakeRoutes`].
#[derive(Clone)]
pub struct LayeredService<S, L, M>
where
    L: Layer<RpcService, Service = S> + Clone + Sync + Send + 'static,
    S: tower::Service<BoxRequest, Response = BoxResponse, Error = Infallible>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
    M: MakeRoutes,
{
    inner: M,
    layer: L,
}

impl<S, L, M> MakeRoutes for LayeredService<S, L, M>
where
    L: Layer<RpcService, Service = S> + Clone + Sync + Send + 'static,
    S: tower::Service<BoxRequest, Response = BoxResponse, Error = Infallible>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
    M: MakeRoutes,
{
    fn make_routes(&self) -> Routes {
        MakeRoutes::make_routes(&self.inner).layer_all(self.layer.clone())
    }
}

/// Type that contains two [`MakeRoutes`]s and stacks (combines) them.
#[derive(Clone)]
pub struct ServiceStack<Outer, Inner>
where
    Outer: MakeRoutes,
    Inner: MakeRoutes,
{
    outer: Outer,
    inner: Inner,
}

impl<Outer, Inner> MakeRoutes for ServiceStack<Outer, Inner>
where
    Outer: MakeRoutes,
    Inner: MakeRoutes,
{
    fn make_routes(&self) -> Routes {
        let outer_rb = MakeRoutes::make_routes(&self.outer);
        let inner_rb = MakeRoutes::make_routes(&self.inner);
        outer_rb.combine_with(inner_rb)
    }
}

/// Serves nothing but the reflection service. Combine it with other
/// servers to make them discoverable.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reflection;

impl MakeRoutes for Reflection {
    fn make_routes(&self) -> Routes {
        Routes::new().with_reflection()
    }
}

#[cfg(test)]
mod tests {
    use tower::{layer::util::Identity, ServiceExt};

    use super::{prelude::*, Reflection};
    use crate::proto::{ListServicesRequest, ListServicesResponse};

    struct TestServer;

    impl MakeRoutes for TestServer {
        fn make_routes(&self) -> Routes {
            Routes::new().route(
                "/test.v1.Test/Ping",
                unary_handler(|req: Request<ListServicesRequest>| async move {
                    let _ = req.into_message().await?;
                    Ok::<_, Status>(Response::new(&ListServicesResponse::default()))
                }),
            )
        }
    }

    #[test]
    fn layered_identity() {
        let s = TestServer;

        // we can't poll it, and we don't want to anyways
        let _ = s.layer(RpcLayer::new(Identity::new()));
    }

    #[tokio::test]
    async fn combined_servers_are_discoverable() {
        let routes = TestServer.combine_with(Reflection).build_routes().unwrap();
        assert_eq!(
            routes.paths(),
            [
                "/test.v1.Test/Ping",
                "/twinrpc.reflection.v1.ServerReflection/ListServices"
            ]
        );

        let req = Request::new(&ListServicesRequest {})
            .with_endpoint(super::reflection::list_services_path())
            .map();
        let services = routes
            .oneshot(req)
            .await
            .unwrap()
            .map::<ListServicesResponse>()
            .into_message()
            .await
            .unwrap()
            .services;
        assert_eq!(
            services,
            ["test.v1.Test", "twinrpc.reflection.v1.ServerReflection"]
        );
    }
}
