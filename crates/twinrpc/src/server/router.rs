use std::{
    collections::BTreeSet,
    convert::Infallible,
    sync::Arc,
    task::{Context, Poll},
};

use matchit::Router as Matcher;
use tower::{Layer, Service};

use super::{
    error::RouteError,
    reflection,
    service::{unimplemented, CallFuture, RpcService},
    RpcLayer,
};
use crate::{request::BoxRequest, response::BoxResponse};

/// Builder type for inserting [`RpcService`]s before building a [`RoutesFinalized`].
pub struct Routes {
    handlers: Vec<(String, RpcService)>,
    any: Option<RpcService>,
    all_layer: Option<RpcLayer>,
    reflection: bool,
}

impl Default for Routes {
    fn default() -> Self {
        Self::new()
    }
}

impl Routes {
    /// Create a new [`Routes`].
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            any: None,
            all_layer: None,
            reflection: false,
        }
    }

    /// Add a new route, served at `path` (`/{package}.{Service}/{Method}`).
    pub fn route<S>(mut self, path: impl Into<String>, handler: S) -> Self
    where
        S: Service<BoxRequest, Response = BoxResponse, Error = Infallible>
            + Clone
            + Send
            + 'static,
        S::Future: Send,
    {
        self.handlers.push((path.into(), RpcService::new(handler)));
        self
    }

    /// Layer the routes that were added until this.
    pub fn layer<L, S>(mut self, layer: L) -> Self
    where
        L: Layer<RpcService, Service = S>,
        S: Service<BoxRequest, Response = BoxResponse, Error = Infallible>
            + Clone
            + Send
            + 'static,
        S::Future: Send,
    {
        for (_, handler) in self.handlers.iter_mut() {
            let layered = handler.clone().layer(&layer);
            *handler = layered;
        }
        self
    }

    /// Set layer for the finalized router service.
    pub fn layer_all<L, S>(mut self, layer: L) -> Self
    where
        L: Layer<RpcService, Service = S> + Send + Sync + 'static,
        S: Service<BoxRequest, Response = BoxResponse, Error = Infallible>
            + Clone
            + Send
            + 'static,
        S::Future: Send,
    {
        self.all_layer = Some(RpcLayer::new(layer));
        self
    }

    /// Combine this with another [`Routes`]. Note that this cannot combine the `any` handler.
    pub fn combine_with(mut self, other_routes: impl Into<Routes>) -> Self {
        let mut other_routes = other_routes.into();
        self.handlers.append(&mut other_routes.handlers);
        self.reflection |= other_routes.reflection;
        self.all_layer = match (self.all_layer, other_routes.all_layer) {
            (Some(layer), Some(other_layer)) => Some(RpcLayer::stack(layer, other_layer)),
            (layer, other_layer) => layer.or(other_layer),
        };
        self
    }

    /// Set the service that will be used if no routes are matched.
    ///
    /// Defaults to a service answering [`crate::Code::Unimplemented`].
    pub fn any<S>(mut self, handler: S) -> Self
    where
        S: Service<BoxRequest, Response = BoxResponse, Error = Infallible>
            + Clone
            + Send
            + 'static,
        S::Future: Send,
    {
        self.any = Some(RpcService::new(handler));
        self
    }

    /// Serve the reflection service alongside the registered routes.
    pub fn with_reflection(mut self) -> Self {
        self.reflection = true;
        self
    }

    /// Build the routes into an immutable table.
    ///
    /// Fails if a path was registered more than once or isn't a valid path.
    pub fn build(mut self) -> Result<RoutesFinalized, RouteError> {
        if self.reflection {
            let mut services = self
                .handlers
                .iter()
                .filter_map(|(path, _)| service_name(path))
                .map(ToOwned::to_owned)
                .collect::<BTreeSet<_>>();
            services.insert(reflection::SERVICE_NAME.to_owned());
            self.handlers.push((
                reflection::list_services_path(),
                reflection::list_services(services.into_iter().collect()),
            ));
        }

        let mut matcher = Matcher::new();
        let mut paths = Vec::with_capacity(self.handlers.len());

        for (path, handler) in self.handlers {
            if paths.contains(&path) {
                return Err(RouteError::Conflict { path });
            }
            matcher
                .insert(path.clone(), handler)
                .map_err(|reason| RouteError::InvalidPath {
                    path: path.clone(),
                    reason,
                })?;
            paths.push(path);
        }
        paths.sort();

        let internal = RoutesInternal {
            matcher,
            any: self.any.unwrap_or_else(unimplemented),
        };

        let inner = match self.all_layer {
            Some(layer) => layer.layer(internal),
            None => RpcService::new(internal),
        };

        Ok(RoutesFinalized {
            inner,
            paths: paths.into(),
        })
    }
}

/// Extract the fully-qualified service name out of a method path.
pub(crate) fn service_name(path: &str) -> Option<&str> {
    let path = path.strip_prefix('/')?;
    let (service, method) = path.split_once('/')?;
    (!service.is_empty() && !method.is_empty() && !method.contains('/')).then(|| service)
}

#[derive(Clone)]
struct RoutesInternal {
    matcher: Matcher<RpcService>,
    any: RpcService,
}

impl Service<BoxRequest> for RoutesInternal {
    type Response = BoxResponse;

    type Error = Infallible;

    type Future = CallFuture<'static>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Ok(()).into()
    }

    fn call(&mut self, req: BoxRequest) -> Self::Future {
        match self.matcher.at_mut(req.endpoint()) {
            Ok(matched) => Service::call(matched.value, req),
            Err(_) => Service::call(&mut self.any, req),
        }
    }
}

/// Finalized [`Routes`], ready for serving as a [`Service`].
///
/// The table is immutable. Clones share the registered services.
#[derive(Clone)]
pub struct RoutesFinalized {
    inner: RpcService,
    paths: Arc<[String]>,
}

impl RoutesFinalized {
    /// Paths of every registered method, sorted.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }
}

impl Service<BoxRequest> for RoutesFinalized {
    type Response = BoxResponse;

    type Error = Infallible;

    type Future = CallFuture<'static>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Service::poll_ready(&mut self.inner, cx)
    }

    fn call(&mut self, req: BoxRequest) -> Self::Future {
        Service::call(&mut self.inner, req)
    }
}

#[cfg(test)]
mod tests {
    use tower::ServiceExt;

    use super::*;
    use crate::{
        proto::{Empty, ListServicesRequest, ListServicesResponse},
        server::service::unary_handler,
        Code, Request, Response, Status,
    };

    fn empty_handler() -> RpcService {
        unary_handler(|_: Request<Empty>| async { Ok(Response::new(&Empty {})) })
    }

    fn request_to(path: &'static str) -> BoxRequest {
        Request::new(&Empty {}).with_endpoint(path).map()
    }

    #[test]
    fn service_names() {
        assert_eq!(service_name("/a.b.Greeter/SayHello"), Some("a.b.Greeter"));
        assert_eq!(service_name("a.b.Greeter/SayHello"), None);
        assert_eq!(service_name("/a.b.Greeter/"), None);
        assert_eq!(service_name("/a/b/c"), None);
    }

    #[test]
    fn duplicate_paths_are_rejected() {
        let res = Routes::new()
            .route("/pkg.Svc/Method", empty_handler())
            .route("/pkg.Svc/Method", empty_handler())
            .build();
        assert!(matches!(res, Err(RouteError::Conflict { path }) if path == "/pkg.Svc/Method"));
    }

    #[tokio::test]
    async fn unknown_methods_are_unimplemented() {
        let routes = Routes::new()
            .route("/pkg.Svc/Method", empty_handler())
            .build()
            .unwrap();

        let resp = routes
            .clone()
            .oneshot(request_to("/pkg.Svc/Missing"))
            .await
            .unwrap();
        assert_eq!(resp.status().code(), Code::Unimplemented);

        let resp = routes.oneshot(request_to("/pkg.Svc/Method")).await.unwrap();
        assert!(resp.status().is_ok());
    }

    #[tokio::test]
    async fn reflection_lists_services() {
        let routes = Routes::new()
            .route("/b.v2.Svc/Method", empty_handler())
            .route("/a.v1.Svc/Method", empty_handler())
            .route("/a.v1.Svc/Other", empty_handler())
            .with_reflection()
            .build()
            .unwrap();

        let req: BoxRequest = Request::new(&ListServicesRequest {})
            .with_endpoint(reflection::list_services_path())
            .map();
        let resp = routes.oneshot(req).await.unwrap();
        let services = resp
            .map::<ListServicesResponse>()
            .into_message()
            .await
            .unwrap()
            .services;
        assert_eq!(
            services,
            [
                "a.v1.Svc",
                "b.v2.Svc",
                "twinrpc.reflection.v1.ServerReflection"
            ]
        );
    }

    #[tokio::test]
    async fn layer_all_wraps_unknown_methods_too() {
        #[derive(Clone)]
        struct Teapot<S>(S);

        impl<S> Service<BoxRequest> for Teapot<S>
        where
            S: Service<BoxRequest, Response = BoxResponse, Error = Infallible>,
            S::Future: Send + 'static,
        {
            type Response = BoxResponse;
            type Error = Infallible;
            type Future = CallFuture<'static>;

            fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
                self.0.poll_ready(cx)
            }

            fn call(&mut self, req: BoxRequest) -> Self::Future {
                let fut = self.0.call(req);
                Box::pin(async move {
                    let resp = fut.await?;
                    Ok(if resp.status().code() == Code::Unimplemented {
                        Status::not_found("teapot").into()
                    } else {
                        resp
                    })
                })
            }
        }

        let routes = Routes::new()
            .layer_all(tower::layer::layer_fn(Teapot))
            .build()
            .unwrap();
        let resp = routes.oneshot(request_to("/x.Y/Z")).await.unwrap();
        assert_eq!(resp.status().code(), Code::NotFound);
    }
}
