//! The `Greeter` service contract.
//!
//! Both API versions expose the same methods and messages; they only differ
//! in package, so a v1 call is never routed to a v2 method or the other way
//! around.

use std::collections::HashMap;

use prost::Message;
use serde::{Deserialize, Serialize};

/// A contract version of the Greeter service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiVersion {
    /// `example.greeter.v1.services`
    V1,
    /// `example.greeter.v2.services`
    V2,
}

impl ApiVersion {
    /// Every served version.
    pub const ALL: [ApiVersion; 2] = [ApiVersion::V1, ApiVersion::V2];

    /// Protobuf package of this version.
    pub const fn package(self) -> &'static str {
        match self {
            ApiVersion::V1 => "example.greeter.v1.services",
            ApiVersion::V2 => "example.greeter.v2.services",
        }
    }

    /// Fully-qualified name of the Greeter service of this version.
    pub const fn service_name(self) -> &'static str {
        match self {
            ApiVersion::V1 => "example.greeter.v1.services.Greeter",
            ApiVersion::V2 => "example.greeter.v2.services.Greeter",
        }
    }

    /// Path of `method` in this version.
    pub fn path(self, method: GreeterMethod) -> &'static str {
        let paths = match self {
            ApiVersion::V1 => &V1_PATHS,
            ApiVersion::V2 => &V2_PATHS,
        };
        paths[method as usize]
    }
}

/// Methods of the Greeter service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GreeterMethod {
    /// `SayHello`
    SayHello = 0,
    /// `EqMetadata`
    EqMetadata = 1,
    /// `Metadata`
    Metadata = 2,
    /// `Trailer`
    Trailer = 3,
    /// `Status`
    Status = 4,
}

impl GreeterMethod {
    /// Every method, in declaration order.
    pub const ALL: [GreeterMethod; 5] = [
        GreeterMethod::SayHello,
        GreeterMethod::EqMetadata,
        GreeterMethod::Metadata,
        GreeterMethod::Trailer,
        GreeterMethod::Status,
    ];

    /// Name of the method as declared in the service.
    pub const fn name(self) -> &'static str {
        match self {
            GreeterMethod::SayHello => "SayHello",
            GreeterMethod::EqMetadata => "EqMetadata",
            GreeterMethod::Metadata => "Metadata",
            GreeterMethod::Trailer => "Trailer",
            GreeterMethod::Status => "Status",
        }
    }
}

const V1_PATHS: [&str; 5] = [
    "/example.greeter.v1.services.Greeter/SayHello",
    "/example.greeter.v1.services.Greeter/EqMetadata",
    "/example.greeter.v1.services.Greeter/Metadata",
    "/example.greeter.v1.services.Greeter/Trailer",
    "/example.greeter.v1.services.Greeter/Status",
];

const V2_PATHS: [&str; 5] = [
    "/example.greeter.v2.services.Greeter/SayHello",
    "/example.greeter.v2.services.Greeter/EqMetadata",
    "/example.greeter.v2.services.Greeter/Metadata",
    "/example.greeter.v2.services.Greeter/Trailer",
    "/example.greeter.v2.services.Greeter/Status",
];

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HelloRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HelloReply {
    #[prost(string, tag = "1")]
    pub message: String,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetadataRequest {
    #[prost(map = "string, string", tag = "1")]
    pub metadata: HashMap<String, String>,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EqMetadataResponse {
    #[prost(bool, tag = "1")]
    pub ok: bool,
}

/// Asks the `Status` method to terminate with the given status.
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusRequest {
    /// Numeric status code, see [`twinrpc::Code`].
    #[prost(int32, tag = "1")]
    #[serde(alias = "status_code")]
    pub status_code: i32,
    #[prost(string, tag = "2")]
    #[serde(alias = "error_message")]
    pub error_message: String,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
pub struct Empty {}

/// Server side of the contract.
#[allow(unused_variables)]
pub mod greeter_server {
    use twinrpc::{exports::async_trait, server::prelude::*};

    use super::*;

    /// Trait containing the Greeter methods that should be implemented for
    /// use with [`GreeterServer`]. Unimplemented methods answer
    /// [`Code::Unimplemented`].
    #[async_trait]
    pub trait Greeter: Clone + Send + Sync + Sized + 'static {
        /// Greets `name`.
        async fn say_hello(
            &self,
            request: Request<HelloRequest>,
        ) -> ServerResult<Response<HelloReply>> {
            Err(Status::unimplemented("SayHello is not implemented"))
        }

        /// Checks the request metadata against the call's inbound metadata.
        async fn eq_metadata(
            &self,
            request: Request<MetadataRequest>,
        ) -> ServerResult<Response<EqMetadataResponse>> {
            Err(Status::unimplemented("EqMetadata is not implemented"))
        }

        /// Sends the request metadata back as header metadata.
        async fn metadata(&self, request: Request<MetadataRequest>) -> ServerResult<Response<Empty>> {
            Err(Status::unimplemented("Metadata is not implemented"))
        }

        /// Sends the request metadata back as trailer metadata.
        async fn trailer(&self, request: Request<MetadataRequest>) -> ServerResult<Response<Empty>> {
            Err(Status::unimplemented("Trailer is not implemented"))
        }

        /// Terminates the call with the requested status.
        async fn status(&self, request: Request<StatusRequest>) -> ServerResult<Response<Empty>> {
            Err(Status::unimplemented("Status is not implemented"))
        }
    }

    /// Serves a [`Greeter`] under the package of one [`ApiVersion`].
    #[derive(Debug, Clone)]
    pub struct GreeterServer<T: Greeter> {
        service: T,
        version: ApiVersion,
    }

    impl<T: Greeter> GreeterServer<T> {
        /// Create a new service server.
        pub fn new(service: T, version: ApiVersion) -> Self {
            Self { service, version }
        }
    }

    impl<T: Greeter> MakeRoutes for GreeterServer<T> {
        fn make_routes(&self) -> Routes {
            let version = self.version;

            let say_hello = {
                let svc = self.service.clone();
                unary_handler(move |req: Request<HelloRequest>| async move {
                    svc.say_hello(req).await
                })
            };
            let eq_metadata = {
                let svc = self.service.clone();
                unary_handler(move |req: Request<MetadataRequest>| async move {
                    svc.eq_metadata(req).await
                })
            };
            let metadata = {
                let svc = self.service.clone();
                unary_handler(move |req: Request<MetadataRequest>| async move {
                    svc.metadata(req).await
                })
            };
            let trailer = {
                let svc = self.service.clone();
                unary_handler(move |req: Request<MetadataRequest>| async move {
                    svc.trailer(req).await
                })
            };
            let status = {
                let svc = self.service.clone();
                unary_handler(move |req: Request<StatusRequest>| async move {
                    svc.status(req).await
                })
            };

            Routes::new()
                .route(version.path(GreeterMethod::SayHello), say_hello)
                .route(version.path(GreeterMethod::EqMetadata), eq_metadata)
                .route(version.path(GreeterMethod::Metadata), metadata)
                .route(version.path(GreeterMethod::Trailer), trailer)
                .route(version.path(GreeterMethod::Status), status)
        }
    }
}

/// Client side of the contract.
pub mod greeter_client {
    use std::error::Error as StdError;

    use twinrpc::{
        client::{
            prelude::*,
            transport::http::{Hyper, HyperError},
        },
        exports::{http::Uri, tower::Service},
        request::BoxRequest,
        response::BoxResponse,
    };

    use super::*;

    /// Binary protocol client of the Greeter service of one [`ApiVersion`].
    #[derive(Debug, Clone)]
    pub struct GreeterClient<Inner> {
        inner: Client<Inner>,
        version: ApiVersion,
    }

    impl<Inner> GreeterClient<Inner> {
        /// Create a client on top of a transport.
        pub fn new_transport(transport: Inner, version: ApiVersion) -> Self {
            Self::new_inner(Client::new(transport), version)
        }

        /// Create a client on top of a generic client.
        pub fn new_inner(client: Client<Inner>, version: ApiVersion) -> Self {
            Self {
                inner: client,
                version,
            }
        }

        fn endpoint(&self, method: GreeterMethod) -> Cow<'static, str> {
            Cow::Borrowed(self.version.path(method))
        }
    }

    impl GreeterClient<Hyper> {
        /// Create a client calling the server at `server` over HTTP.
        pub fn new<U>(server: U, version: ApiVersion) -> ClientResult<Self, HyperError>
        where
            U: TryInto<Uri>,
            U::Error: Into<twinrpc::exports::http::Error>,
        {
            let server = server
                .try_into()
                .map_err(|err| HyperError::FailedRequestBuilder(err.into()))?;
            let transport = Hyper::new(server)?;
            Ok(Self::new_transport(transport, version))
        }
    }

    impl<Inner, InnerErr> GreeterClient<Inner>
    where
        Inner: Service<BoxRequest, Response = BoxResponse, Error = ClientError<InnerErr>>,
        InnerErr: StdError,
    {
        /// Call `SayHello`.
        pub async fn say_hello<Req>(&mut self, req: Req) -> ClientResult<Response<HelloReply>, InnerErr>
        where
            Req: IntoRequest<HelloRequest>,
        {
            let mut req = req.into_request();
            *req.endpoint_mut() = self.endpoint(GreeterMethod::SayHello);
            self.inner.execute_request(req).await
        }

        /// Call `EqMetadata`.
        pub async fn eq_metadata<Req>(
            &mut self,
            req: Req,
        ) -> ClientResult<Response<EqMetadataResponse>, InnerErr>
        where
            Req: IntoRequest<MetadataRequest>,
        {
            let mut req = req.into_request();
            *req.endpoint_mut() = self.endpoint(GreeterMethod::EqMetadata);
            self.inner.execute_request(req).await
        }

        /// Call `Metadata`.
        pub async fn metadata<Req>(&mut self, req: Req) -> ClientResult<Response<Empty>, InnerErr>
        where
            Req: IntoRequest<MetadataRequest>,
        {
            let mut req = req.into_request();
            *req.endpoint_mut() = self.endpoint(GreeterMethod::Metadata);
            self.inner.execute_request(req).await
        }

        /// Call `Trailer`.
        pub async fn trailer<Req>(&mut self, req: Req) -> ClientResult<Response<Empty>, InnerErr>
        where
            Req: IntoRequest<MetadataRequest>,
        {
            let mut req = req.into_request();
            *req.endpoint_mut() = self.endpoint(GreeterMethod::Trailer);
            self.inner.execute_request(req).await
        }

        /// Call `Status`.
        pub async fn status<Req>(&mut self, req: Req) -> ClientResult<Response<Empty>, InnerErr>
        where
            Req: IntoRequest<StatusRequest>,
        {
            let mut req = req.into_request();
            *req.endpoint_mut() = self.endpoint(GreeterMethod::Status);
            self.inner.execute_request(req).await
        }
    }
}

/// JSON gateway routes of the contract.
pub mod greeter_gateway {
    use std::error::Error as StdError;

    use twinrpc::{
        client::error::ClientError,
        exports::{http::Method, tower::Service},
        gateway::Gateway,
        request::BoxRequest,
        response::BoxResponse,
    };

    use super::*;

    /// Register the gateway routes of `version` on `gateway`.
    ///
    /// v1 uses REST-style routes, v2 mirrors the fully-qualified method
    /// paths.
    pub fn gateway_routes<Inner, InnerErr>(
        version: ApiVersion,
        gateway: Gateway<Inner>,
    ) -> Gateway<Inner>
    where
        Inner: Service<BoxRequest, Response = BoxResponse, Error = ClientError<InnerErr>>
            + Clone
            + Send
            + Sync
            + 'static,
        Inner::Future: Send,
        InnerErr: StdError + Send + 'static,
    {
        let path = |method: GreeterMethod| version.path(method);
        let (say_hello, eq_metadata, metadata, trailer, status) = match version {
            ApiVersion::V1 => (
                "/v1/greeter/hello",
                "/v1/greeter/metadata/eq",
                "/v1/greeter/metadata",
                "/v1/greeter/trailer",
                "/v1/greeter/status",
            ),
            ApiVersion::V2 => (
                path(GreeterMethod::SayHello),
                path(GreeterMethod::EqMetadata),
                path(GreeterMethod::Metadata),
                path(GreeterMethod::Trailer),
                path(GreeterMethod::Status),
            ),
        };

        let gateway = match version {
            ApiVersion::V1 => gateway.route::<HelloRequest, HelloReply>(
                Method::GET,
                "/v1/greeter/hello/:name",
                path(GreeterMethod::SayHello),
            ),
            ApiVersion::V2 => gateway,
        };

        gateway
            .route::<HelloRequest, HelloReply>(
                Method::POST,
                say_hello,
                path(GreeterMethod::SayHello),
            )
            .route::<MetadataRequest, EqMetadataResponse>(
                Method::POST,
                eq_metadata,
                path(GreeterMethod::EqMetadata),
            )
            .route::<MetadataRequest, Empty>(
                Method::POST,
                metadata,
                path(GreeterMethod::Metadata),
            )
            .route::<MetadataRequest, Empty>(Method::POST, trailer, path(GreeterMethod::Trailer))
            .route::<StatusRequest, Empty>(Method::POST, status, path(GreeterMethod::Status))
    }
}

pub use greeter_client::GreeterClient;
pub use greeter_gateway::gateway_routes;
pub use greeter_server::{Greeter, GreeterServer};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_do_not_share_paths() {
        for method in GreeterMethod::ALL {
            let v1 = ApiVersion::V1.path(method);
            let v2 = ApiVersion::V2.path(method);
            assert_ne!(v1, v2);
            assert_eq!(
                v1,
                format!("/{}/{}", ApiVersion::V1.service_name(), method.name())
            );
            assert_eq!(
                v2,
                format!("/{}.Greeter/{}", ApiVersion::V2.package(), method.name())
            );
        }
    }

    #[test]
    fn json_accepts_both_field_spellings() {
        let camel: StatusRequest =
            serde_json::from_str(r#"{"statusCode": 5, "errorMessage": "gone"}"#).unwrap();
        let snake: StatusRequest =
            serde_json::from_str(r#"{"status_code": 5, "error_message": "gone"}"#).unwrap();
        assert_eq!(camel, snake);
        assert_eq!(camel.status_code, 5);

        let empty: HelloRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.name, "");

        assert_eq!(
            serde_json::to_value(&StatusRequest {
                status_code: 3,
                error_message: "bad".to_owned(),
            })
            .unwrap(),
            serde_json::json!({"statusCode": 3, "errorMessage": "bad"})
        );
    }
}
