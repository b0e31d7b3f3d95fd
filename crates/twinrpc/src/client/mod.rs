use std::{
    borrow::Cow,
    error::Error as StdError,
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

use tower::{Service, ServiceExt};

use crate::{
    request::BoxRequest,
    response::{self, BoxResponse},
    Request, Response,
};

use error::*;

/// Error types.
pub mod error;
/// twinrpc client transports.
pub mod transport;

#[doc(hidden)]
pub mod prelude {
    pub use super::{
        error::{ClientError, ClientResult},
        Client,
    };
    pub use crate::{request::IntoRequest, MetadataMap, Request, Response};
    pub use std::{borrow::Cow, convert::TryInto, fmt::Debug};
}

/// Generic client implementation with common methods.
///
/// `Inner` is a transport: a [`Service`] that takes a request and produces
/// the raw response of the call, whatever its status.
pub struct Client<Inner> {
    transport: Inner,
    modify_request_preflight: Arc<dyn Fn(&mut BoxRequest) + Send + Sync>,
}

impl<Inner: Debug> Debug for Client<Inner> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("inner", &self.transport)
            .finish()
    }
}

impl<Inner: Clone> Clone for Client<Inner> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            modify_request_preflight: self.modify_request_preflight.clone(),
        }
    }
}

impl<Inner> Client<Inner> {
    /// Create a new client using the provided transport.
    pub fn new(transport: Inner) -> Self {
        Self {
            transport,
            modify_request_preflight: Arc::new(|_| ()),
        }
    }

    /// Set the function to modify request with before sending a request.
    pub fn modify_request_preflight_with(
        mut self,
        f: Arc<dyn Fn(&mut BoxRequest) + Send + Sync>,
    ) -> Self {
        self.modify_request_preflight = f;
        self
    }
}

impl<Inner, TransportError> Client<Inner>
where
    Inner: Service<BoxRequest, Response = BoxResponse, Error = ClientError<TransportError>>,
    TransportError: StdError,
{
    /// Executes a unary request.
    ///
    /// A call that terminates with a non-OK status yields
    /// [`ClientError::EndpointError`], carrying the status and whatever
    /// metadata the server sent.
    pub async fn execute_request<Req, Resp>(
        &mut self,
        req: Request<Req>,
    ) -> ClientResult<Response<Resp>, TransportError>
    where
        Req: prost::Message,
        Resp: prost::Message + Default,
    {
        let mut req = req.map::<()>();
        (self.modify_request_preflight)(&mut req);
        let endpoint: Cow<'static, str> = Cow::Owned(req.endpoint().to_owned());

        tracing::trace!("calling {}", endpoint);
        let resp = self.transport.ready().await?.call(req).await?;

        if !resp.status().is_ok() {
            let response::Parts {
                status, metadata, ..
            } = resp.into();
            return Err(ClientError::EndpointError {
                status,
                metadata,
                endpoint,
            });
        }

        Ok(resp.map())
    }
}

#[cfg(all(test, feature = "mock_client", feature = "mock_server"))]
mod tests {
    use super::{transport::mock::Mock as MockClient, *};
    use crate::{
        common::transport::mock::new_mock_channels,
        proto::Empty,
        server::{
            prelude::*,
            transport::{mock::Mock as MockServer, Transport},
        },
        Code, Status,
    };

    struct Failing;

    impl MakeRoutes for Failing {
        fn make_routes(&self) -> Routes {
            Routes::new().route(
                "/pkg.Svc/Fail",
                unary_handler(|req: Request<Empty>| async move {
                    let mut header = MetadataMap::new();
                    header.insert("seen", req.metadata().get("who").unwrap_or("nobody"))?;
                    req.response_channel().set_header(header)?;
                    Err::<Response<Empty>, _>(Status::not_found("nothing here"))
                }),
            )
        }
    }

    #[tokio::test]
    async fn failed_calls_carry_status_and_metadata() {
        let (tx, rx) = new_mock_channels();
        tokio::spawn(MockServer::new(rx).serve(Failing));

        let mut client = Client::new(MockClient::new(tx)).modify_request_preflight_with(
            Arc::new(|req: &mut BoxRequest| {
                let _ = req.metadata_mut().insert("who", "client");
            }),
        );

        let err = client
            .execute_request::<_, Empty>(Request::new(&Empty {}).with_endpoint("/pkg.Svc/Fail"))
            .await
            .unwrap_err();

        match err {
            ClientError::EndpointError {
                status,
                metadata,
                endpoint,
            } => {
                assert_eq!(status, Status::not_found("nothing here"));
                assert_eq!(metadata.header.get("seen"), Some("client"));
                assert_eq!(endpoint, "/pkg.Svc/Fail");
            }
            other => panic!("unexpected error: {}", other),
        }

        let err = client
            .execute_request::<_, Empty>(Request::new(&Empty {}).with_endpoint("/pkg.Svc/Gone"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unimplemented);
    }
}
