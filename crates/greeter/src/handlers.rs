use twinrpc::{exports::async_trait, server::prelude::*};

use crate::contract::{
    Empty, EqMetadataResponse, Greeter, HelloReply, HelloRequest, MetadataRequest, StatusRequest,
};

/// Metadata the `Status` method attaches next to the status it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum StatusSideChannel {
    /// Attach nothing.
    None,
    /// Header `hello: buffer`.
    Header,
    /// Trailer `buf: buffer`.
    #[default]
    Trailer,
}

/// Behavior toggles of [`GreeterService`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerConfig {
    /// Reject empty names in `SayHello`.
    pub strict_names: bool,
    /// Make `SayHello` send a fixed header and trailer.
    pub hello_metadata: bool,
    /// See [`StatusSideChannel`].
    pub status_side_channel: StatusSideChannel,
}

/// The Greeter handler set. It holds no per-call state, so every version of
/// the contract can share one instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreeterService {
    config: HandlerConfig,
}

impl GreeterService {
    pub fn new(config: HandlerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }
}

fn pairs(pairs: &[(&str, &str)]) -> Result<MetadataMap, Status> {
    MetadataMap::try_from(pairs)
}

#[async_trait]
impl Greeter for GreeterService {
    async fn say_hello(&self, request: Request<HelloRequest>) -> ServerResult<Response<HelloReply>> {
        let channel = request.response_channel();
        let HelloRequest { name } = request.into_message().await?;

        if self.config.strict_names && name.is_empty() {
            bail!((Code::InvalidArgument, "please input you name"));
        }

        if self.config.hello_metadata {
            channel.set_header(pairs(&[("header-key", "val")])?)?;
            channel.set_trailer(pairs(&[("trailer-key", "val")])?)?;
        }

        Ok(HelloReply {
            message: format!("hello {}", name),
        }
        .into_response())
    }

    async fn eq_metadata(
        &self,
        request: Request<MetadataRequest>,
    ) -> ServerResult<Response<EqMetadataResponse>> {
        let inbound = request.metadata().clone();
        let message = request.into_message().await?;

        let ok = message
            .metadata
            .iter()
            .all(|(key, value)| inbound.get_exact(key) == Some(value.as_str()));

        Ok(EqMetadataResponse { ok }.into_response())
    }

    async fn metadata(&self, request: Request<MetadataRequest>) -> ServerResult<Response<Empty>> {
        let channel = request.response_channel();
        let message = request.into_message().await?;

        channel.set_header(MetadataMap::try_from(message.metadata)?)?;

        Ok(Empty {}.into_response())
    }

    async fn trailer(&self, request: Request<MetadataRequest>) -> ServerResult<Response<Empty>> {
        let channel = request.response_channel();
        let message = request.into_message().await?;

        channel.set_trailer(MetadataMap::try_from(message.metadata)?)?;

        Ok(Empty {}.into_response())
    }

    async fn status(&self, request: Request<StatusRequest>) -> ServerResult<Response<Empty>> {
        let channel = request.response_channel();
        let StatusRequest {
            status_code,
            error_message,
        } = request.into_message().await?;

        let code = Code::from_i32(status_code).ok_or_else(|| {
            Status::invalid_argument(format!("unknown status code {}", status_code))
        })?;

        match self.config.status_side_channel {
            StatusSideChannel::None => {}
            StatusSideChannel::Header => channel.set_header(pairs(&[("hello", "buffer")])?)?,
            StatusSideChannel::Trailer => channel.set_trailer(pairs(&[("buf", "buffer")])?)?,
        }

        if code == Code::Ok {
            return Ok(Empty {}.into_response());
        }
        Err(Status::new(code, error_message))
    }
}
