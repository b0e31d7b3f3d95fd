use std::{
    borrow::Cow,
    error::Error as StdError,
    fmt::{self, Display, Formatter},
};

pub use crate::{channel::ResponseMetadata, decode::DecodeBodyError, frame::FrameError};
use crate::{Code, Status};

/// Convenience type for `Client` operation result.
pub type ClientResult<T, TransportError> = Result<T, ClientError<TransportError>>;

/// Errors that can occur within `Client` operation.
#[derive(Debug)]
pub enum ClientError<TransportError: StdError> {
    /// Occurs if an endpoint terminated the call with a non-OK status.
    EndpointError {
        /// The status the call terminated with.
        status: Status,
        /// Header and trailer metadata the server sent before failing.
        metadata: ResponseMetadata,
        /// The endpoint for which this error happened.
        endpoint: Cow<'static, str>,
    },
    /// Occurs if the data server responded with could not be decoded.
    MessageDecode(DecodeBodyError),
    /// Occurs if the response body wasn't correctly framed.
    Frame(FrameError),
    /// Occurs if the data server responded with is not supported for decoding.
    ContentNotSupported,
    /// Occurs if the server refused the request at the HTTP level.
    UnexpectedStatus(http::StatusCode),
    /// Occures if the underlying transport yields an error.
    Transport(TransportError),
    /// Occurs if the server speaks another protocol version.
    IncompatibleProtocolVersion,
}

impl<TransportError: StdError> ClientError<TransportError> {
    /// The status code this error maps to.
    ///
    /// Transport failures map to [`Code::Unavailable`], malformed responses
    /// to [`Code::Internal`].
    pub fn code(&self) -> Code {
        match self {
            ClientError::EndpointError { status, .. } => status.code(),
            ClientError::UnexpectedStatus(status) => Code::from_http_status(*status),
            ClientError::Transport(_) => Code::Unavailable,
            ClientError::MessageDecode(_)
            | ClientError::Frame(_)
            | ClientError::ContentNotSupported
            | ClientError::IncompatibleProtocolVersion => Code::Internal,
        }
    }

    /// Metadata the server sent before failing, if any.
    pub fn metadata(&self) -> Option<&ResponseMetadata> {
        match self {
            ClientError::EndpointError { metadata, .. } => Some(metadata),
            _ => None,
        }
    }
}

impl<TransportError: StdError> Display for ClientError<TransportError> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ClientError::EndpointError {
                status, endpoint, ..
            } => write!(f, "endpoint {} returned {}", endpoint, status),
            ClientError::ContentNotSupported => {
                write!(f, "server responded with a non twinrpc response")
            }
            ClientError::MessageDecode(err) => write!(
                f,
                "failed to decode response data as protobuf response: {}",
                err
            ),
            ClientError::Frame(err) => write!(f, "malformed response body: {}", err),
            ClientError::UnexpectedStatus(status) => {
                write!(f, "server responded with HTTP status {}", status)
            }
            ClientError::Transport(err) => write!(f, "transport error: {}", err),
            ClientError::IncompatibleProtocolVersion => {
                write!(f, "server twinrpc version is incompatible with ours")
            }
        }
    }
}

impl<TransportError: StdError> From<DecodeBodyError> for ClientError<TransportError> {
    fn from(err: DecodeBodyError) -> Self {
        ClientError::MessageDecode(err)
    }
}

impl<TransportError: StdError> From<FrameError> for ClientError<TransportError> {
    fn from(err: FrameError) -> Self {
        ClientError::Frame(err)
    }
}

impl<TransportError: StdError + 'static> StdError for ClientError<TransportError> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ClientError::EndpointError { status, .. } => Some(status),
            ClientError::MessageDecode(err) => Some(err),
            ClientError::Frame(err) => Some(err),
            ClientError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl<TransportError: StdError> From<ClientError<TransportError>> for Status {
    fn from(err: ClientError<TransportError>) -> Self {
        match err {
            ClientError::EndpointError { status, .. } => status,
            other => Status::new(other.code(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    type Error = ClientError<io::Error>;

    #[test]
    fn endpoint_errors_keep_their_status() {
        let err = Error::EndpointError {
            status: Status::invalid_argument("please input you name"),
            metadata: ResponseMetadata::default(),
            endpoint: "/a.B/C".into(),
        };
        assert_eq!(err.code(), Code::InvalidArgument);
        assert_eq!(
            Status::from(err),
            Status::invalid_argument("please input you name")
        );
    }

    #[test]
    fn transport_errors_are_unavailable() {
        let err = Error::Transport(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert_eq!(Status::from(err).code(), Code::Unavailable);
        assert_eq!(
            Error::UnexpectedStatus(http::StatusCode::METHOD_NOT_ALLOWED).code(),
            Code::from_http_status(http::StatusCode::METHOD_NOT_ALLOWED)
        );
    }
}
