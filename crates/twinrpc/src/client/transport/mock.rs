use std::{
    error::Error as StdError,
    fmt::{self, Display, Formatter},
    task::{Context, Poll},
};

use futures_channel::oneshot;
use tower::Service;

use super::CallResult;
use crate::{
    client::error::ClientError, common::transport::mock::MockSender, request::BoxRequest,
    response::BoxResponse,
};

/// Client transport that hands each call to an in-process server over a
/// channel and waits for its response on a oneshot.
#[derive(Clone)]
pub struct Mock {
    tx: MockSender,
}

impl Mock {
    /// Create a transport sending calls into `tx`.
    pub fn new(tx: MockSender) -> Self {
        Self { tx }
    }
}

impl Service<BoxRequest> for Mock {
    type Response = BoxResponse;

    type Error = ClientError<MockError>;

    type Future = CallResult<'static, BoxResponse, MockError>;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Ok(()).into()
    }

    fn call(&mut self, req: BoxRequest) -> Self::Future {
        let (resp_tx, resp_rx) = oneshot::channel();
        let send_res = self.tx.inner.unbounded_send((req, resp_tx));

        Box::pin(async move {
            send_res.map_err(|_| ClientError::Transport(MockError::Send))?;
            resp_rx
                .await
                .map_err(|_| ClientError::Transport(MockError::Receive))
        })
    }
}

/// Ways the mock transport can fail.
#[derive(Debug)]
pub enum MockError {
    /// The server dropped the call without answering.
    Receive,
    /// The server is gone.
    Send,
}

impl Display for MockError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MockError::Receive => f.write_str("call was dropped by the server"),
            MockError::Send => f.write_str("server is not running"),
        }
    }
}

impl StdError for MockError {}
