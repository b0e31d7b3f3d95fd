use futures_channel::{
    mpsc::{self, UnboundedReceiver as MpscReceiver, UnboundedSender as MpscSender},
    oneshot::Sender as OneshotSender,
};

use crate::{request::BoxRequest, response::BoxResponse};

type Call = (BoxRequest, OneshotSender<BoxResponse>);

/// Client side of a pair of mock channels.
#[derive(Clone)]
pub struct MockSender {
    pub(crate) inner: MpscSender<Call>,
}

/// Server side of a pair of mock channels.
pub struct MockReceiver {
    pub(crate) inner: MpscReceiver<Call>,
}

/// Create a new pair of mock channels.
pub fn new_mock_channels() -> (MockSender, MockReceiver) {
    let (tx, rx) = mpsc::unbounded();
    (MockSender { inner: tx }, MockReceiver { inner: rx })
}
