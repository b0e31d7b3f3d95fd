use std::{
    fmt::{self, Debug, Formatter},
    mem,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{MetadataMap, Status};

/// Header and trailer metadata produced by a call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
    /// Metadata sent with the start of the response.
    pub header: MetadataMap,
    /// Metadata sent with the terminal status of the response.
    pub trailer: MetadataMap,
}

enum State {
    Open {
        header: MetadataMap,
        trailer: MetadataMap,
        header_sent: bool,
    },
    Closed(Closed),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Closed {
    Finished,
    Cancelled,
    Detached,
}

impl Closed {
    fn status(self) -> Status {
        match self {
            Closed::Finished => Status::failed_precondition("response was already finalized"),
            Closed::Cancelled => Status::cancelled("call was cancelled"),
            Closed::Detached => {
                Status::failed_precondition("no response channel is attached to this call")
            }
        }
    }
}

/// Call-scoped channel a handler uses to attach header and trailer metadata
/// to its response.
///
/// Clones share the same channel. Once the response is finalized, or the
/// call is cancelled, every write fails instead of being dropped.
#[derive(Clone)]
pub struct ResponseChannel {
    state: Arc<Mutex<State>>,
}

impl Debug for ResponseChannel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let state = match &*self.lock() {
            State::Open { header_sent, .. } => {
                if *header_sent {
                    "open (header sent)"
                } else {
                    "open"
                }
            }
            State::Closed(Closed::Finished) => "finished",
            State::Closed(Closed::Cancelled) => "cancelled",
            State::Closed(Closed::Detached) => "detached",
        };
        f.debug_struct("ResponseChannel")
            .field("state", &state)
            .finish()
    }
}

impl Default for ResponseChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseChannel {
    /// Create a new, open channel.
    pub fn new() -> Self {
        Self::with_state(State::Open {
            header: MetadataMap::new(),
            trailer: MetadataMap::new(),
            header_sent: false,
        })
    }

    /// Create a channel that isn't attached to any call. Every write to it fails.
    pub fn detached() -> Self {
        Self::with_state(State::Closed(Closed::Detached))
    }

    fn with_state(state: State) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add header metadata to the response.
    ///
    /// Fails with [`crate::Code::FailedPrecondition`] once the header was sent.
    pub fn set_header(&self, metadata: MetadataMap) -> Result<(), Status> {
        match &mut *self.lock() {
            State::Open {
                header,
                header_sent,
                ..
            } => {
                if *header_sent {
                    return Err(Status::failed_precondition("header was already sent"));
                }
                header.merge(metadata);
                Ok(())
            }
            State::Closed(closed) => Err(closed.status()),
        }
    }

    /// Mark the header as sent. No more header metadata can be added after this.
    pub fn send_header(&self) -> Result<(), Status> {
        match &mut *self.lock() {
            State::Open { header_sent, .. } => {
                if *header_sent {
                    return Err(Status::failed_precondition("header was already sent"));
                }
                *header_sent = true;
                Ok(())
            }
            State::Closed(closed) => Err(closed.status()),
        }
    }

    /// Add trailer metadata to the response.
    pub fn set_trailer(&self, metadata: MetadataMap) -> Result<(), Status> {
        match &mut *self.lock() {
            State::Open { trailer, .. } => {
                trailer.merge(metadata);
                Ok(())
            }
            State::Closed(closed) => Err(closed.status()),
        }
    }

    /// Whether the channel still accepts writes.
    pub fn is_open(&self) -> bool {
        matches!(&*self.lock(), State::Open { .. })
    }

    /// Finalize the response, returning the metadata that was set.
    pub fn finish(&self) -> Result<ResponseMetadata, Status> {
        let mut state = self.lock();
        match mem::replace(&mut *state, State::Closed(Closed::Finished)) {
            State::Open {
                header, trailer, ..
            } => Ok(ResponseMetadata { header, trailer }),
            State::Closed(closed) => {
                *state = State::Closed(closed);
                Err(closed.status())
            }
        }
    }

    /// Cancel the call. Does nothing if the response was already finalized.
    pub fn cancel(&self) {
        let mut state = self.lock();
        if let State::Open { .. } = &*state {
            *state = State::Closed(Closed::Cancelled);
        }
    }

    pub(crate) fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop {
            channel: self.clone(),
        }
    }
}

/// Cancels the channel when dropped, unless it was finalized before.
pub(crate) struct CancelOnDrop {
    channel: ResponseChannel,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.channel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::convert::TryFrom;

    use super::*;
    use crate::Code;

    fn md(pairs: &[(&str, &str)]) -> MetadataMap {
        MetadataMap::try_from(pairs).unwrap()
    }

    #[test]
    fn collects_header_and_trailer() {
        let chan = ResponseChannel::new();
        chan.set_header(md(&[("a", "1")])).unwrap();
        chan.set_trailer(md(&[("b", "2")])).unwrap();
        chan.clone().set_header(md(&[("c", "3")])).unwrap();

        let metadata = chan.finish().unwrap();
        assert_eq!(metadata.header, md(&[("a", "1"), ("c", "3")]));
        assert_eq!(metadata.trailer, md(&[("b", "2")]));
        assert!(!chan.is_open());
    }

    #[test]
    fn writes_after_finish_fail() {
        let chan = ResponseChannel::new();
        chan.finish().unwrap();

        let err = chan.set_header(md(&[("a", "1")])).unwrap_err();
        assert_eq!(err.code(), Code::FailedPrecondition);
        let err = chan.set_trailer(md(&[("a", "1")])).unwrap_err();
        assert_eq!(err.code(), Code::FailedPrecondition);
        let err = chan.finish().unwrap_err();
        assert_eq!(err.code(), Code::FailedPrecondition);
    }

    #[test]
    fn header_is_frozen_after_send() {
        let chan = ResponseChannel::new();
        chan.set_header(md(&[("a", "1")])).unwrap();
        chan.send_header().unwrap();

        let err = chan.set_header(md(&[("b", "2")])).unwrap_err();
        assert_eq!(err.code(), Code::FailedPrecondition);
        // trailers are still writable
        chan.set_trailer(md(&[("t", "1")])).unwrap();

        let metadata = chan.finish().unwrap();
        assert_eq!(metadata.header, md(&[("a", "1")]));
    }

    #[test]
    fn cancelled_channel_rejects_writes() {
        let chan = ResponseChannel::new();
        drop(chan.cancel_on_drop());

        let err = chan.set_trailer(md(&[("a", "1")])).unwrap_err();
        assert_eq!(err.code(), Code::Cancelled);
        assert_eq!(chan.finish().unwrap_err().code(), Code::Cancelled);
    }

    #[test]
    fn guard_after_finish_is_noop() {
        let chan = ResponseChannel::new();
        let guard = chan.cancel_on_drop();
        chan.finish().unwrap();
        drop(guard);

        let err = chan.set_header(MetadataMap::new()).unwrap_err();
        assert_eq!(err.code(), Code::FailedPrecondition);
    }

    #[test]
    fn closed_channels_keep_their_status() {
        let cancelled = ResponseChannel::new();
        cancelled.cancel();
        let finished = ResponseChannel::new();
        finished.finish().unwrap();

        for (chan, code) in [
            (cancelled, Code::Cancelled),
            (finished, Code::FailedPrecondition),
            (ResponseChannel::detached(), Code::FailedPrecondition),
        ] {
            // a failed finish doesn't turn the channel into a finished one
            for _ in 0..2 {
                assert_eq!(chan.finish().unwrap_err().code(), code);
            }
            assert_eq!(chan.send_header().unwrap_err().code(), code);
            assert_eq!(chan.set_trailer(MetadataMap::new()).unwrap_err().code(), code);
            assert!(!chan.is_open());
        }
    }

    #[test]
    fn detached_channel_rejects_writes() {
        let chan = ResponseChannel::detached();
        let err = chan.set_header(MetadataMap::new()).unwrap_err();
        assert_eq!(err.code(), Code::FailedPrecondition);
    }
}
