use std::{
    fmt::{self, Debug, Formatter},
    pin::Pin,
    task::{Context, Poll},
};

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};

use super::BoxError;

/// Type of the item that a [`Body`] produces.
pub type BodyResult = Result<Bytes, BoxError>;

/// A request or response body.
pub struct Body {
    stream: Pin<Box<dyn Stream<Item = BodyResult> + Send + Sync + 'static>>,
}

impl Body {
    /// Create a new body by wrapping a stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = BodyResult> + Send + Sync + 'static,
    {
        Self {
            stream: Box::pin(stream),
        }
    }

    /// Create a new, empty body.
    pub fn empty() -> Self {
        Self::new(futures_util::stream::empty())
    }

    /// Create a body using a single chunk of data.
    pub fn full<Data>(data: Data) -> Self
    where
        Data: Into<Bytes>,
    {
        Self::new(futures_util::stream::once(futures_util::future::ready(Ok(
            data.into(),
        ))))
    }

    /// Aggregate this body into a single contiguous [`Bytes`].
    ///
    /// Note that this does not do any sort of size check for the body.
    pub async fn aggregate(mut self) -> Result<Bytes, BoxError> {
        let first = match self.next().await {
            Some(chunk) => chunk?,
            None => return Ok(Bytes::new()),
        };

        // single chunk bodies are the common case, don't copy them
        let second = match self.next().await {
            Some(chunk) => chunk?,
            None => return Ok(first),
        };

        let mut buf = BytesMut::with_capacity(first.len() + second.len());
        buf.extend_from_slice(&first);
        buf.extend_from_slice(&second);
        while let Some(chunk) = self.next().await {
            buf.extend_from_slice(&chunk?);
        }

        Ok(buf.freeze())
    }
}

impl Stream for Body {
    type Item = BodyResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stream.poll_next_unpin(cx)
    }
}

impl Debug for Body {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body").field("stream", &"<hidden>").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn aggregate_chunks() {
        let chunks = vec![
            Ok(Bytes::from_static(b"hel")),
            Ok(Bytes::new()),
            Ok(Bytes::from_static(b"lo")),
        ];
        let body = Body::new(futures_util::stream::iter(chunks));
        assert_eq!(body.aggregate().await.unwrap(), Bytes::from_static(b"hello"));

        assert!(Body::empty().aggregate().await.unwrap().is_empty());
        assert_eq!(
            Body::full("x").aggregate().await.unwrap(),
            Bytes::from_static(b"x")
        );
    }
}
