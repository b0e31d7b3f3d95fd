use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures_util::{Future, FutureExt};
use pin_project_lite::pin_project;
use tower::{Layer, Service};
use tracing::Span;

use crate::{request::BoxRequest, response::BoxResponse, Status};

/// Layer for layering services with [`Trace`].
#[derive(Debug, Clone)]
pub struct TraceLayer<SpanFn, OnRequestFn, OnSuccessFn, OnErrorFn> {
    span_fn: SpanFn,
    on_request: OnRequestFn,
    on_success: OnSuccessFn,
    on_error: OnErrorFn,
}

impl<SpanFn, OnRequestFn, OnSuccessFn, OnErrorFn>
    TraceLayer<SpanFn, OnRequestFn, OnSuccessFn, OnErrorFn>
where
    SpanFn: Fn(&BoxRequest) -> Span + Clone,
    OnRequestFn: Fn(&BoxRequest, &Span) + Clone,
    OnSuccessFn: Fn(&BoxResponse, &Span) + Clone,
    OnErrorFn: Fn(&BoxResponse, &Span, &Status) + Clone,
{
    /// Create a new trace layer.
    pub fn new(
        span_fn: SpanFn,
        on_request: OnRequestFn,
        on_success: OnSuccessFn,
        on_error: OnErrorFn,
    ) -> Self {
        Self {
            span_fn,
            on_request,
            on_success,
            on_error,
        }
    }

    /// Change the span function that will be used.
    pub fn span_fn<NewSpanFn>(
        self,
        span_fn: NewSpanFn,
    ) -> TraceLayer<NewSpanFn, OnRequestFn, OnSuccessFn, OnErrorFn>
    where
        NewSpanFn: Fn(&BoxRequest) -> Span + Clone,
    {
        TraceLayer {
            span_fn,
            on_request: self.on_request,
            on_success: self.on_success,
            on_error: self.on_error,
        }
    }

    /// Change the function called for calls that end with a non-OK status.
    pub fn on_error<NewOnErrorFn>(
        self,
        on_error: NewOnErrorFn,
    ) -> TraceLayer<SpanFn, OnRequestFn, OnSuccessFn, NewOnErrorFn>
    where
        NewOnErrorFn: Fn(&BoxResponse, &Span, &Status) + Clone,
    {
        TraceLayer {
            span_fn: self.span_fn,
            on_request: self.on_request,
            on_success: self.on_success,
            on_error,
        }
    }
}

type SpanFnPtr = fn(&BoxRequest) -> Span;
type OnRequestFnPtr = fn(&BoxRequest, &Span);
type OnSuccessFnPtr = fn(&BoxResponse, &Span);
type OnErrorFnPtr = fn(&BoxResponse, &Span, &Status);

impl TraceLayer<SpanFnPtr, OnRequestFnPtr, OnSuccessFnPtr, OnErrorFnPtr> {
    /// Create a trace layer that logs calls on the info level, and failed
    /// calls on the warn level.
    pub fn default() -> Self {
        Self {
            span_fn: |req| tracing::info_span!("call", endpoint = %req.endpoint()),
            on_request: |req, _| {
                tracing::info!(metadata = req.metadata().len(), "processing call")
            },
            on_success: |resp, _| {
                tracing::info!(
                    header = resp.header().len(),
                    trailer = resp.trailer().len(),
                    "call successful"
                )
            },
            on_error: |_, _, status| {
                tracing::warn!(code = %status.code(), "call failed: {}", status.message())
            },
        }
    }

    /// Same as [`TraceLayer::default`], but logs on the debug level.
    pub fn default_debug() -> Self {
        Self {
            span_fn: |req| tracing::debug_span!("call", endpoint = %req.endpoint()),
            on_request: |_, _| tracing::debug!("processing call"),
            on_success: |_, _| tracing::debug!("call successful"),
            on_error: |_, _, status| {
                tracing::debug!(code = %status.code(), "call failed: {}", status.message())
            },
        }
    }
}

impl<S, SpanFn, OnRequestFn, OnSuccessFn, OnErrorFn> Layer<S>
    for TraceLayer<SpanFn, OnRequestFn, OnSuccessFn, OnErrorFn>
where
    SpanFn: Fn(&BoxRequest) -> Span + Clone,
    OnRequestFn: Fn(&BoxRequest, &Span) + Clone,
    OnSuccessFn: Fn(&BoxResponse, &Span) + Clone,
    OnErrorFn: Fn(&BoxResponse, &Span, &Status) + Clone,
{
    type Service = Trace<S, SpanFn, OnRequestFn, OnSuccessFn, OnErrorFn>;

    fn layer(&self, inner: S) -> Self::Service {
        Trace {
            inner,
            span_fn: self.span_fn.clone(),
            on_request: self.on_request.clone(),
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

/// Service that traces calls, their outcome and status.
#[derive(Debug, Clone)]
pub struct Trace<S, SpanFn, OnRequestFn, OnSuccessFn, OnErrorFn> {
    inner: S,
    span_fn: SpanFn,
    on_request: OnRequestFn,
    on_success: OnSuccessFn,
    on_error: OnErrorFn,
}

impl<S, SpanFn, OnRequestFn, OnSuccessFn, OnErrorFn> Service<BoxRequest>
    for Trace<S, SpanFn, OnRequestFn, OnSuccessFn, OnErrorFn>
where
    S: Service<BoxRequest, Response = BoxResponse>,
    SpanFn: Fn(&BoxRequest) -> Span,
    OnRequestFn: Fn(&BoxRequest, &Span),
    OnSuccessFn: Fn(&BoxResponse, &Span) + Clone,
    OnErrorFn: Fn(&BoxResponse, &Span, &Status) + Clone,
{
    type Response = BoxResponse;

    type Error = S::Error;

    type Future = TraceFuture<S::Future, OnSuccessFn, OnErrorFn>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Service::poll_ready(&mut self.inner, cx)
    }

    fn call(&mut self, req: BoxRequest) -> Self::Future {
        let span = (self.span_fn)(&req);

        let fut = {
            let _guard = span.enter();
            (self.on_request)(&req, &span);
            Service::call(&mut self.inner, req)
        };

        TraceFuture {
            fut,
            span,
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

pin_project! {
    /// Future used by [`Trace`].
    pub struct TraceFuture<Fut, OnSuccessFn, OnErrorFn> {
        #[pin]
        fut: Fut,
        span: Span,
        on_success: OnSuccessFn,
        on_error: OnErrorFn,
    }
}

impl<Fut, FutErr, OnSuccessFn, OnErrorFn> Future for TraceFuture<Fut, OnSuccessFn, OnErrorFn>
where
    Fut: Future<Output = Result<BoxResponse, FutErr>>,
    OnSuccessFn: Fn(&BoxResponse, &Span),
    OnErrorFn: Fn(&BoxResponse, &Span, &Status),
{
    type Output = Fut::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();
        let _guard = this.span.enter();

        let resp = futures_util::ready!(this.fut.poll_unpin(cx)?);

        if resp.status().is_ok() {
            (this.on_success)(&resp, this.span);
        } else {
            (this.on_error)(&resp, this.span, resp.status());
        }

        Poll::Ready(Ok(resp))
    }
}
